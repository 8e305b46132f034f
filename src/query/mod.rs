//! Query dispatch: free text in, structured snapshot slice out.
//!
//! The dispatcher classifies the question, pulls the matching view from
//! the freshness cache, and selects the slice of the snapshot that
//! answers it. Rendering for humans happens elsewhere; everything here
//! stays structured.

pub mod intent;

pub use intent::{classify, QueryIntent};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::engine::aggregator;
use crate::engine::{CacheView, FreshnessCache, QueryKey};
use crate::error::EngineResult;
use crate::models::{
    DriverStats, EntityKind, InvoiceStats, Record, RecordBody, ShipmentStats, Snapshot,
};

/// The snapshot slice relevant to a matched intent.
#[derive(Debug, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum QuerySlice {
    Emergency {
        drivers: DriverStats,
        critical_drivers: Vec<Record>,
    },
    DriverRisk {
        drivers: DriverStats,
    },
    Compliance {
        invoices: InvoiceStats,
    },
    Anomaly {
        shipments: ShipmentStats,
        anomalous_shipments: Vec<Record>,
    },
    FleetStatus {
        total_records: usize,
        snapshot: Snapshot,
    },
    General {
        snapshot: Snapshot,
    },
}

/// Structured answer to one free-text question.
#[derive(Debug, Serialize)]
pub struct QueryAnswer {
    pub intent: QueryIntent,
    /// Keyword that selected the intent; absent for the general fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_keyword: Option<&'static str>,
    pub evaluated_at: DateTime<Utc>,
    /// True when a recompute timed out and the last good view was served.
    pub stale: bool,
    #[serde(flatten)]
    pub slice: QuerySlice,
}

/// Routes questions to cached aggregate views.
pub struct QueryDispatcher {
    cache: Arc<FreshnessCache>,
}

impl QueryDispatcher {
    pub fn new(cache: Arc<FreshnessCache>) -> Self {
        Self { cache }
    }

    pub async fn answer(&self, text: &str) -> EngineResult<QueryAnswer> {
        let (intent, matched_keyword) = classify(text);
        debug!(%intent, ?matched_keyword, "query classified");

        let view = self.cache.get(cache_key(intent)).await?;
        let slice = build_slice(intent, &view);
        Ok(QueryAnswer {
            intent,
            matched_keyword,
            evaluated_at: view.view.snapshot.computed_at,
            stale: view.stale,
            slice,
        })
    }
}

/// Each intent reads through its own cache key so driver questions can
/// refresh faster than the comprehensive views.
fn cache_key(intent: QueryIntent) -> QueryKey {
    match intent {
        QueryIntent::Emergency | QueryIntent::DriverRisk => QueryKey::Kind(EntityKind::Driver),
        QueryIntent::Compliance => QueryKey::Kind(EntityKind::Invoice),
        QueryIntent::Anomaly => QueryKey::Kind(EntityKind::Shipment),
        QueryIntent::FleetStatus | QueryIntent::General => QueryKey::Stats,
    }
}

fn build_slice(intent: QueryIntent, view: &CacheView) -> QuerySlice {
    let snapshot = &view.view.snapshot;
    let records = &view.view.records;
    match intent {
        QueryIntent::Emergency => QuerySlice::Emergency {
            drivers: snapshot.drivers.clone(),
            critical_drivers: records
                .of_kind(EntityKind::Driver)
                .into_iter()
                .filter(|r| match r.body {
                    RecordBody::Driver { safety_score, .. } => {
                        aggregator::classify_driver(safety_score) == crate::models::RiskTier::Critical
                    }
                    _ => false,
                })
                .cloned()
                .collect(),
        },
        QueryIntent::DriverRisk => QuerySlice::DriverRisk {
            drivers: snapshot.drivers.clone(),
        },
        QueryIntent::Compliance => QuerySlice::Compliance {
            invoices: snapshot.invoices.clone(),
        },
        QueryIntent::Anomaly => QuerySlice::Anomaly {
            shipments: snapshot.shipments.clone(),
            anomalous_shipments: records
                .of_kind(EntityKind::Shipment)
                .into_iter()
                .filter(|r| match r.body {
                    RecordBody::Shipment {
                        route_deviation_km, ..
                    } => aggregator::is_anomalous(route_deviation_km),
                    _ => false,
                })
                .cloned()
                .collect(),
        },
        QueryIntent::FleetStatus => QuerySlice::FleetStatus {
            total_records: snapshot.total_records(),
            snapshot: snapshot.clone(),
        },
        QueryIntent::General => QuerySlice::General {
            snapshot: snapshot.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CachePolicy;
    use crate::store::loader::{LoadConfig, RecordLoader};
    use std::fs;
    use tempfile::TempDir;

    fn dispatcher_for(dir: &TempDir) -> QueryDispatcher {
        let loader = Arc::new(RecordLoader::new(LoadConfig {
            data_dir: dir.path().to_path_buf(),
            ..LoadConfig::default()
        }));
        QueryDispatcher::new(Arc::new(FreshnessCache::new(
            loader,
            CachePolicy::default(),
        )))
    }

    #[tokio::test]
    async fn test_emergency_answer_lists_critical_drivers() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("drivers.json"),
            r#"[
                {"driver_id": "D-001", "safety_score": 9.0},
                {"driver_id": "D-002", "safety_score": 3.5}
            ]"#,
        )
        .unwrap();

        let answer = dispatcher_for(&dir)
            .answer("any emergency out there?")
            .await
            .unwrap();
        assert_eq!(answer.intent, QueryIntent::Emergency);
        match answer.slice {
            QuerySlice::Emergency {
                drivers,
                critical_drivers,
            } => {
                assert_eq!(drivers.count, 2);
                assert_eq!(critical_drivers.len(), 1);
                assert_eq!(critical_drivers[0].id, "D-002");
            }
            other => panic!("wrong slice: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_anomaly_answer_lists_deviating_shipments() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("shipments.json"),
            r#"[
                {"shipment_id": "SH-001", "route_deviation_km": 12.0, "declared_value": 100.0},
                {"shipment_id": "SH-002", "route_deviation_km": 45.0, "declared_value": 900.0}
            ]"#,
        )
        .unwrap();

        let answer = dispatcher_for(&dir)
            .answer("check for route deviation")
            .await
            .unwrap();
        assert_eq!(answer.intent, QueryIntent::Anomaly);
        match answer.slice {
            QuerySlice::Anomaly {
                shipments,
                anomalous_shipments,
            } => {
                assert_eq!(shipments.anomalies, 1);
                assert_eq!(anomalous_shipments[0].id, "SH-002");
            }
            other => panic!("wrong slice: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_general_answer_carries_full_snapshot() {
        let dir = TempDir::new().unwrap();
        let answer = dispatcher_for(&dir).answer("hello").await.unwrap();
        assert_eq!(answer.intent, QueryIntent::General);
        assert!(answer.matched_keyword.is_none());
        match answer.slice {
            QuerySlice::General { snapshot } => assert_eq!(snapshot.total_records(), 0),
            other => panic!("wrong slice: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_answer_timestamp_matches_snapshot() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher_for(&dir);
        let answer = dispatcher.answer("fleet status").await.unwrap();
        match &answer.slice {
            QuerySlice::FleetStatus { snapshot, .. } => {
                assert_eq!(answer.evaluated_at, snapshot.computed_at)
            }
            other => panic!("wrong slice: {other:?}"),
        }
    }
}
