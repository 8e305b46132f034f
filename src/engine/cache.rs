//! TTL-bounded memoization of aggregator output.
//!
//! Queries never touch the filesystem directly; they go through this
//! cache, which recomputes the snapshot at most once per expiry or
//! invalidation. Concurrent misses for the same key wait on the single
//! in-flight recomputation instead of duplicating it.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::engine::aggregator;
use crate::error::{EngineError, EngineResult};
use crate::models::{EntityKind, RecordSet, Snapshot};
use crate::store::loader::RecordLoader;

/// Logical query a caller can ask the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// Per-kind slice (`GET /records/{kind}`).
    Kind(EntityKind),
    /// The comprehensive statistics view (`GET /stats`).
    Stats,
}

/// Freshness and recompute budgets.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// TTL for per-kind queries.
    pub kind_ttl: Duration,
    /// TTL for the comprehensive stats view (typically longer).
    pub stats_ttl: Duration,
    /// Budget for one loader+aggregator recomputation.
    pub recompute_timeout: Duration,
    /// Decimal places for derived means and rates.
    pub precision: u32,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            kind_ttl: Duration::from_secs(5),
            stats_ttl: Duration::from_secs(30),
            recompute_timeout: Duration::from_secs(10),
            precision: 2,
        }
    }
}

impl CachePolicy {
    fn ttl(&self, key: QueryKey) -> Duration {
        match key {
            QueryKey::Kind(_) => self.kind_ttl,
            QueryKey::Stats => self.stats_ttl,
        }
    }
}

impl From<&crate::config::EngineConfig> for CachePolicy {
    fn from(config: &crate::config::EngineConfig) -> Self {
        Self {
            kind_ttl: Duration::from_secs(config.kind_ttl_secs),
            stats_ttl: Duration::from_secs(config.stats_ttl_secs),
            recompute_timeout: Duration::from_secs(config.recompute_timeout_secs),
            precision: config.precision,
        }
    }
}

/// One recomputation's output: the snapshot plus the record set behind
/// it (served back for per-kind listings). Immutable once built.
#[derive(Debug)]
pub struct ComputedView {
    pub snapshot: Snapshot,
    pub records: RecordSet,
}

/// What a cache lookup hands to the caller.
#[derive(Debug, Clone)]
pub struct CacheView {
    pub view: Arc<ComputedView>,
    /// True when the view is older than its TTL and was served only
    /// because a recomputation timed out.
    pub stale: bool,
}

struct CacheEntry {
    view: Arc<ComputedView>,
    computed_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.computed_at)
            .to_std()
            .map(|age| age <= self.ttl)
            // A negative age means the entry was computed "in the
            // future" relative to now; treat it as fresh.
            .unwrap_or(true)
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, CacheEntry>,
    /// Most recent successful view, kept for the timeout fallback.
    last_good: Option<Arc<ComputedView>>,
}

/// Shared, TTL-bounded snapshot cache.
pub struct FreshnessCache {
    loader: Arc<RecordLoader>,
    policy: CachePolicy,
    state: Mutex<CacheState>,
}

impl FreshnessCache {
    pub fn new(loader: Arc<RecordLoader>, policy: CachePolicy) -> Self {
        Self {
            loader,
            policy,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Return a view no older than the key's TTL, recomputing if needed.
    ///
    /// The state lock is held across the recomputation on purpose: two
    /// concurrent misses produce exactly one loader scan, and the second
    /// caller observes the freshly inserted entry.
    pub async fn get(&self, key: QueryKey) -> EngineResult<CacheView> {
        let mut state = self.state.lock().await;

        if let Some(entry) = state.entries.get(&key) {
            if entry.is_fresh(Utc::now()) {
                return Ok(CacheView {
                    view: Arc::clone(&entry.view),
                    stale: false,
                });
            }
        }

        let loader = Arc::clone(&self.loader);
        let precision = self.policy.precision;
        let recompute = tokio::task::spawn_blocking(move || {
            let outcome = loader.load();
            let snapshot = aggregator::aggregate(&outcome, Utc::now(), precision);
            ComputedView {
                snapshot,
                records: outcome.records,
            }
        });

        match tokio::time::timeout(self.policy.recompute_timeout, recompute).await {
            Ok(Ok(view)) => {
                let view = Arc::new(view);
                let computed_at = view.snapshot.computed_at;
                debug!(?key, %computed_at, "snapshot recomputed");
                state.last_good = Some(Arc::clone(&view));
                state.entries.insert(
                    key,
                    CacheEntry {
                        view: Arc::clone(&view),
                        computed_at,
                        ttl: self.policy.ttl(key),
                    },
                );
                Ok(CacheView { view, stale: false })
            }
            Ok(Err(join_err)) => {
                // A panicking recompute must not poison other keys.
                warn!(?key, "recompute task failed: {}", join_err);
                self.fallback(&state)
            }
            Err(_) => {
                warn!(
                    ?key,
                    "recompute exceeded {:?} budget", self.policy.recompute_timeout
                );
                self.fallback(&state)
            }
        }
    }

    /// Drop every entry; the next `get` recomputes regardless of TTL.
    /// The last good view survives as the timeout fallback.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        debug!("cache invalidated");
    }

    fn fallback(&self, state: &CacheState) -> EngineResult<CacheView> {
        match &state.last_good {
            Some(view) => Ok(CacheView {
                view: Arc::clone(view),
                stale: true,
            }),
            None => Err(EngineError::RecomputeTimeout(
                self.policy.recompute_timeout.as_secs(),
            )),
        }
    }

    #[cfg(test)]
    async fn seed_last_good(&self, view: ComputedView) {
        self.state.lock().await.last_good = Some(Arc::new(view));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::loader::LoadConfig;
    use std::fs;
    use tempfile::TempDir;

    fn loader_for(dir: &TempDir) -> Arc<RecordLoader> {
        Arc::new(RecordLoader::new(LoadConfig {
            data_dir: dir.path().to_path_buf(),
            ..LoadConfig::default()
        }))
    }

    fn write_driver(dir: &TempDir, name: &str, id: &str, score: f64) {
        fs::write(
            dir.path().join(name),
            format!(r#"{{"driver_id": "{id}", "safety_score": {score}}}"#),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_hits_within_ttl_share_computed_at() {
        let dir = TempDir::new().unwrap();
        write_driver(&dir, "drivers.json", "D-001", 9.0);
        let cache = FreshnessCache::new(loader_for(&dir), CachePolicy::default());

        let first = cache.get(QueryKey::Kind(EntityKind::Driver)).await.unwrap();
        let second = cache.get(QueryKey::Kind(EntityKind::Driver)).await.unwrap();
        assert_eq!(
            first.view.snapshot.computed_at,
            second.view.snapshot.computed_at
        );
        assert!(!second.stale);
    }

    #[tokio::test]
    async fn test_expired_entry_recomputes_with_newer_timestamp() {
        let dir = TempDir::new().unwrap();
        write_driver(&dir, "drivers.json", "D-001", 9.0);
        let policy = CachePolicy {
            kind_ttl: Duration::from_millis(20),
            ..CachePolicy::default()
        };
        let cache = FreshnessCache::new(loader_for(&dir), policy);

        let first = cache.get(QueryKey::Kind(EntityKind::Driver)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let second = cache.get(QueryKey::Kind(EntityKind::Driver)).await.unwrap();
        assert!(second.view.snapshot.computed_at > first.view.snapshot.computed_at);
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute_inside_ttl() {
        let dir = TempDir::new().unwrap();
        write_driver(&dir, "drivers.json", "D-001", 9.0);
        let cache = FreshnessCache::new(loader_for(&dir), CachePolicy::default());

        let first = cache.get(QueryKey::Stats).await.unwrap();
        assert_eq!(first.view.snapshot.drivers.count, 1);

        write_driver(&dir, "drivers_new.json", "D-EMERGENCY", 1.5);
        cache.invalidate().await;

        let second = cache.get(QueryKey::Stats).await.unwrap();
        assert_eq!(second.view.snapshot.drivers.count, 2);
        assert_eq!(second.view.snapshot.drivers.critical, 1);
    }

    #[tokio::test]
    async fn test_keys_have_independent_entries() {
        let dir = TempDir::new().unwrap();
        write_driver(&dir, "drivers.json", "D-001", 9.0);
        let cache = FreshnessCache::new(loader_for(&dir), CachePolicy::default());

        let kind = cache.get(QueryKey::Kind(EntityKind::Driver)).await.unwrap();
        let stats = cache.get(QueryKey::Stats).await.unwrap();
        // Separate recomputations, both fresh.
        assert!(stats.view.snapshot.computed_at >= kind.view.snapshot.computed_at);
        assert!(!kind.stale && !stats.stale);
    }

    #[tokio::test]
    async fn test_concurrent_misses_join_one_recompute() {
        let dir = TempDir::new().unwrap();
        write_driver(&dir, "drivers.json", "D-001", 9.0);
        let cache = Arc::new(FreshnessCache::new(loader_for(&dir), CachePolicy::default()));

        let a = Arc::clone(&cache);
        let b = Arc::clone(&cache);
        let (ra, rb) = tokio::join!(
            a.get(QueryKey::Kind(EntityKind::Driver)),
            b.get(QueryKey::Kind(EntityKind::Driver)),
        );
        assert_eq!(
            ra.unwrap().view.snapshot.computed_at,
            rb.unwrap().view.snapshot.computed_at
        );
    }

    #[tokio::test]
    async fn test_timeout_without_history_is_an_error() {
        let dir = TempDir::new().unwrap();
        write_driver(&dir, "drivers.json", "D-001", 9.0);
        let policy = CachePolicy {
            recompute_timeout: Duration::ZERO,
            ..CachePolicy::default()
        };
        let cache = FreshnessCache::new(loader_for(&dir), policy);

        let err = cache.get(QueryKey::Stats).await.unwrap_err();
        assert!(matches!(err, EngineError::RecomputeTimeout(_)));
    }

    #[tokio::test]
    async fn test_timeout_with_history_serves_stale_view() {
        let dir = TempDir::new().unwrap();
        write_driver(&dir, "drivers.json", "D-001", 9.0);
        let policy = CachePolicy {
            recompute_timeout: Duration::ZERO,
            ..CachePolicy::default()
        };
        let cache = FreshnessCache::new(loader_for(&dir), policy);

        let loader = loader_for(&dir);
        let outcome = loader.load();
        let snapshot = aggregator::aggregate(&outcome, Utc::now(), 2);
        cache
            .seed_last_good(ComputedView {
                snapshot,
                records: outcome.records,
            })
            .await;

        let view = cache.get(QueryKey::Stats).await.unwrap();
        assert!(view.stale);
        assert_eq!(view.view.snapshot.drivers.count, 1);
    }
}
