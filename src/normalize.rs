//! Raw JSON to canonical record mapping.
//!
//! Stream files arrive in several historical shapes: identity fields may
//! be kind-prefixed (`driver_id`) or plain (`id`), numeric fields may be
//! missing, and status strings vary in casing. Normalization absorbs all
//! of that so the rest of the engine only sees `Record`.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::models::{EntityKind, PaymentStatus, Record, RecordBody};

/// Safety score assumed when a driver record omits one. The stream
/// writers treat missing scores as "no incident data", so a sparse
/// record must not inflate risk counts.
const DEFAULT_SAFETY_SCORE: f64 = 10.0;

/// Map one raw JSON object to a canonical record of the given kind.
///
/// `fallback_ingested` (normally the source file's mtime) is used when
/// the object carries no parseable timestamp. Fails only when the
/// identity field is absent; every other field has a default.
pub fn normalize(
    kind: EntityKind,
    raw: &Value,
    source_file: &Path,
    fallback_ingested: DateTime<Utc>,
) -> EngineResult<Record> {
    let obj = raw.as_object().ok_or_else(|| {
        EngineError::malformed(format!("expected a JSON object for {} record", kind))
    })?;

    let id = string_field(raw, &[kind.identity_field(), "id"]).ok_or_else(|| {
        EngineError::malformed(format!(
            "missing identity field `{}` in {}",
            kind.identity_field(),
            source_file.display()
        ))
    })?;

    let ingested_at = string_field(raw, &["timestamp", "ingested_at"])
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(fallback_ingested);

    let body = match kind {
        EntityKind::Driver => RecordBody::Driver {
            name: string_field(raw, &["name"]),
            safety_score: float_field(raw, &["safety_score"]).unwrap_or(DEFAULT_SAFETY_SCORE),
            incident_count: float_field(raw, &["incident_count", "incidents"])
                .map(|v| v.max(0.0) as u32)
                .unwrap_or(0),
        },
        EntityKind::Shipment => RecordBody::Shipment {
            route: string_field(raw, &["route"]),
            route_deviation_km: float_field(raw, &["route_deviation_km", "deviation"])
                .unwrap_or(0.0)
                .max(0.0),
            declared_value: float_field(raw, &["declared_value", "value"])
                .unwrap_or(0.0)
                .max(0.0),
        },
        EntityKind::Invoice => RecordBody::Invoice {
            amount: float_field(raw, &["amount"]).unwrap_or(0.0).max(0.0),
            due_date: string_field(raw, &["due_date"]).and_then(|s| parse_date(&s)),
            payment_status: string_field(raw, &["payment_status", "status"])
                .and_then(|s| PaymentStatus::parse(&s))
                .unwrap_or(PaymentStatus::Pending),
        },
        EntityKind::Vehicle => RecordBody::Vehicle {
            utilization_rate: float_field(raw, &["utilization_rate", "utilization"])
                .unwrap_or(0.0)
                .clamp(0.0, 100.0),
            maintenance_due: obj
                .get("maintenance_due")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        },
    };

    Ok(Record {
        id,
        ingested_at,
        source_file: source_file.to_path_buf(),
        body,
    })
}

/// First present string value among the aliases. Numbers are accepted
/// as identities too (some writers emit bare numeric ids).
fn string_field(raw: &Value, aliases: &[&str]) -> Option<String> {
    for key in aliases {
        match raw.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// First present numeric value among the aliases; numeric strings count.
fn float_field(raw: &Value, aliases: &[&str]) -> Option<f64> {
    for key in aliases {
        match raw.get(key) {
            Some(Value::Number(n)) => return n.as_f64(),
            Some(Value::String(s)) => {
                if let Ok(v) = s.trim().parse::<f64>() {
                    return Some(v);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse `YYYY-MM-DD`, falling back to the date part of an RFC3339 stamp.
fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}
