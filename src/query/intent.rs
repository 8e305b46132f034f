//! Keyword routing of free-text questions to query intents.
//!
//! Classification is a case-insensitive substring match against an
//! ordered table; the first intent with a matching keyword wins, so
//! "critical driver" routes to the emergency view even though it also
//! mentions drivers.

use serde::Serialize;
use std::fmt;

/// The fixed set of question categories the engine can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    /// Critical-tier drivers needing immediate attention.
    Emergency,
    /// Driver risk tiers and the fleet-wide safety mean.
    DriverRisk,
    /// Invoice compliance and payment urgency.
    Compliance,
    /// Shipment route deviations.
    Anomaly,
    /// Fleet-wide counts and vehicle utilization.
    FleetStatus,
    /// Fallback when nothing matched.
    General,
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryIntent::Emergency => write!(f, "emergency"),
            QueryIntent::DriverRisk => write!(f, "driver_risk"),
            QueryIntent::Compliance => write!(f, "compliance"),
            QueryIntent::Anomaly => write!(f, "anomaly"),
            QueryIntent::FleetStatus => write!(f, "fleet_status"),
            QueryIntent::General => write!(f, "general"),
        }
    }
}

/// Priority-ordered routing table. Emergency outranks driver risk,
/// which outranks the count-style fleet questions.
const ROUTES: &[(QueryIntent, &[&str])] = &[
    (QueryIntent::Emergency, &["emergency", "critical"]),
    (QueryIntent::DriverRisk, &["risk", "safety", "driver"]),
    (
        QueryIntent::Compliance,
        &["invoice", "compliance", "overdue", "payment"],
    ),
    (
        QueryIntent::Anomaly,
        &["fraud", "anomaly", "deviation", "shipment"],
    ),
    (
        QueryIntent::FleetStatus,
        &["count", "total", "fleet", "vehicle", "utilization"],
    ),
];

/// Classify a question, returning the intent and the keyword that
/// matched (`None` for the general fallback).
pub fn classify(text: &str) -> (QueryIntent, Option<&'static str>) {
    let lowered = text.to_lowercase();
    for (intent, keywords) in ROUTES {
        if let Some(hit) = keywords.iter().find(|kw| lowered.contains(*kw)) {
            return (*intent, Some(hit));
        }
    }
    (QueryIntent::General, None)
}
