//! Data models for the fleet engine.
//!
//! This module contains the canonical record types produced by the
//! normalizer, the record set the loader maintains, and the immutable
//! snapshot the aggregator derives from it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// The four fleet entity kinds tracked by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Driver,
    Shipment,
    Invoice,
    Vehicle,
}

impl EntityKind {
    /// All kinds, in a fixed order (used for scans and reporting).
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Driver,
        EntityKind::Shipment,
        EntityKind::Invoice,
        EntityKind::Vehicle,
    ];

    /// Parse a kind from a path segment or config key.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "driver" | "drivers" => Some(EntityKind::Driver),
            "shipment" | "shipments" => Some(EntityKind::Shipment),
            "invoice" | "invoices" => Some(EntityKind::Invoice),
            "vehicle" | "vehicles" => Some(EntityKind::Vehicle),
            _ => None,
        }
    }

    /// The JSON field that identifies a record of this kind.
    pub fn identity_field(&self) -> &'static str {
        match self {
            EntityKind::Driver => "driver_id",
            EntityKind::Shipment => "shipment_id",
            EntityKind::Invoice => "invoice_id",
            EntityKind::Vehicle => "vehicle_id",
        }
    }

    /// Prefix used when the server assigns a fresh identity.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            EntityKind::Driver => "D",
            EntityKind::Shipment => "SH",
            EntityKind::Invoice => "INV",
            EntityKind::Vehicle => "V",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Driver => write!(f, "driver"),
            EntityKind::Shipment => write!(f, "shipment"),
            EntityKind::Invoice => write!(f, "invoice"),
            EntityKind::Vehicle => write!(f, "vehicle"),
        }
    }
}

/// Discrete risk classification of a driver's safety score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Normal,
    High,
    Critical,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Normal => write!(f, "normal"),
            RiskTier::High => write!(f, "high"),
            RiskTier::Critical => write!(f, "critical"),
        }
    }
}

/// Payment lifecycle state of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentStatus {
    Pending,
    DueToday,
    Overdue,
    Paid,
}

impl PaymentStatus {
    /// Tolerant parse of status strings seen in the wild
    /// ("Due Today", "overdue", "PAID", ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace([' ', '_'], "-").as_str() {
            "pending" => Some(PaymentStatus::Pending),
            "due-today" => Some(PaymentStatus::DueToday),
            "overdue" => Some(PaymentStatus::Overdue),
            "paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::DueToday => write!(f, "due-today"),
            PaymentStatus::Overdue => write!(f, "overdue"),
            PaymentStatus::Paid => write!(f, "paid"),
        }
    }
}

/// Kind-specific attributes of a canonical record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecordBody {
    Driver {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// 0-10 scale; higher is safer.
        safety_score: f64,
        incident_count: u32,
    },
    Shipment {
        #[serde(skip_serializing_if = "Option::is_none")]
        route: Option<String>,
        route_deviation_km: f64,
        declared_value: f64,
    },
    Invoice {
        amount: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        due_date: Option<NaiveDate>,
        payment_status: PaymentStatus,
    },
    Vehicle {
        /// 0-100 percent.
        utilization_rate: f64,
        maintenance_due: bool,
    },
}

impl RecordBody {
    pub fn kind(&self) -> EntityKind {
        match self {
            RecordBody::Driver { .. } => EntityKind::Driver,
            RecordBody::Shipment { .. } => EntityKind::Shipment,
            RecordBody::Invoice { .. } => EntityKind::Invoice,
            RecordBody::Vehicle { .. } => EntityKind::Vehicle,
        }
    }
}

/// One canonical entity instance after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique within the record's kind.
    pub id: String,
    /// When the record entered the system (record field or file mtime).
    pub ingested_at: DateTime<Utc>,
    /// File the record was loaded from, for provenance.
    pub source_file: PathBuf,
    #[serde(flatten)]
    pub body: RecordBody,
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        self.body.kind()
    }
}

/// The current normalized record set, grouped by kind and keyed by id.
///
/// Within a kind, a later `ingested_at` for the same id wins. BTreeMaps
/// keep iteration order deterministic so identical directories always
/// produce identical snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    by_kind: BTreeMap<EntityKind, BTreeMap<String, Record>>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert with last-write-wins semantics on `ingested_at`.
    /// Equal timestamps resolve to the lexically later source file so
    /// reloading an unchanged directory is reproducible.
    pub fn insert(&mut self, record: Record) {
        let kind_map = self.by_kind.entry(record.kind()).or_default();
        match kind_map.get(&record.id) {
            Some(existing)
                if (existing.ingested_at, &existing.source_file)
                    >= (record.ingested_at, &record.source_file) => {}
            _ => {
                kind_map.insert(record.id.clone(), record);
            }
        }
    }

    /// Records of one kind, in id order.
    pub fn of_kind(&self, kind: EntityKind) -> Vec<&Record> {
        self.by_kind
            .get(&kind)
            .map(|m| m.values().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.by_kind.get(&kind).map(|m| m.len()).unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.by_kind.values().map(|m| m.len()).sum()
    }
}

/// Aggregate statistics for drivers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverStats {
    pub count: usize,
    pub critical: usize,
    pub high_risk: usize,
    /// Mean safety score over all drivers; 0 when there are none.
    pub mean_safety_score: f64,
}

/// Aggregate statistics for shipments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipmentStats {
    pub count: usize,
    pub anomalies: usize,
    pub total_declared_value: f64,
}

/// Aggregate statistics for invoices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceStats {
    pub count: usize,
    pub overdue: usize,
    pub due_today: usize,
    pub pending: usize,
    pub paid: usize,
    pub total_amount: f64,
    /// `(count - overdue) / count * 100`; 100 when there are no invoices.
    pub compliance_rate: f64,
}

/// Aggregate statistics for vehicles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleStats {
    pub count: usize,
    pub maintenance_due: usize,
    pub mean_utilization: f64,
}

/// The immutable aggregate computed from one record set.
///
/// A new snapshot replaces the old one atomically (behind an `Arc` swap
/// in the cache); nothing mutates a snapshot after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub computed_at: DateTime<Utc>,
    pub files_read: usize,
    pub files_skipped: usize,
    pub drivers: DriverStats,
    pub shipments: ShipmentStats,
    pub invoices: InvoiceStats,
    pub vehicles: VehicleStats,
}

impl Snapshot {
    pub fn total_records(&self) -> usize {
        self.drivers.count + self.shipments.count + self.invoices.count + self.vehicles.count
    }
}
