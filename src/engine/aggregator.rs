//! Snapshot computation and classification policy.
//!
//! Everything here is a pure function of its inputs: the record set, the
//! evaluation instant, and the metric precision. No wall clock, no
//! randomness — the same inputs always produce a bit-identical snapshot.

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{
    DriverStats, EntityKind, InvoiceStats, PaymentStatus, Record, RecordBody, RecordSet, RiskTier,
    ShipmentStats, Snapshot, VehicleStats,
};
use crate::store::loader::LoadOutcome;

/// Scores strictly below this are `critical`.
pub const CRITICAL_SCORE_CEILING: f64 = 5.0;
/// Scores strictly below this (and at/above critical) are `high`.
pub const HIGH_SCORE_CEILING: f64 = 7.0;
/// Route deviations strictly above this flag an anomaly.
pub const ANOMALY_DEVIATION_KM: f64 = 30.0;

/// Classify a driver's safety score into a risk tier.
///
/// Boundaries belong to the stricter tier: exactly 5.0 is `high`,
/// exactly 7.0 is `normal`.
pub fn classify_driver(safety_score: f64) -> RiskTier {
    if safety_score < CRITICAL_SCORE_CEILING {
        RiskTier::Critical
    } else if safety_score < HIGH_SCORE_CEILING {
        RiskTier::High
    } else {
        RiskTier::Normal
    }
}

/// Whether a shipment's route deviation counts as an anomaly.
/// Exactly 30 km is not anomalous.
pub fn is_anomalous(route_deviation_km: f64) -> bool {
    route_deviation_km > ANOMALY_DEVIATION_KM
}

/// Effective urgency of an invoice on the evaluation date.
///
/// A paid invoice stays paid; an invoice without a due date keeps its
/// declared status. Otherwise the due date decides: strictly past is
/// overdue, today is due-today, future is pending.
pub fn invoice_urgency(
    declared: PaymentStatus,
    due_date: Option<NaiveDate>,
    as_of: NaiveDate,
) -> PaymentStatus {
    if declared == PaymentStatus::Paid {
        return PaymentStatus::Paid;
    }
    match due_date {
        Some(due) if due < as_of => PaymentStatus::Overdue,
        Some(due) if due == as_of => PaymentStatus::DueToday,
        Some(_) => PaymentStatus::Pending,
        None => declared,
    }
}

/// Round half away from zero to `precision` decimal places.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Compute the snapshot for one load outcome.
///
/// `as_of` doubles as the snapshot's `computed_at` and as the evaluation
/// date for invoice urgency.
pub fn aggregate(outcome: &LoadOutcome, as_of: DateTime<Utc>, precision: u32) -> Snapshot {
    let records = &outcome.records;

    Snapshot {
        computed_at: as_of,
        files_read: outcome.files_read,
        files_skipped: outcome.files_skipped,
        drivers: driver_stats(&records.of_kind(EntityKind::Driver), precision),
        shipments: shipment_stats(&records.of_kind(EntityKind::Shipment)),
        invoices: invoice_stats(
            &records.of_kind(EntityKind::Invoice),
            as_of.date_naive(),
            precision,
        ),
        vehicles: vehicle_stats(&records.of_kind(EntityKind::Vehicle), precision),
    }
}

fn driver_stats(drivers: &[&Record], precision: u32) -> DriverStats {
    let mut stats = DriverStats {
        count: drivers.len(),
        ..DriverStats::default()
    };

    let mut score_sum = 0.0;
    for record in drivers {
        if let RecordBody::Driver { safety_score, .. } = record.body {
            score_sum += safety_score;
            match classify_driver(safety_score) {
                RiskTier::Critical => stats.critical += 1,
                RiskTier::High => stats.high_risk += 1,
                RiskTier::Normal => {}
            }
        }
    }

    if !drivers.is_empty() {
        stats.mean_safety_score = round_to(score_sum / drivers.len() as f64, precision);
    }
    stats
}

fn shipment_stats(shipments: &[&Record]) -> ShipmentStats {
    let mut stats = ShipmentStats {
        count: shipments.len(),
        ..ShipmentStats::default()
    };

    for record in shipments {
        if let RecordBody::Shipment {
            route_deviation_km,
            declared_value,
            ..
        } = record.body
        {
            if is_anomalous(route_deviation_km) {
                stats.anomalies += 1;
            }
            stats.total_declared_value += declared_value;
        }
    }
    stats
}

fn invoice_stats(invoices: &[&Record], as_of: NaiveDate, precision: u32) -> InvoiceStats {
    let mut stats = InvoiceStats {
        count: invoices.len(),
        compliance_rate: 100.0,
        ..InvoiceStats::default()
    };

    for record in invoices {
        if let RecordBody::Invoice {
            amount,
            due_date,
            payment_status,
        } = record.body
        {
            stats.total_amount += amount;
            match invoice_urgency(payment_status, due_date, as_of) {
                PaymentStatus::Overdue => stats.overdue += 1,
                PaymentStatus::DueToday => stats.due_today += 1,
                PaymentStatus::Pending => stats.pending += 1,
                PaymentStatus::Paid => stats.paid += 1,
            }
        }
    }

    if stats.count > 0 {
        let compliant = (stats.count - stats.overdue) as f64;
        stats.compliance_rate = round_to(compliant / stats.count as f64 * 100.0, precision);
    }
    stats
}

fn vehicle_stats(vehicles: &[&Record], precision: u32) -> VehicleStats {
    let mut stats = VehicleStats {
        count: vehicles.len(),
        ..VehicleStats::default()
    };

    let mut utilization_sum = 0.0;
    for record in vehicles {
        if let RecordBody::Vehicle {
            utilization_rate,
            maintenance_due,
        } = record.body
        {
            utilization_sum += utilization_rate;
            if maintenance_due {
                stats.maintenance_due += 1;
            }
        }
    }

    if !vehicles.is_empty() {
        stats.mean_utilization = round_to(utilization_sum / vehicles.len() as f64, precision);
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap()
    }

    fn record(id: &str, body: RecordBody) -> Record {
        Record {
            id: id.to_string(),
            ingested_at: as_of(),
            source_file: PathBuf::from("test.json"),
            body,
        }
    }

    fn driver(id: &str, score: f64) -> Record {
        record(
            id,
            RecordBody::Driver {
                name: None,
                safety_score: score,
                incident_count: 0,
            },
        )
    }

    fn shipment(id: &str, deviation: f64, value: f64) -> Record {
        record(
            id,
            RecordBody::Shipment {
                route: None,
                route_deviation_km: deviation,
                declared_value: value,
            },
        )
    }

    fn invoice(id: &str, amount: f64, due: Option<NaiveDate>, status: PaymentStatus) -> Record {
        record(
            id,
            RecordBody::Invoice {
                amount,
                due_date: due,
                payment_status: status,
            },
        )
    }

    fn outcome_of(records: Vec<Record>) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();
        for r in records {
            outcome.records.insert(r);
        }
        outcome
    }

    #[test]
    fn test_risk_tier_boundaries() {
        assert_eq!(classify_driver(7.0), RiskTier::Normal);
        assert_eq!(classify_driver(6.999), RiskTier::High);
        assert_eq!(classify_driver(5.0), RiskTier::High);
        assert_eq!(classify_driver(4.999), RiskTier::Critical);
    }

    #[test]
    fn test_anomaly_boundary() {
        assert!(!is_anomalous(30.0));
        assert!(is_anomalous(30.01));
        assert!(!is_anomalous(0.0));
    }

    #[test]
    fn test_invoice_urgency_by_due_date() {
        let today = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2025, 9, 30).unwrap();
        let tomorrow = NaiveDate::from_ymd_opt(2025, 10, 2).unwrap();

        let pending = PaymentStatus::Pending;
        assert_eq!(invoice_urgency(pending, Some(yesterday), today), PaymentStatus::Overdue);
        assert_eq!(invoice_urgency(pending, Some(today), today), PaymentStatus::DueToday);
        assert_eq!(invoice_urgency(pending, Some(tomorrow), today), PaymentStatus::Pending);
        // Paid invoices are never reclassified by date.
        assert_eq!(
            invoice_urgency(PaymentStatus::Paid, Some(yesterday), today),
            PaymentStatus::Paid
        );
        // No due date keeps the declared status.
        assert_eq!(
            invoice_urgency(PaymentStatus::Overdue, None, today),
            PaymentStatus::Overdue
        );
    }

    #[test]
    fn test_mean_safety_score_scenario() {
        // Drivers [9.2, 7.1, 8.8]: mean 8.37 at two decimals, no one
        // below 7.0, so zero high-risk and zero critical.
        let outcome = outcome_of(vec![
            driver("D-001", 9.2),
            driver("D-002", 7.1),
            driver("D-003", 8.8),
        ]);
        let snap = aggregate(&outcome, as_of(), 2);

        assert_eq!(snap.drivers.count, 3);
        assert_eq!(snap.drivers.mean_safety_score, 8.37);
        assert_eq!(snap.drivers.high_risk, 0);
        assert_eq!(snap.drivers.critical, 0);
    }

    #[test]
    fn test_empty_set_has_zero_means_and_full_compliance() {
        let snap = aggregate(&LoadOutcome::default(), as_of(), 2);
        assert_eq!(snap.drivers.mean_safety_score, 0.0);
        assert_eq!(snap.invoices.compliance_rate, 100.0);
        assert_eq!(snap.vehicles.mean_utilization, 0.0);
        assert_eq!(snap.total_records(), 0);
    }

    #[test]
    fn test_shipment_totals_and_anomalies() {
        let outcome = outcome_of(vec![
            shipment("SH-001", 0.0, 125000.0),
            shipment("SH-002", 45.0, 89000.0),
            shipment("SH-003", 30.0, 156000.0),
        ]);
        let snap = aggregate(&outcome, as_of(), 2);

        assert_eq!(snap.shipments.anomalies, 1);
        assert_eq!(snap.shipments.total_declared_value, 370000.0);
    }

    #[test]
    fn test_compliance_rate() {
        let overdue_due = NaiveDate::from_ymd_opt(2025, 9, 28).unwrap();
        let future_due = NaiveDate::from_ymd_opt(2025, 10, 10).unwrap();
        let outcome = outcome_of(vec![
            invoice("INV-001", 12500.0, Some(future_due), PaymentStatus::Pending),
            invoice("INV-002", 8300.0, Some(overdue_due), PaymentStatus::Pending),
            invoice("INV-003", 15600.0, Some(future_due), PaymentStatus::Pending),
            invoice("INV-004", 9200.0, NaiveDate::from_ymd_opt(2025, 10, 1), PaymentStatus::Pending),
        ]);
        let snap = aggregate(&outcome, as_of(), 2);

        assert_eq!(snap.invoices.overdue, 1);
        assert_eq!(snap.invoices.due_today, 1);
        assert_eq!(snap.invoices.pending, 2);
        assert_eq!(snap.invoices.compliance_rate, 75.0);
        assert_eq!(snap.invoices.total_amount, 45600.0);
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let build = || {
            outcome_of(vec![
                driver("D-001", 6.2),
                driver("D-002", 4.0),
                shipment("SH-001", 31.0, 500.0),
            ])
        };
        let first = aggregate(&build(), as_of(), 2);
        let second = aggregate(&build(), as_of(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_rounding_precision() {
        assert_eq!(round_to(8.3666666, 2), 8.37);
        assert_eq!(round_to(8.3666666, 1), 8.4);
        assert_eq!(round_to(75.0, 2), 75.0);
    }
}
