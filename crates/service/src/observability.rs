use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_gauge, Encoder, IntCounter, IntGauge, TextEncoder};

// Prometheus metrics (default registry)
pub static RESERVATIONS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "parking_reservations_created_total",
        "Total reservations created"
    )
    .expect("register reservations_created_total")
});

pub static RESERVATIONS_UPDATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "parking_reservations_updated_total",
        "Total reservations updated"
    )
    .expect("register reservations_updated_total")
});

pub static RESERVATIONS_CANCELLED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "parking_reservations_cancelled_total",
        "Total reservations cancelled"
    )
    .expect("register reservations_cancelled_total")
});

pub static CONFLICTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "parking_reservation_conflicts_total",
        "Total reservation requests rejected because the spot was taken"
    )
    .expect("register conflicts_total")
});

pub static PERSISTENCE_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "parking_persistence_failures_total",
        "Total failed writes of the reservation file"
    )
    .expect("register persistence_failures_total")
});

pub static BACKUP_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "parking_backup_failures_total",
        "Total failed writes of the backup copy"
    )
    .expect("register backup_failures_total")
});

pub static ACTIVE_RESERVATIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "parking_active_reservations",
        "Reservations currently held by the store"
    )
    .expect("register active_reservations")
});

/// Render the default registry in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buf) {
        tracing::warn!(error = %e, "metrics encoding failed");
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gathered_text_contains_registered_metrics() {
        RESERVATIONS_CREATED_TOTAL.inc();
        ACTIVE_RESERVATIONS.set(3);
        let text = gather_metrics();
        assert!(text.contains("parking_reservations_created_total"));
        assert!(text.contains("parking_active_reservations"));
    }
}
