//! Core metrics definitions.
//!
//! All metrics follow Prometheus naming conventions (`_total` suffix for
//! counters). The CLI installs no exporter; an embedding process may.

use metrics::{counter, describe_counter};

/// Register all core metrics with descriptions.
pub fn register_core_metrics() {
    describe_counter!(
        "fleet_lifecycle_operations_total",
        "Lifecycle operations per tenant (by action, outcome)"
    );
    describe_counter!("fleet_backups_total", "Archives produced (by subject, outcome)");
    describe_counter!("fleet_restores_total", "Archive restores (by subject, outcome)");
    describe_counter!("fleet_ledger_writes_total", "Status ledger writes (by outcome)");
}

pub fn record_lifecycle(action: &str, outcome: &str) {
    counter!(
        "fleet_lifecycle_operations_total",
        "action" => action.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_backup(subject: &str, outcome: &str) {
    counter!("fleet_backups_total", "subject" => subject.to_string(), "outcome" => outcome.to_string())
        .increment(1);
}

pub fn record_restore(subject: &str, outcome: &str) {
    counter!("fleet_restores_total", "subject" => subject.to_string(), "outcome" => outcome.to_string())
        .increment(1);
}

pub fn record_ledger_write(outcome: &str) {
    counter!("fleet_ledger_writes_total", "outcome" => outcome.to_string()).increment(1);
}
