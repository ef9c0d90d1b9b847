use std::time::Duration;

use metrics::{counter, histogram};

pub fn record_transaction_event(backend: &str, event: &str, owner: &str, status: &str) {
    counter!(
        "rdfstore_transaction_event_total",
        "backend" => backend.to_string(),
        "event" => event.to_string(),
        "owner" => owner.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_auto_commit(backend: &str, action: &str, outcome: &str, duration: Duration) {
    counter!(
        "rdfstore_auto_commit_total",
        "backend" => backend.to_string(),
        "action" => action.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!(
        "rdfstore_auto_commit_duration_seconds",
        "backend" => backend.to_string(),
        "action" => action.to_string(),
        "outcome" => outcome.to_string()
    )
    .record(duration.as_secs_f64());
}

pub fn record_auto_commit_rollback(backend: &str, action: &str, status: &str) {
    counter!(
        "rdfstore_auto_commit_rollback_total",
        "backend" => backend.to_string(),
        "action" => action.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_writer_gate_wait(backend: &str, action: &str, wait: Duration) {
    histogram!(
        "rdfstore_writer_gate_wait_seconds",
        "backend" => backend.to_string(),
        "action" => action.to_string()
    )
    .record(wait.as_secs_f64());
}
