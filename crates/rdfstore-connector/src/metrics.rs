use std::time::Duration;

use rdfstore_observability as observability;

use crate::{
    error::{Action, StorageError},
    error_classification::error_class,
};

pub(crate) fn record_request(
    backend: &str,
    action: Action,
    error: Option<&StorageError>,
    duration: Duration,
) {
    let status = if error.is_some() { "error" } else { "ok" };
    let error_class = error.map_or("none", error_class);
    observability::record_store_request(backend, action.label(), status, error_class, duration);
}

pub(crate) fn record_request_bytes(backend: &str, action: Action, bytes: usize) {
    observability::record_store_request_bytes(backend, action.label(), bytes_bucket(bytes), bytes);
}

pub(crate) fn record_response_bytes(backend: &str, action: Action, bytes: usize) {
    observability::record_store_response_bytes(backend, action.label(), bytes);
}

pub(crate) fn record_cancelled(backend: &str, action: Action, stage: &str) {
    observability::record_store_request_cancelled(backend, action.label(), stage);
}

pub(crate) fn record_permit_wait(backend: &str, action: Action, wait: Duration) {
    observability::record_store_permit_wait(backend, action.label(), wait);
}

pub(crate) fn record_permit_snapshot(backend: &str, max: usize, available: usize) {
    observability::record_store_permit_snapshot(backend, max, available);
}

pub(crate) fn record_sequence(
    backend: &str,
    action: Action,
    error: Option<&StorageError>,
    requests: usize,
) {
    let status = match error {
        None => "ok",
        Some(StorageError::Cancelled { .. }) => "cancelled",
        Some(_) => "error",
    };
    observability::record_store_sequence(backend, action.label(), status, requests);
}

pub(crate) fn record_transaction_event(backend: &str, event: &str, owner: &str, ok: bool) {
    observability::record_transaction_event(backend, event, owner, if ok { "ok" } else { "error" });
}

pub(crate) fn record_auto_commit(
    backend: &str,
    action: Action,
    error: Option<&StorageError>,
    duration: Duration,
) {
    let outcome = match error {
        None => "committed",
        Some(StorageError::Cancelled { .. }) => "cancelled",
        Some(_) => "rolled_back",
    };
    observability::record_auto_commit(backend, action.label(), outcome, duration);
}

pub(crate) fn record_auto_commit_rollback(backend: &str, action: Action, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    observability::record_auto_commit_rollback(backend, action.label(), status);
}

pub(crate) fn record_writer_gate_wait(backend: &str, action: Action, wait: Duration) {
    observability::record_writer_gate_wait(backend, action.label(), wait);
}

fn bytes_bucket(bytes: usize) -> &'static str {
    match bytes {
        0 => "empty",
        1..=16_384 => "<=16KiB",
        16_385..=65_536 => "16-64KiB",
        65_537..=262_144 => "64-256KiB",
        262_145..=1_048_576 => "256KiB-1MiB",
        _ => ">1MiB",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_buckets() {
        assert_eq!(bytes_bucket(0), "empty");
        assert_eq!(bytes_bucket(16_384), "<=16KiB");
        assert_eq!(bytes_bucket(70_000), "64-256KiB");
        assert_eq!(bytes_bucket(2_000_000), ">1MiB");
    }
}
