use std::time::Duration;

use metrics::{counter, gauge, histogram};

pub fn record_store_request(
    backend: &str,
    action: &str,
    status: &str,
    error_class: &str,
    duration: Duration,
) {
    counter!(
        "rdfstore_request_total",
        "backend" => backend.to_string(),
        "action" => action.to_string(),
        "status" => status.to_string(),
        "error_class" => error_class.to_string()
    )
    .increment(1);
    histogram!(
        "rdfstore_request_duration_seconds",
        "backend" => backend.to_string(),
        "action" => action.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());
}

pub fn record_store_request_bytes(backend: &str, action: &str, size_bucket: &str, bytes: usize) {
    counter!(
        "rdfstore_request_bytes_total",
        "backend" => backend.to_string(),
        "action" => action.to_string()
    )
    .increment(bytes as u64);
    counter!(
        "rdfstore_request_size_total",
        "backend" => backend.to_string(),
        "action" => action.to_string(),
        "size_bucket" => size_bucket.to_string()
    )
    .increment(1);
}

pub fn record_store_response_bytes(backend: &str, action: &str, bytes: usize) {
    counter!(
        "rdfstore_response_bytes_total",
        "backend" => backend.to_string(),
        "action" => action.to_string()
    )
    .increment(bytes as u64);
}

pub fn record_store_request_cancelled(backend: &str, action: &str, stage: &str) {
    counter!(
        "rdfstore_request_cancelled_total",
        "backend" => backend.to_string(),
        "action" => action.to_string(),
        "stage" => stage.to_string()
    )
    .increment(1);
}

pub fn record_store_permit_wait(backend: &str, action: &str, wait: Duration) {
    histogram!(
        "rdfstore_permit_wait_seconds",
        "backend" => backend.to_string(),
        "action" => action.to_string()
    )
    .record(wait.as_secs_f64());
}

pub fn record_store_permit_snapshot(backend: &str, max: usize, available: usize) {
    gauge!("rdfstore_permits_max", "backend" => backend.to_string()).set(max as f64);
    gauge!("rdfstore_permits_available", "backend" => backend.to_string()).set(available as f64);
    gauge!("rdfstore_permits_in_use", "backend" => backend.to_string())
        .set(max.saturating_sub(available) as f64);
}

pub fn record_store_sequence(backend: &str, action: &str, status: &str, requests: usize) {
    counter!(
        "rdfstore_sequence_total",
        "backend" => backend.to_string(),
        "action" => action.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "rdfstore_sequence_requests",
        "backend" => backend.to_string(),
        "action" => action.to_string()
    )
    .record(requests as f64);
}
