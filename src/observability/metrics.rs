//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by endpoint, method, status
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency per endpoint
//! - `gateway_backend_calls_total` (counter): backend calls by backend, outcome
//! - `gateway_backend_call_duration_seconds` (histogram): latency per backend
//! - `gateway_gate_rejections_total` (counter): early responses by gate
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; exposition is optional
//! - Labels are bounded: endpoint templates and backend names, never raw paths

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one handled request.
pub fn record_request(method: &str, status: u16, endpoint: &str, start: Instant) {
    let elapsed = start.elapsed().as_secs_f64();

    counter!(
        "gateway_requests_total",
        "endpoint" => endpoint.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!("gateway_request_duration_seconds", "endpoint" => endpoint.to_string())
        .record(elapsed);
}

/// Record one backend call. `outcome` is `ok`, `rejected` or `error`.
pub fn record_backend_call(backend: &str, outcome: &str, start: Instant) {
    let elapsed = start.elapsed().as_secs_f64();

    counter!(
        "gateway_backend_calls_total",
        "backend" => backend.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!("gateway_backend_call_duration_seconds", "backend" => backend.to_string())
        .record(elapsed);
}

/// Record a request answered early by a gate.
pub fn record_gate_rejection(gate: &'static str) {
    counter!("gateway_gate_rejections_total", "gate" => gate).increment(1);
}
