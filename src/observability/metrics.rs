//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): responses by status
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_rejections_total` (counter): mediation failures by kind
//! - `gateway_backend_call_duration_seconds` (histogram): backend latency by outcome
//! - `gateway_circuit_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `gateway_circuit_transitions_total` (counter): transitions by target state
//! - `gateway_in_flight` (gauge): occupied bulkhead slots
//! - `gateway_tracked_clients` (gauge): client buckets held in memory

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(status: u16, start: Instant) {
    metrics::counter!("gateway_requests_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rejection(kind: &'static str) {
    metrics::counter!("gateway_rejections_total", "kind" => kind).increment(1);
}

pub fn record_backend_call(outcome: &'static str, elapsed: Duration) {
    metrics::histogram!("gateway_backend_call_duration_seconds", "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}

pub fn record_circuit_transition(to: &'static str, state_code: u8) {
    metrics::counter!("gateway_circuit_transitions_total", "to" => to).increment(1);
    metrics::gauge!("gateway_circuit_state").set(f64::from(state_code));
}

pub fn record_in_flight(in_flight: usize) {
    metrics::gauge!("gateway_in_flight").set(in_flight as f64);
}

pub fn record_tracked_clients(count: usize) {
    metrics::gauge!("gateway_tracked_clients").set(count as f64);
}
