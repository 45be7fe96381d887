//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lifecycle_transitions_total` (counter): controller state entries, by `to`
//! - `lifecycle_bind_failures_total` (counter): failed instance starts
//! - `lifecycle_forced_closes_total` (counter): stops that hit the grace deadline
//! - `endpoint_requests_total` (counter): synthetic endpoint hits, by `status_code`
//! - `endpoint_reported_time_ms` (histogram): latency values echoed by the endpoint
//! - `http_open_connections` (gauge): connections accepted and not yet closed
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(address = %addr, "Metrics exporter started");
    Ok(())
}

pub fn record_transition(to: &'static str) {
    metrics::counter!("lifecycle_transitions_total", "to" => to).increment(1);
}

pub fn record_bind_failure() {
    metrics::counter!("lifecycle_bind_failures_total").increment(1);
}

pub fn record_forced_close() {
    metrics::counter!("lifecycle_forced_closes_total").increment(1);
}

pub fn record_endpoint_hit(status_code: &str, time_ms: i64) {
    metrics::counter!("endpoint_requests_total", "status_code" => status_code.to_string())
        .increment(1);
    metrics::histogram!("endpoint_reported_time_ms").record(time_ms as f64);
}

pub fn set_open_connections(count: u64) {
    metrics::gauge!("http_open_connections").set(count as f64);
}
