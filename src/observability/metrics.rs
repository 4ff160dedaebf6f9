//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, backend
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_backend_health` (gauge): 1=alive, 0=dead
//! - `proxy_retries_total` (counter): same-backend retries by backend
//! - `proxy_reroutes_total` (counter): backends marked down by failover
//! - `proxy_unavailable_total` (counter): 503 decisions by reason
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics recorder"),
    }
}

pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_backend_health(backend: &str, alive: bool) {
    metrics::gauge!("proxy_backend_health", "backend" => backend.to_string())
        .set(if alive { 1.0 } else { 0.0 });
}

pub fn record_retry(backend: &str) {
    metrics::counter!("proxy_retries_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_reroute(backend: &str) {
    metrics::counter!("proxy_reroutes_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_unavailable(reason: &'static str) {
    metrics::counter!("proxy_unavailable_total", "reason" => reason).increment(1);
}
