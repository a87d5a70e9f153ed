//! Metrics collection and exposition.
//!
//! # Metrics
//! - `hostmark_requests_total` (counter): requests by host, status
//! - `hostmark_request_duration_seconds` (histogram): handling latency by host
//! - `hostmark_reloads_total` (counter): host reloads by host, kind, outcome
//! - `hostmark_registry_rebuilds_total` (counter): registry rebuilds by outcome
//! - `hostmark_search_queries_total` (counter): search queries by outcome
//!
//! Recording is a no-op until a recorder is installed with [`init_metrics`].

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a handled request.
pub fn record_request(host: &str, status: u16, start: Instant) {
    metrics::counter!(
        "hostmark_requests_total",
        "host" => host.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("hostmark_request_duration_seconds", "host" => host.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record a settings or template reload of one host.
pub fn record_reload(host: &str, kind: &'static str, success: bool) {
    metrics::counter!(
        "hostmark_reloads_total",
        "host" => host.to_string(),
        "kind" => kind,
        "outcome" => outcome(success)
    )
    .increment(1);
}

/// Record a registry rebuild.
pub fn record_rebuild(success: bool) {
    metrics::counter!("hostmark_registry_rebuilds_total", "outcome" => outcome(success)).increment(1);
}

/// Record a search query.
pub fn record_search(success: bool) {
    metrics::counter!("hostmark_search_queries_total", "outcome" => outcome(success)).increment(1);
}

fn outcome(success: bool) -> &'static str {
    if success {
        "ok"
    } else {
        "error"
    }
}
