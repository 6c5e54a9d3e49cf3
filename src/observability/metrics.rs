//! Metrics collection and exposition.
//!
//! # Metrics
//! - `vhost_requests_total` (counter): requests by host, route, status
//! - `vhost_request_duration_seconds` (histogram): latency distribution
//! - `vhost_route_misses_total` (counter): requests no route accepted
//! - `vhost_actions_not_found_total` (counter): action dispatch misses
//! - `vhost_cache_hits_total` (counter): responses served from a host cache
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Prometheus exporter only when enabled in config

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a served request.
pub fn record_request(host: &str, route: &str, status: u16, start: Instant) {
    counter!(
        "vhost_requests_total",
        "host" => host.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("vhost_request_duration_seconds", "host" => host.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record a request that matched no route.
pub fn record_route_miss(host: &str) {
    counter!("vhost_route_misses_total", "host" => host.to_string()).increment(1);
}

/// Record an action dispatch that found no registered action.
pub fn record_action_not_found() {
    counter!("vhost_actions_not_found_total").increment(1);
}

/// Record a response served from cache.
pub fn record_cache_hit(host: &str) {
    counter!("vhost_cache_hits_total", "host" => host.to_string()).increment(1);
}
