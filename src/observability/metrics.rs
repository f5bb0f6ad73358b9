//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bff_dispatch_requests_total` (counter): calls by service, endpoint, outcome
//! - `bff_dispatch_duration_seconds` (histogram): end-to-end call latency
//! - `bff_upstream_attempts_total` (counter): transport attempts by result
//! - `bff_cache_events_total` (counter): cache hits and misses
//! - `bff_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels are low-cardinality: service, endpoint, outcome code

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitState;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished dispatch. `outcome` is `ok`, `cache_hit` or an error code.
pub fn record_dispatch(service: &str, endpoint: &str, outcome: &'static str, start: Instant) {
    counter!(
        "bff_dispatch_requests_total",
        "service" => service.to_string(),
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("bff_dispatch_duration_seconds", "service" => service.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_attempt(service: &str, success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!("bff_upstream_attempts_total", "service" => service.to_string(), "result" => result).increment(1);
}

pub fn record_cache(service: &str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("bff_cache_events_total", "service" => service.to_string(), "result" => result).increment(1);
}

pub fn record_breaker_state(service: &str, state: CircuitState) {
    gauge!("bff_breaker_state", "service" => service.to_string()).set(state.as_gauge());
}
