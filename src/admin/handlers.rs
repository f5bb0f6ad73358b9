use axum::{extract::State, Json};
use serde::Serialize;

use crate::config::HalfOpenPolicy;
use crate::http::server::AppState;
use crate::resilience::{BreakerSnapshot, CircuitState};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub services: usize,
    pub open_breakers: usize,
    pub cache_entries: usize,
}

#[derive(Serialize)]
pub struct EndpointSummary {
    pub key: String,
    pub method: String,
    pub path: String,
}

#[derive(Serialize)]
pub struct ServiceSummary {
    pub name: String,
    pub base_address: String,
    pub retries: u32,
    pub backoff_ms: u64,
    pub breaker_threshold: u32,
    pub breaker_reset_ms: u64,
    pub half_open: HalfOpenPolicy,
    pub cache_enabled: bool,
    pub cache_ttl_ms: u64,
    pub endpoints: Vec<EndpointSummary>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let dispatcher = &state.dispatcher;
    let open_breakers = dispatcher
        .breakers()
        .snapshots()
        .iter()
        .filter(|s| s.state == CircuitState::Open)
        .count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        services: dispatcher.registry().len(),
        open_breakers,
        cache_entries: dispatcher.cache().len(),
    })
}

/// One snapshot per registered service. Services never called report closed.
pub async fn get_breakers(State(state): State<AppState>) -> Json<Vec<BreakerSnapshot>> {
    let dispatcher = &state.dispatcher;
    let snapshots = dispatcher
        .registry()
        .services()
        .map(|service| match dispatcher.breakers().get(&service.name) {
            Some(breaker) => breaker.snapshot(),
            None => BreakerSnapshot::untouched(&service.name),
        })
        .collect();
    Json(snapshots)
}

pub async fn get_cache(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cache = state.dispatcher.cache();
    let total = cache.len();
    let expired = cache.purge_expired();
    Json(serde_json::json!({
        "entries": total.saturating_sub(expired),
        "purged_expired": expired,
    }))
}

pub async fn get_services(State(state): State<AppState>) -> Json<Vec<ServiceSummary>> {
    let services = state
        .dispatcher
        .registry()
        .services()
        .map(|s| ServiceSummary {
            name: s.name.clone(),
            base_address: s.base_address.to_string(),
            retries: s.resilience.max_retries,
            backoff_ms: s.resilience.base_backoff.as_millis() as u64,
            breaker_threshold: s.resilience.breaker_threshold,
            breaker_reset_ms: s.resilience.breaker_reset.as_millis() as u64,
            half_open: s.resilience.half_open,
            cache_enabled: s.cache.enabled,
            cache_ttl_ms: s.cache.ttl.as_millis() as u64,
            endpoints: s
                .endpoints
                .values()
                .map(|e| EndpointSummary {
                    key: e.key.clone(),
                    method: e.method.to_string(),
                    path: e.path.to_string(),
                })
                .collect(),
        })
        .collect();
    Json(services)
}
