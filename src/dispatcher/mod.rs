//! Resilient service dispatcher.
//!
//! # Data Flow
//! ```text
//! call(service, endpoint, args, options, trace_id)
//!     → Registry::resolve (UnknownService / UnknownEndpoint)
//!     → build request (template(args), auth + trace headers, query, body)
//!     → breaker admission (CircuitOpen fails fast, nothing attempted)
//!     → cache lookup for cacheable reads (hit returns immediately)
//!     → RetryExecutor over the transport (every attempt reported to breaker)
//!     → cache store on success
//! ```
//!
//! # Design Decisions
//! - Breaker and cache stores are owned and injected, never global
//! - Errors are returned unchanged; translating them is the caller's job
//! - Only GET/HEAD on cache-enabled services are cached

pub mod request;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use reqwest::header::{HeaderName, HeaderValue};
use serde_json::Value;
use uuid::Uuid;

use crate::cache::{CacheKey, ResponseCache};
use crate::error::{DispatchError, DispatchResult};
use crate::observability::metrics;
use crate::registry::{EndpointDescriptor, Registry, ServiceDescriptor};
use crate::resilience::{BreakerRegistry, Deadline, RetryExecutor};
use crate::transport::{Transport, TransportRequest};

pub use request::{CallOptions, CallRequest};

/// Header carrying the caller's trace id upstream.
pub const TRACE_HEADER: &str = "x-trace-id";

/// Public entry point: resolves, guards and performs upstream calls.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
    breakers: BreakerRegistry,
    cache: ResponseCache,
}

impl Dispatcher {
    /// Dispatcher with fresh breaker and cache stores.
    pub fn new(registry: Arc<Registry>, transport: Arc<dyn Transport>) -> Self {
        Self::with_stores(registry, transport, BreakerRegistry::new(), ResponseCache::new())
    }

    /// Dispatcher sharing existing breaker and cache stores.
    pub fn with_stores(
        registry: Arc<Registry>,
        transport: Arc<dyn Transport>,
        breakers: BreakerRegistry,
        cache: ResponseCache,
    ) -> Self {
        Self {
            registry,
            transport,
            breakers,
            cache,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Handle bound to one service, validated up front.
    pub fn service(&self, name: &str) -> DispatchResult<ServiceHandle> {
        self.registry.get(name)?;
        Ok(ServiceHandle {
            dispatcher: self.clone(),
            service: name.to_string(),
        })
    }

    /// Positional form of [`Dispatcher::call`].
    pub async fn call_endpoint(
        &self,
        service: &str,
        endpoint: &str,
        args: Vec<String>,
        options: CallOptions,
        trace_id: &str,
    ) -> DispatchResult<Value> {
        self.call(CallRequest {
            service: service.to_string(),
            endpoint: endpoint.to_string(),
            args,
            options,
            trace_id: trace_id.to_string(),
        })
        .await
    }

    /// Perform one logical call. An empty trace id is replaced by a fresh UUID.
    pub async fn call(&self, mut request: CallRequest) -> DispatchResult<Value> {
        let start = Instant::now();
        if request.trace_id.is_empty() {
            request.trace_id = Uuid::new_v4().to_string();
        }
        let result = self.dispatch(&request).await;

        let (service, endpoint) = match &result {
            Err(DispatchError::UnknownService(_)) => ("_unknown", "_unknown"),
            Err(DispatchError::UnknownEndpoint { .. }) => (request.service.as_str(), "_unknown"),
            _ => (request.service.as_str(), request.endpoint.as_str()),
        };
        let outcome = match &result {
            Ok((_, true)) => "cache_hit",
            Ok((_, false)) => "ok",
            Err(e) => e.code(),
        };
        metrics::record_dispatch(service, endpoint, outcome, start);

        result.map(|(payload, _)| payload)
    }

    /// Returns the payload and whether it came from cache.
    async fn dispatch(&self, request: &CallRequest) -> DispatchResult<(Value, bool)> {
        let (service, endpoint) = self.registry.resolve(&request.service, &request.endpoint)?;
        let deadline = request.options.deadline_after().map(Deadline::after);
        let upstream = build_upstream_request(service, endpoint, request)?;

        let breaker = self.breakers.get_or_create(&service.name, &service.resilience);
        let Some(_permit) = breaker.acquire() else {
            tracing::debug!(service = %service.name, trace_id = %request.trace_id, "Rejected by open circuit");
            return Err(DispatchError::CircuitOpen(service.name.clone()));
        };

        let cache_key = (service.cache.enabled && endpoint.is_read())
            .then(|| CacheKey::new(&service.name, &endpoint.key, &request.args, &request.options.query));

        if let Some(key) = &cache_key {
            if let Some(payload) = self.cache.get(key) {
                metrics::record_cache(&service.name, true);
                tracing::debug!(service = %service.name, endpoint = %endpoint.key, trace_id = %request.trace_id, "Cache hit");
                return Ok((payload, true));
            }
            metrics::record_cache(&service.name, false);
        }

        let transport = &self.transport;
        let upstream = &upstream;
        let payload = RetryExecutor::new(&service.resilience, &breaker)
            .with_deadline(deadline)
            .execute(|attempt| {
                tracing::debug!(
                    service = %service.name,
                    endpoint = %endpoint.key,
                    attempt,
                    trace_id = %upstream.trace_id,
                    "Upstream attempt"
                );
                let attempt_request = upstream.clone();
                async move {
                    transport
                        .send(attempt_request)
                        .await
                        .map(|response| response.data)
                        .map_err(DispatchError::from)
                }
            })
            .await?;

        if let Some(key) = cache_key {
            self.cache.put(key, payload.clone(), service.cache.ttl);
        }

        Ok((payload, false))
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("services", &self.registry.len())
            .field("breakers", &self.breakers.len())
            .field("cache_entries", &self.cache.len())
            .finish_non_exhaustive()
    }
}

/// Turn a logical call into a concrete transport request.
fn build_upstream_request(
    service: &ServiceDescriptor,
    endpoint: &EndpointDescriptor,
    request: &CallRequest,
) -> DispatchResult<TransportRequest> {
    let invalid = |reason: String| DispatchError::InvalidArguments {
        service: service.name.clone(),
        endpoint: endpoint.key.clone(),
        reason,
    };

    let path = endpoint.render(&request.args).map_err(|e| invalid(e.to_string()))?;
    let url = service.url_for(&path).map_err(|e| invalid(e.to_string()))?;

    let mut headers = BTreeMap::new();
    if let Some(auth) = service.auth.header() {
        headers.insert(auth.name, auth.value);
    }
    headers.insert(TRACE_HEADER.to_string(), request.trace_id.clone());
    for (name, value) in &request.options.headers {
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid(format!("invalid header name '{}'", name)))?;
        HeaderValue::from_str(value).map_err(|_| invalid(format!("invalid value for header '{}'", name)))?;
        headers.insert(name.to_ascii_lowercase(), value.clone());
    }

    Ok(TransportRequest {
        method: endpoint.method.clone(),
        url,
        headers,
        query: request.options.query.clone(),
        body: request.options.body.clone(),
        trace_id: request.trace_id.clone(),
    })
}

/// A dispatcher bound to one service, e.g. `dispatcher.service("salesforce")?.call("getAccount", ..)`.
#[derive(Clone)]
pub struct ServiceHandle {
    dispatcher: Dispatcher,
    service: String,
}

impl ServiceHandle {
    pub fn name(&self) -> &str {
        &self.service
    }

    /// Endpoint keys this service exposes.
    pub fn endpoints(&self) -> Vec<String> {
        self.dispatcher
            .registry()
            .endpoints(&self.service)
            .map(|endpoints| endpoints.map(|e| e.key.clone()).collect())
            .unwrap_or_default()
    }

    pub async fn call(
        &self,
        endpoint: &str,
        args: Vec<String>,
        options: CallOptions,
        trace_id: &str,
    ) -> DispatchResult<Value> {
        self.dispatcher
            .call_endpoint(&self.service, endpoint, args, options, trace_id)
            .await
    }
}
