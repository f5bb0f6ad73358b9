//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration for the BFF gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration for the dispatch front door.
    pub listener: ListenerConfig,

    /// Upstream HTTP client settings.
    pub transport: TransportConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Process-wide resilience defaults; services override individual fields.
    pub defaults: ResilienceConfig,

    /// Upstream service catalog keyed by service name.
    pub services: BTreeMap<String, ServiceConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4000").
    pub bind_address: String,

    /// Timeout applied to every inbound request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Upstream HTTP client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,

    /// User agent sent to upstreams.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            user_agent: concat!("bff-dispatch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:4001".to_string(),
        }
    }
}

/// Admission policy while a breaker is half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HalfOpenPolicy {
    /// Every call is admitted while half-open.
    #[default]
    Unlimited,
    /// One probe in flight at a time; concurrent callers are rejected.
    SingleProbe,
}

/// Fully specified resilience settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Retry attempts for transient errors (total attempts = retries + 1).
    pub retries: u32,

    /// Base backoff in milliseconds, doubled on every retry.
    pub backoff_ms: u64,

    /// Upper bound on a single backoff wait in milliseconds.
    pub max_backoff_ms: u64,

    /// Add 0-10% random jitter to backoff waits.
    pub jitter: bool,

    /// Consecutive failures that open the breaker.
    pub breaker_threshold: u32,

    /// Time the breaker stays open before probing, in milliseconds.
    pub breaker_reset_ms: u64,

    /// Admission policy while half-open.
    pub half_open: HalfOpenPolicy,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retries: 0,
            backoff_ms: 200,
            max_backoff_ms: 30_000,
            jitter: false,
            breaker_threshold: 5,
            breaker_reset_ms: 15_000,
            half_open: HalfOpenPolicy::Unlimited,
        }
    }
}

/// Per-service resilience overrides. Unset fields fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResilienceOverrides {
    pub retries: Option<u32>,
    pub backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub jitter: Option<bool>,
    pub breaker_threshold: Option<u32>,
    pub breaker_reset_ms: Option<u64>,
    pub half_open: Option<HalfOpenPolicy>,
}

impl ResilienceOverrides {
    /// Merge these overrides over `defaults`.
    pub fn merge(&self, defaults: &ResilienceConfig) -> ResilienceConfig {
        ResilienceConfig {
            retries: self.retries.unwrap_or(defaults.retries),
            backoff_ms: self.backoff_ms.unwrap_or(defaults.backoff_ms),
            max_backoff_ms: self.max_backoff_ms.unwrap_or(defaults.max_backoff_ms),
            jitter: self.jitter.unwrap_or(defaults.jitter),
            breaker_threshold: self.breaker_threshold.unwrap_or(defaults.breaker_threshold),
            breaker_reset_ms: self.breaker_reset_ms.unwrap_or(defaults.breaker_reset_ms),
            half_open: self.half_open.unwrap_or(defaults.half_open),
        }
    }
}

/// Response cache settings for a service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache successful read responses.
    pub enabled: bool,

    /// Entry lifetime in milliseconds.
    pub ttl_ms: u64,
}

/// Authentication header source for a service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication header.
    #[default]
    None,

    /// `Authorization: Bearer <token>`.
    Bearer {
        #[serde(default)]
        token: Option<String>,
        /// Environment variable read on every call.
        #[serde(default)]
        token_env: Option<String>,
    },

    /// Arbitrary header, e.g. an API key.
    Header {
        name: String,
        #[serde(default)]
        value: Option<String>,
        /// Environment variable read on every call.
        #[serde(default)]
        value_env: Option<String>,
    },
}

/// Upstream service definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Base URL every endpoint path is appended to.
    pub base_address: String,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub resilience: ResilienceOverrides,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Endpoint key -> descriptor.
    #[serde(default)]
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

/// Endpoint definition: HTTP method plus a path template like `/sobjects/Account/{id}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    pub method: String,
    pub path: String,
}
