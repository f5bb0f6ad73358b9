//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to upstream service:
//!     → circuit_breaker.rs (admission check, per service)
//!     → retries.rs (attempt, classify, backoff.rs between attempts)
//!     → timeouts.rs (optional caller deadline bounds attempts and waits)
//!     → circuit_breaker.rs (every attempt outcome recorded)
//! ```
//!
//! # Design Decisions
//! - Breaker state is per service and shared by all callers of that service
//! - Only transient failures are retried; every failure counts against the breaker
//! - Waits are async sleeps, never blocking other calls

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

use std::time::Duration;

use crate::config::{HalfOpenPolicy, ResilienceConfig};

pub use circuit_breaker::{BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitState, Permit};
pub use retries::RetryExecutor;
pub use timeouts::Deadline;

/// Merged resilience settings for one service.
#[derive(Debug, Clone, PartialEq)]
pub struct ResiliencePolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter: bool,
    pub breaker_threshold: u32,
    pub breaker_reset: Duration,
    pub half_open: HalfOpenPolicy,
}

impl ResiliencePolicy {
    /// Total attempts allowed for one call.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl From<&ResilienceConfig> for ResiliencePolicy {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            max_retries: config.retries,
            base_backoff: Duration::from_millis(config.backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            jitter: config.jitter,
            breaker_threshold: config.breaker_threshold,
            breaker_reset: Duration::from_millis(config.breaker_reset_ms),
            half_open: config.half_open,
        }
    }
}

impl Default for ResiliencePolicy {
    fn default() -> Self {
        Self::from(&ResilienceConfig::default())
    }
}
