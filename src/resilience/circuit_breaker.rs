//! Circuit breaker for upstream service protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: service assumed down, calls fail fast
//! - Half-Open: probing whether the service recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold
//! Open → Half-Open: first admission check after the reset interval
//! Half-Open → Closed: a call succeeds
//! Half-Open → Open: a call fails (reset interval restarts)
//! ```
//!
//! # Design Decisions
//! - Per-service breaker (not global), created lazily on first call
//! - Fail fast in Open state (no waiting for timeout)
//! - Open → Half-Open happens inside `admit()`, there is no background timer
//! - Half-Open admission is configurable: unlimited or a single probe
//! - Outcomes reported while Open (calls admitted earlier) never move the state

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::HalfOpenPolicy;
use crate::observability::metrics;
use crate::resilience::ResiliencePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge encoding: 0 closed, 1 half-open, 2 open.
    pub fn as_gauge(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Id of the in-flight half-open probe (single-probe policy only).
    probe: Option<u64>,
    next_probe_id: u64,
    total_successes: u64,
    total_failures: u64,
    total_rejections: u64,
}

/// Point-in-time view of a breaker, for the admin API and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub service: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Time left before an open breaker starts probing.
    pub retry_in_ms: Option<u64>,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
}

impl BreakerSnapshot {
    /// View of a service whose breaker has not been created yet.
    pub fn untouched(service: &str) -> Self {
        Self {
            service: service.to_string(),
            state: CircuitState::Closed,
            consecutive_failures: 0,
            retry_in_ms: None,
            total_successes: 0,
            total_failures: 0,
            total_rejections: 0,
        }
    }
}

/// Admission-control state machine for one service.
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    threshold: u32,
    reset: Duration,
    half_open: HalfOpenPolicy,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, policy: &ResiliencePolicy) -> Self {
        Self {
            service: service.into(),
            threshold: policy.breaker_threshold.max(1),
            reset: policy.breaker_reset,
            half_open: policy.half_open,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe: None,
                next_probe_id: 0,
                total_successes: 0,
                total_failures: 0,
                total_rejections: 0,
            }),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // State is plain data; a panic elsewhere cannot leave it half-written.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check admission, moving Open → Half-Open once the reset interval elapsed.
    ///
    /// Under the single-probe policy an admitted probe stays outstanding until
    /// an outcome is recorded; prefer [`CircuitBreaker::acquire`] for that.
    pub fn admit(&self) -> bool {
        self.try_admit().is_some()
    }

    /// Like [`CircuitBreaker::admit`], but returns a permit that frees a
    /// half-open probe slot if dropped before an outcome is recorded.
    pub fn acquire(self: &Arc<Self>) -> Option<Permit> {
        self.try_admit().map(|probe| Permit {
            breaker: Arc::clone(self),
            probe,
        })
    }

    /// `None` = rejected, `Some(probe)` = admitted (`probe` set when this call holds the probe slot).
    fn try_admit(&self) -> Option<Option<u64>> {
        let mut s = self.lock();

        if s.state == CircuitState::Open {
            let elapsed = s.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::MAX);
            if elapsed < self.reset {
                s.total_rejections += 1;
                return None;
            }
            self.transition(&mut s, CircuitState::HalfOpen);
        }

        match (s.state, self.half_open) {
            (CircuitState::HalfOpen, HalfOpenPolicy::SingleProbe) => {
                if s.probe.is_some() {
                    s.total_rejections += 1;
                    return None;
                }
                let id = s.next_probe_id;
                s.next_probe_id += 1;
                s.probe = Some(id);
                Some(Some(id))
            }
            _ => Some(None),
        }
    }

    /// Report a successful attempt.
    pub fn record_success(&self) {
        let mut s = self.lock();
        s.total_successes += 1;
        s.probe = None;
        match s.state {
            CircuitState::Closed => s.consecutive_failures = 0,
            CircuitState::HalfOpen => self.transition(&mut s, CircuitState::Closed),
            CircuitState::Open => {}
        }
    }

    /// Report a failed attempt.
    pub fn record_failure(&self) {
        let mut s = self.lock();
        s.total_failures += 1;
        s.consecutive_failures = s.consecutive_failures.saturating_add(1);
        s.probe = None;
        match s.state {
            CircuitState::Closed if s.consecutive_failures >= self.threshold => {
                self.transition(&mut s, CircuitState::Open);
            }
            CircuitState::HalfOpen => self.transition(&mut s, CircuitState::Open),
            _ => {}
        }
    }

    /// Free the half-open probe slot held by `probe` without reporting an outcome.
    fn release(&self, probe: u64) {
        let mut s = self.lock();
        if s.probe == Some(probe) {
            s.probe = None;
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let s = self.lock();
        let retry_in_ms = match (s.state, s.opened_at) {
            (CircuitState::Open, Some(at)) => {
                Some(u64::try_from(self.reset.saturating_sub(at.elapsed()).as_millis()).unwrap_or(u64::MAX))
            }
            _ => None,
        };
        BreakerSnapshot {
            service: self.service.clone(),
            state: s.state,
            consecutive_failures: s.consecutive_failures,
            retry_in_ms,
            total_successes: s.total_successes,
            total_failures: s.total_failures,
            total_rejections: s.total_rejections,
        }
    }

    fn transition(&self, s: &mut BreakerState, to: CircuitState) {
        let from = s.state;
        s.state = to;
        match to {
            CircuitState::Closed => {
                s.consecutive_failures = 0;
                s.opened_at = None;
                tracing::info!(service = %self.service, from = ?from, "Circuit breaker closed");
            }
            CircuitState::Open => {
                s.opened_at = Some(Instant::now());
                tracing::warn!(
                    service = %self.service,
                    from = ?from,
                    failures = s.consecutive_failures,
                    reset_ms = self.reset.as_millis() as u64,
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                tracing::info!(service = %self.service, "Circuit breaker half-open, probing upstream");
            }
        }
        metrics::record_breaker_state(&self.service, to);
    }
}

/// Proof of admission. Frees an unused half-open probe slot on drop.
#[derive(Debug)]
pub struct Permit {
    breaker: Arc<CircuitBreaker>,
    probe: Option<u64>,
}

impl Permit {
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(probe) = self.probe.take() {
            self.breaker.release(probe);
        }
    }
}

/// Lazily populated map of service name → breaker, shared by all callers.
#[derive(Debug, Clone, Default)]
pub struct BreakerRegistry {
    inner: Arc<DashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Breaker for `service`, created on first use with `policy`.
    pub fn get_or_create(&self, service: &str, policy: &ResiliencePolicy) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.inner.get(service) {
            return Arc::clone(existing.value());
        }
        self.inner
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(service, policy)))
            .value()
            .clone()
    }

    pub fn get(&self, service: &str) -> Option<Arc<CircuitBreaker>> {
        self.inner.get(service).map(|r| Arc::clone(r.value()))
    }

    /// Snapshots of every breaker created so far, sorted by service.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut all: Vec<_> = self.inner.iter().map(|r| r.value().snapshot()).collect();
        all.sort_by(|a, b| a.service.cmp(&b.service));
        all
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
