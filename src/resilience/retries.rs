//! Retry logic.
//!
//! # Responsibilities
//! - Run the single-attempt operation up to `1 + retries` times
//! - Classify failures as transient (retry) or fatal (surface now)
//! - Report every attempt outcome to the service's breaker
//! - Wait with exponential backoff between attempts
//!
//! # Design Decisions
//! - Fatal errors (4xx, unknown host, bad request) are never retried
//! - A fatal failure still counts as a breaker failure
//! - Backoff sleeps are async and respect the caller's deadline

use std::future::Future;

use crate::error::{DispatchError, DispatchResult};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::timeouts::{with_deadline, Deadline};
use crate::resilience::ResiliencePolicy;

/// Executes one logical call as a bounded series of attempts.
pub struct RetryExecutor<'a> {
    policy: &'a ResiliencePolicy,
    breaker: &'a CircuitBreaker,
    deadline: Option<Deadline>,
}

impl<'a> RetryExecutor<'a> {
    pub fn new(policy: &'a ResiliencePolicy, breaker: &'a CircuitBreaker) -> Self {
        Self {
            policy,
            breaker,
            deadline: None,
        }
    }

    /// Bound all attempts and waits by `deadline`.
    pub fn with_deadline(mut self, deadline: Option<Deadline>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run `attempt_fn` (given the 1-indexed attempt number) until it succeeds,
    /// fails fatally, or the attempt budget is spent.
    pub async fn execute<F, Fut, T>(&self, mut attempt_fn: F) -> DispatchResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = DispatchResult<T>>,
    {
        let max_attempts = self.policy.max_attempts();
        let service = self.breaker.service();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match with_deadline(self.deadline, attempt_fn(attempt)).await {
                Ok(value) => {
                    self.breaker.record_success();
                    metrics::record_attempt(service, true);
                    return Ok(value);
                }
                Err(err) => {
                    self.breaker.record_failure();
                    metrics::record_attempt(service, false);

                    if !err.is_transient() || attempt >= max_attempts {
                        tracing::debug!(
                            service = %service,
                            attempt,
                            max_attempts,
                            transient = err.is_transient(),
                            error = %err,
                            "Giving up on upstream call"
                        );
                        return Err(err);
                    }

                    let delay = calculate_backoff(
                        attempt,
                        self.policy.base_backoff,
                        self.policy.max_backoff,
                        self.policy.jitter,
                    );

                    if let Some(deadline) = self.deadline {
                        if !deadline.allows(delay) {
                            tracing::debug!(service = %service, attempt, delay = ?delay, "Deadline leaves no room for another attempt");
                            return Err(DispatchError::Timeout);
                        }
                    }

                    tracing::info!(service = %service, attempt, delay = ?delay, error = %err, "Retrying upstream call");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn policy(retries: u32, backoff_ms: u64) -> ResiliencePolicy {
        ResiliencePolicy {
            max_retries: retries,
            base_backoff: Duration::from_millis(backoff_ms),
            breaker_threshold: 100,
            ..ResiliencePolicy::default()
        }
    }

    fn unavailable() -> DispatchError {
        DispatchError::Upstream {
            status: 503,
            body: Value::Null,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let policy = policy(2, 300);
        let breaker = CircuitBreaker::new("sf", &policy);
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = RetryExecutor::new(&policy, &breaker)
            .execute(|_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(unavailable())
                    } else {
                        Ok("payload")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "payload");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(900));

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.total_failures, 2);
        assert_eq!(snapshot.total_successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_not_retried() {
        let policy = policy(5, 100);
        let breaker = CircuitBreaker::new("sf", &policy);
        let calls = AtomicU32::new(0);

        let result: DispatchResult<()> = RetryExecutor::new(&policy, &breaker)
            .execute(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(DispatchError::Upstream {
                        status: 400,
                        body: Value::Null,
                    })
                }
            })
            .await;

        assert_eq!(result.unwrap_err().status(), Some(400));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.snapshot().total_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_bounded() {
        let policy = policy(3, 10);
        let breaker = CircuitBreaker::new("sf", &policy);
        let calls = AtomicU32::new(0);

        let result: DispatchResult<()> = RetryExecutor::new(&policy, &breaker)
            .execute(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                assert!(attempt <= 4);
                async { Err(DispatchError::ConnectionReset) }
            })
            .await;

        assert!(matches!(result, Err(DispatchError::ConnectionReset)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(breaker.snapshot().total_failures, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cuts_backoff_short() {
        let policy = policy(5, 400);
        let breaker = CircuitBreaker::new("sf", &policy);
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: DispatchResult<()> = RetryExecutor::new(&policy, &breaker)
            .with_deadline(Some(Deadline::after(Duration::from_millis(1000))))
            .execute(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(DispatchError::Timeout) }
            })
            .await;

        // Waits 400ms after attempt 1; the 800ms wait after attempt 2 would overrun.
        assert!(matches!(result, Err(DispatchError::Timeout)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(400));
    }
}
