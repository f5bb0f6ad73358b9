//! Caller deadlines.
//!
//! # Responsibilities
//! - Bound each attempt by the time the caller has left
//! - Refuse backoff waits that would outlive the caller
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities (and its clock, so tests can pause time)
//! - An expired deadline surfaces as `DispatchError::Timeout`

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{DispatchError, DispatchResult};

/// Absolute point in time after which a call is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Time left, or `None` once expired.
    pub fn remaining(&self) -> Option<Duration> {
        let left = self.at.saturating_duration_since(Instant::now());
        (!left.is_zero()).then_some(left)
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_none()
    }

    /// Whether a wait of `delay` would still leave time for another attempt.
    pub fn allows(&self, delay: Duration) -> bool {
        self.remaining().is_some_and(|left| delay < left)
    }
}

/// Run `fut`, failing with `Timeout` if `deadline` passes first.
pub async fn with_deadline<F, T>(deadline: Option<Deadline>, fut: F) -> DispatchResult<T>
where
    F: Future<Output = DispatchResult<T>>,
{
    match deadline {
        None => fut.await,
        Some(deadline) => tokio::time::timeout_at(deadline.at, fut)
            .await
            .unwrap_or(Err(DispatchError::Timeout)),
    }
}
