//! Dispatch error taxonomy.
//!
//! # Kinds
//! - Configuration: unknown service/endpoint, bad path arguments. Never retried,
//!   never reach the breaker or the transport.
//! - Admission: circuit open. Never attempted.
//! - Transient upstream: timeouts, connection resets, 5xx. Retried with backoff.
//! - Fatal upstream: 4xx and any other transport failure. Surfaced after one attempt.

use serde_json::Value;
use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by the dispatcher to its caller.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// No service registered under this name.
    #[error("Unknown API service: {0}")]
    UnknownService(String),

    /// The service exists but has no such endpoint.
    #[error("Unknown endpoint '{endpoint}' for service '{service}'")]
    UnknownEndpoint { service: String, endpoint: String },

    /// Path arguments do not fit the endpoint's template.
    #[error("Invalid arguments for {service}.{endpoint}: {reason}")]
    InvalidArguments {
        service: String,
        endpoint: String,
        reason: String,
    },

    /// The service's breaker rejected the call.
    #[error("Circuit breaker OPEN for service {0}")]
    CircuitOpen(String),

    /// Upstream answered with a non-2xx status.
    #[error("Upstream responded with status {status}")]
    Upstream { status: u16, body: Value },

    /// The attempt (or the caller's deadline) timed out.
    #[error("Upstream request timed out")]
    Timeout,

    /// The connection was reset mid-flight.
    #[error("Upstream connection reset")]
    ConnectionReset,

    /// Any other transport failure (unknown host, refused connection, bad URL).
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

impl DispatchError {
    /// True for failures worth retrying: timeouts, resets and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            DispatchError::Timeout | DispatchError::ConnectionReset => true,
            DispatchError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Stable machine-readable code for error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::UnknownService(_) => "UNKNOWN_SERVICE",
            DispatchError::UnknownEndpoint { .. } => "UNKNOWN_ENDPOINT",
            DispatchError::InvalidArguments { .. } => "INVALID_ARGUMENTS",
            DispatchError::CircuitOpen(_) => "CIRCUIT_OPEN",
            DispatchError::Upstream { .. } => "UPSTREAM_ERROR",
            DispatchError::Timeout => "TIMEOUT",
            DispatchError::ConnectionReset => "CONNECTION_RESET",
            DispatchError::Transport(_) => "TRANSPORT_ERROR",
        }
    }

    /// Upstream status, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            DispatchError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<TransportError> for DispatchError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Status { status, data } => DispatchError::Upstream { status, body: data },
            TransportError::Timeout => DispatchError::Timeout,
            TransportError::ConnectionReset => DispatchError::ConnectionReset,
            TransportError::Other(msg) => DispatchError::Transport(msg),
        }
    }
}
