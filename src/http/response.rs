//! Response handling for the front door.
//!
//! # Responsibilities
//! - Map dispatch errors to HTTP status codes
//! - Render the JSON error envelope `{ message, code, status? }`
//!
//! # Design Decisions
//! - Upstream failures surface as 502, upstream timeouts as 504
//! - The upstream status and body travel inside the envelope, not as our status

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::error::DispatchError;

/// JSON error body returned to front-door clients.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub message: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorEnvelope {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: "BAD_REQUEST",
            status: None,
            details: None,
        }
    }
}

impl From<&DispatchError> for ErrorEnvelope {
    fn from(err: &DispatchError) -> Self {
        let details = match err {
            DispatchError::Upstream { body, .. } if !body.is_null() => Some(body.clone()),
            _ => None,
        };
        Self {
            message: err.to_string(),
            code: err.code(),
            status: err.status(),
            details,
        }
    }
}

/// HTTP status for a failed dispatch.
pub fn status_for(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::UnknownService(_) | DispatchError::UnknownEndpoint { .. } => StatusCode::NOT_FOUND,
        DispatchError::InvalidArguments { .. } => StatusCode::BAD_REQUEST,
        DispatchError::CircuitOpen(_) => StatusCode::SERVICE_UNAVAILABLE,
        DispatchError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        DispatchError::Upstream { .. } | DispatchError::ConnectionReset | DispatchError::Transport(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

/// Wrapper that lets handlers return `Result<_, ApiError>`.
#[derive(Debug)]
pub struct ApiError(pub StatusCode, pub ErrorEnvelope);

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError(status_for(&err), ErrorEnvelope::from(&err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}
