//! Request handling for the front door.
//!
//! # Responsibilities
//! - Read the request id assigned by the request-id layer
//! - Decode the `/dispatch` body into a `CallRequest`
//!
//! # Design Decisions
//! - The request id doubles as the upstream trace id
//! - Path arguments may be sent as strings, numbers or booleans

use axum::http::{HeaderMap, HeaderName};
use serde::Deserialize;
use serde_json::Value;

use crate::dispatcher::{CallOptions, CallRequest};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request id from headers, or empty if the layer was bypassed.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Body of `POST /dispatch`.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchBody {
    pub service: String,
    pub endpoint: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub options: CallOptions,
}

impl DispatchBody {
    /// Convert into a dispatcher call traced by `trace_id`.
    pub fn into_call(self, trace_id: String) -> Result<CallRequest, String> {
        let args = self
            .args
            .into_iter()
            .enumerate()
            .map(|(i, arg)| match arg {
                Value::String(s) => Ok(s),
                Value::Number(n) => Ok(n.to_string()),
                Value::Bool(b) => Ok(b.to_string()),
                other => Err(format!("argument {} must be a string, number or boolean, got {}", i, other)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CallRequest {
            service: self.service,
            endpoint: self.endpoint,
            args,
            options: self.options,
            trace_id,
        })
    }
}
