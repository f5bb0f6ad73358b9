//! Upstream transport subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher builds TransportRequest (method, url, headers, query, body)
//!     → Transport::send (one attempt, no retries here)
//!     → http.rs (reqwest client, request/response logging)
//!     → TransportResponse { status, data } on 2xx
//!     → TransportError on non-2xx or network failure
//! ```
//!
//! # Design Decisions
//! - A trait seam so the dispatcher can be driven by scripted transports in tests
//! - Non-2xx responses are errors carrying the upstream status and body
//! - Network failures are classified here (timeout / reset / other)

pub mod http;

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use url::Url;

pub use http::HttpTransport;

/// One concrete upstream request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    /// Lower-cased header names.
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub trace_id: String,
}

/// Successful (2xx) upstream response.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub data: Value,
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Upstream answered with a non-2xx status.
    #[error("upstream returned status {status}")]
    Status { status: u16, data: Value },

    #[error("request timed out")]
    Timeout,

    #[error("connection reset by peer")]
    ConnectionReset,

    /// Anything else: DNS failure, refused connection, malformed request.
    #[error("{0}")]
    Other(String),
}

/// Performs a single upstream attempt.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
