//! Call request types.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-call options supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CallOptions {
    /// Extra headers; these win over the auth and trace headers on conflict.
    pub headers: BTreeMap<String, String>,

    /// Query string parameters. Part of the cache key.
    #[serde(alias = "params", alias = "queryParams")]
    pub query: BTreeMap<String, String>,

    /// JSON request body.
    #[serde(alias = "data")]
    pub body: Option<Value>,

    /// Overall deadline for the call, retries and backoff included.
    #[serde(alias = "timeoutMs")]
    pub timeout_ms: Option<u64>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn deadline_after(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// One logical upstream call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub service: String,
    pub endpoint: String,
    /// Positional path arguments, bound to the endpoint's template.
    pub args: Vec<String>,
    pub options: CallOptions,
    pub trace_id: String,
}

impl CallRequest {
    pub fn new(service: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            endpoint: endpoint.into(),
            args: Vec::new(),
            options: CallOptions::default(),
            trace_id: String::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }
}
