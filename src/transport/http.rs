//! `reqwest`-backed transport.

use std::error::Error as _;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::TransportConfig;
use crate::transport::{Transport, TransportError, TransportRequest, TransportResponse};

/// HTTP transport over a shared, pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let TransportRequest {
            method,
            url,
            headers,
            query,
            body,
            trace_id,
        } = request;

        let mut builder = self.client.request(method.clone(), url.clone());
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        tracing::info!(method = %method, url = %url, trace_id = %trace_id, "HTTP request");

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let err = classify(&e);
                tracing::error!(method = %method, url = %url, trace_id = %trace_id, error = %e, "HTTP error");
                return Err(err);
            }
        };

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            tracing::error!(url = %url, trace_id = %trace_id, status = status.as_u16(), error = %e, "HTTP error reading body");
            classify(&e)
        })?;
        let data = decode_body(&bytes);

        if status.is_success() {
            tracing::info!(status = status.as_u16(), url = %url, trace_id = %trace_id, "HTTP response");
            Ok(TransportResponse {
                status: status.as_u16(),
                data,
            })
        } else {
            tracing::error!(
                status = status.as_u16(),
                data = %data,
                url = %url,
                trace_id = %trace_id,
                "HTTP error"
            );
            Err(TransportError::Status {
                status: status.as_u16(),
                data,
            })
        }
    }
}

/// JSON if it parses, the raw text otherwise, `null` for an empty body.
pub fn decode_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Map a reqwest failure onto the transient/fatal taxonomy.
fn classify(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }

    let mut source = err.source();
    while let Some(inner) = source {
        // Peer hung up before a complete response arrived.
        if let Some(hyper_err) = inner.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() || hyper_err.is_closed() {
                return TransportError::ConnectionReset;
            }
        }
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::TimedOut => return TransportError::Timeout,
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe => {
                    return TransportError::ConnectionReset
                }
                _ => {}
            }
        }
        source = inner.source();
    }

    TransportError::Other(err.to_string())
}
