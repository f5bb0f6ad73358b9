//! Shared utilities for integration testing.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bff_dispatch::config::loader::parse_config;
use bff_dispatch::transport::HttpTransport;
use bff_dispatch::{Dispatcher, GatewayConfig, Registry};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// What the mock backend saw.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path plus query string, as sent on the request line.
    pub target: String,
    /// Lower-cased header names.
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// Start a programmable mock backend on an ephemeral port.
///
/// `f` maps each request to `(status, JSON body)`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(RecordedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let f = Arc::new(f);
    start_programmable_backend_with(move |request| {
        let response = f(request);
        async move { Some(response.await) }
    })
    .await
}

/// Backend that reads each of the first `hangups` requests and closes the
/// socket without answering, then replies `200` with `body`.
///
/// Returns the address and a count of requests received.
pub async fn start_hangup_backend(hangups: u32, body: &'static str) -> (SocketAddr, Arc<AtomicU32>) {
    let received = Arc::new(AtomicU32::new(0));
    let counter = received.clone();
    let addr = start_programmable_backend_with(move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        std::future::ready((n >= hangups).then(|| (200, body.to_string())))
    })
    .await;
    (addr, received)
}

/// Like [`start_programmable_backend`], but `None` drops the connection unanswered.
pub async fn start_programmable_backend_with<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(RecordedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<(u16, String)>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let (read_half, mut write_half) = socket.into_split();
                let mut reader = BufReader::new(read_half);
                let Some(request) = read_request(&mut reader).await else {
                    return;
                };
                let Some((status, body)) = f(request).await else {
                    return;
                };
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason(status),
                    body.len(),
                    body
                );
                let _ = write_half.write_all(response.as_bytes()).await;
                let _ = write_half.shutdown().await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            });
        }
    });

    addr
}

async fn read_request<R>(reader: &mut BufReader<R>) -> Option<RecordedRequest>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    reader.read_line(&mut line).await.ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut headers = HashMap::new();
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).await.ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await.ok()?;

    Some(RecordedRequest {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Parse a config whose `{backend}` placeholders point at `backend`.
pub fn config_for(backend: SocketAddr, toml: &str) -> GatewayConfig {
    parse_config(&toml.replace("{backend}", &format!("http://{}", backend))).unwrap()
}

/// Dispatcher over the real HTTP transport, bypassing any proxy settings.
pub fn dispatcher_for(config: &GatewayConfig) -> Dispatcher {
    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let registry = Registry::from_config(config).unwrap();
    Dispatcher::new(Arc::new(registry), Arc::new(HttpTransport::from_client(client)))
}
