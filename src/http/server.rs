//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the front-door handlers
//! - Wire up middleware (request ID, tracing, timeout)
//! - Bind server to listener and stop on the shutdown signal
//! - Hand `/dispatch` bodies to the dispatcher and translate its errors

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::dispatcher::Dispatcher;
use crate::http::request::{request_id, DispatchBody};
use crate::http::response::{ApiError, ErrorEnvelope};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub config: Arc<GatewayConfig>,
}

/// Front-door HTTP server.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: Arc<GatewayConfig>, dispatcher: Dispatcher) -> Self {
        let timeout = Duration::from_secs(config.listener.request_timeout_secs);
        let state = AppState { dispatcher, config };
        Self {
            router: Self::build_router(state, timeout),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, timeout: Duration) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/dispatch", post(dispatch))
            .with_state(state)
            .layer(TimeoutLayer::new(timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The configured router, for serving or for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn dispatch(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<DispatchBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let trace_id = request_id(&headers);

    let Json(body) = body.map_err(|rejection| {
        tracing::debug!(request_id = %trace_id, error = %rejection, "Malformed dispatch body");
        ApiError(rejection.status(), ErrorEnvelope::bad_request(rejection.body_text()))
    })?;

    let call = body
        .into_call(trace_id.clone())
        .map_err(|reason| ApiError(axum::http::StatusCode::BAD_REQUEST, ErrorEnvelope::bad_request(reason)))?;

    tracing::debug!(
        request_id = %trace_id,
        service = %call.service,
        endpoint = %call.endpoint,
        "Dispatching call"
    );

    match state.dispatcher.call(call).await {
        Ok(payload) => Ok(Json(payload)),
        Err(err) => {
            tracing::warn!(request_id = %trace_id, code = err.code(), error = %err, "Dispatch failed");
            Err(err.into())
        }
    }
}
