//! HTTP front door.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → request.rs (request ID as trace id, decode dispatch body)
//!     → Dispatcher::call
//!     → response.rs (payload, or error envelope with mapped status)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{DispatchBody, X_REQUEST_ID};
pub use response::{ApiError, ErrorEnvelope};
pub use server::{AppState, HttpServer};
