//! Resilient backend-for-frontend dispatcher library.

pub mod admin;
pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod resilience;
pub mod transport;

pub use config::schema::GatewayConfig;
pub use dispatcher::{CallOptions, CallRequest, Dispatcher, ServiceHandle};
pub use error::{DispatchError, DispatchResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use registry::Registry;
