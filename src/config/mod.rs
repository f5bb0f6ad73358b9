//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → Registry built once, shared via Arc
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the registry never changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, AuthConfig, CacheConfig, EndpointConfig, GatewayConfig, HalfOpenPolicy, ListenerConfig,
    LogFormat, ObservabilityConfig, ResilienceConfig, ResilienceOverrides, ServiceConfig, TransportConfig,
};
pub use validation::{validate_config, ValidationError};
