//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every service builds into a usable descriptor
//! - Validate value ranges (thresholds > 0, TTLs > 0 when caching)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{GatewayConfig, ResilienceConfig};
use crate::registry::ServiceDescriptor;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("service '{service}': invalid base address: {reason}")]
    InvalidBaseAddress { service: String, reason: String },

    #[error("service '{service}': endpoint '{endpoint}' has unsupported method '{method}'")]
    InvalidMethod {
        service: String,
        endpoint: String,
        method: String,
    },

    #[error("service '{service}': endpoint '{endpoint}' has invalid path template: {reason}")]
    InvalidPathTemplate {
        service: String,
        endpoint: String,
        reason: String,
    },

    #[error("service '{service}': invalid auth settings: {reason}")]
    InvalidAuth { service: String, reason: String },

    #[error("service '{service}': declares no endpoints")]
    NoEndpoints { service: String },

    #[error("{scope}: breaker_threshold must be greater than zero")]
    ZeroBreakerThreshold { scope: String },

    #[error("service '{service}': cache enabled with ttl_ms = 0")]
    ZeroCacheTtl { service: String },

    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("admin API enabled without an api_key")]
    MissingAdminKey,
}

/// Validate the whole configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::MissingAdminKey);
        }
    }
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    errors.extend(validate_resilience("defaults", &config.defaults));

    for (name, service) in &config.services {
        if let Err(service_errors) = ServiceDescriptor::from_config(name, service, &config.defaults) {
            errors.extend(service_errors);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Range checks on a merged resilience block.
pub fn validate_resilience(scope: &str, resilience: &ResilienceConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if resilience.breaker_threshold == 0 {
        errors.push(ValidationError::ZeroBreakerThreshold { scope: scope.to_string() });
    }
    errors
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
