//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! GatewayConfig.services
//!     → service.rs (merge policies, parse endpoints)
//!     → template.rs (path templates as data)
//!     → auth.rs (per-call auth header providers)
//!     → Registry (immutable, shared via Arc)
//!
//! Dispatch:
//!     resolve(service, endpoint) → (&ServiceDescriptor, &EndpointDescriptor)
//! ```
//!
//! # Design Decisions
//! - Built once from validated config; read-only afterwards
//! - Path templates are data, not closures, so the registry stays inspectable
//! - Unknown service and unknown endpoint are distinct errors

pub mod auth;
pub mod service;
pub mod template;

use std::collections::BTreeMap;

use crate::config::{ConfigError, GatewayConfig};
use crate::error::{DispatchError, DispatchResult};

pub use auth::{AuthHeader, AuthProvider};
pub use service::{EndpointDescriptor, ServiceDescriptor};
pub use template::{PathTemplate, TemplateError};

/// Static catalog of upstream services.
#[derive(Debug, Default)]
pub struct Registry {
    services: BTreeMap<String, ServiceDescriptor>,
}

impl Registry {
    /// Build from already-constructed descriptors.
    pub fn new(services: impl IntoIterator<Item = ServiceDescriptor>) -> Self {
        Self {
            services: services.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    /// Build every service in `config`, reporting all problems at once.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let mut errors = Vec::new();
        let mut services = Vec::new();

        for (name, service) in &config.services {
            match ServiceDescriptor::from_config(name, service, &config.defaults) {
                Ok(descriptor) => services.push(descriptor),
                Err(service_errors) => errors.extend(service_errors),
            }
        }

        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        tracing::info!(services = services.len(), "Service registry loaded");
        Ok(Self::new(services))
    }

    /// Resolve a logical (service, endpoint) pair.
    pub fn resolve(&self, service: &str, endpoint: &str) -> DispatchResult<(&ServiceDescriptor, &EndpointDescriptor)> {
        let descriptor = self.get(service)?;
        let endpoint_descriptor = descriptor
            .endpoint(endpoint)
            .ok_or_else(|| DispatchError::UnknownEndpoint {
                service: service.to_string(),
                endpoint: endpoint.to_string(),
            })?;
        Ok((descriptor, endpoint_descriptor))
    }

    /// Look up a service by name.
    pub fn get(&self, service: &str) -> DispatchResult<&ServiceDescriptor> {
        self.services
            .get(service)
            .ok_or_else(|| DispatchError::UnknownService(service.to_string()))
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.values()
    }

    /// Endpoints of `service`, in key order.
    pub fn endpoints(&self, service: &str) -> DispatchResult<impl Iterator<Item = &EndpointDescriptor>> {
        Ok(self.get(service)?.endpoints.values())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
