//! Service and endpoint descriptors.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use reqwest::Method;
use url::Url;

use crate::cache::CachePolicy;
use crate::config::validation::validate_resilience;
use crate::config::{EndpointConfig, ResilienceConfig, ServiceConfig, ValidationError};
use crate::registry::auth::{provider_from_config, AuthProvider};
use crate::registry::template::{PathTemplate, TemplateError};
use crate::resilience::ResiliencePolicy;

const SUPPORTED_METHODS: [Method; 7] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// An endpoint: HTTP method plus path template.
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    pub key: String,
    pub method: Method,
    pub path: PathTemplate,
}

impl EndpointDescriptor {
    pub fn new(key: impl Into<String>, method: Method, path: PathTemplate) -> Self {
        Self {
            key: key.into(),
            method,
            path,
        }
    }

    /// Read-only methods are the only cache candidates.
    pub fn is_read(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    /// Concrete path for positional `args`.
    pub fn render(&self, args: &[String]) -> Result<String, TemplateError> {
        self.path.render(args)
    }
}

/// An upstream service with merged policies. Immutable after load.
#[derive(Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    pub base_address: Url,
    pub auth: Arc<dyn AuthProvider>,
    pub resilience: ResiliencePolicy,
    pub cache: CachePolicy,
    pub endpoints: BTreeMap<String, EndpointDescriptor>,
}

impl ServiceDescriptor {
    /// Build a descriptor, merging resilience overrides over `defaults`.
    ///
    /// Every problem with the service is reported, not just the first.
    pub fn from_config(
        name: &str,
        config: &ServiceConfig,
        defaults: &ResilienceConfig,
    ) -> Result<Self, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let base_address = match Url::parse(&config.base_address) {
            Ok(url) if url.cannot_be_a_base() => {
                errors.push(ValidationError::InvalidBaseAddress {
                    service: name.to_string(),
                    reason: "URL cannot be a base".to_string(),
                });
                None
            }
            Ok(url) => Some(url),
            Err(e) => {
                errors.push(ValidationError::InvalidBaseAddress {
                    service: name.to_string(),
                    reason: e.to_string(),
                });
                None
            }
        };

        let auth = provider_from_config(&config.auth)
            .map_err(|reason| {
                errors.push(ValidationError::InvalidAuth {
                    service: name.to_string(),
                    reason,
                })
            })
            .ok();

        let merged = config.resilience.merge(defaults);
        errors.extend(validate_resilience(&format!("service '{}'", name), &merged));

        if config.cache.enabled && config.cache.ttl_ms == 0 {
            errors.push(ValidationError::ZeroCacheTtl { service: name.to_string() });
        }

        if config.endpoints.is_empty() {
            errors.push(ValidationError::NoEndpoints { service: name.to_string() });
        }

        let mut endpoints = BTreeMap::new();
        for (key, endpoint) in &config.endpoints {
            match build_endpoint(name, key, endpoint) {
                Ok(descriptor) => {
                    endpoints.insert(key.clone(), descriptor);
                }
                Err(endpoint_errors) => errors.extend(endpoint_errors),
            }
        }

        match (base_address, auth) {
            (Some(base_address), Some(auth)) if errors.is_empty() => Ok(Self {
                name: name.to_string(),
                base_address,
                auth,
                resilience: ResiliencePolicy::from(&merged),
                cache: CachePolicy::from(&config.cache),
                endpoints,
            }),
            _ => Err(errors),
        }
    }

    pub fn endpoint(&self, key: &str) -> Option<&EndpointDescriptor> {
        self.endpoints.get(key)
    }

    /// Join a rendered endpoint path onto the base address.
    pub fn url_for(&self, path: &str) -> Result<Url, url::ParseError> {
        let base = self.base_address.as_str().trim_end_matches('/');
        Url::parse(&format!("{}{}", base, path))
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .field("base_address", &self.base_address.as_str())
            .field("resilience", &self.resilience)
            .field("cache", &self.cache)
            .field("endpoints", &self.endpoints.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn build_endpoint(
    service: &str,
    key: &str,
    config: &EndpointConfig,
) -> Result<EndpointDescriptor, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let method = Method::from_bytes(config.method.to_ascii_uppercase().as_bytes())
        .ok()
        .filter(|m| SUPPORTED_METHODS.contains(m));
    if method.is_none() {
        errors.push(ValidationError::InvalidMethod {
            service: service.to_string(),
            endpoint: key.to_string(),
            method: config.method.clone(),
        });
    }

    let path = PathTemplate::parse(&config.path)
        .map_err(|e| {
            errors.push(ValidationError::InvalidPathTemplate {
                service: service.to_string(),
                endpoint: key.to_string(),
                reason: e.to_string(),
            })
        })
        .ok();

    match (method, path) {
        (Some(method), Some(path)) => Ok(EndpointDescriptor::new(key, method, path)),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;

    fn salesforce() -> ServiceDescriptor {
        let config: GatewayConfig = toml::from_str(
            r#"
            [services.salesforce]
            base_address = "https://example.my.salesforce.com/services/data/v58.0/"
            resilience = { retries = 3, backoff_ms = 300 }
            cache = { enabled = true, ttl_ms = 5000 }

            [services.salesforce.endpoints]
            getAccount = { method = "GET", path = "/sobjects/Account/{id}" }
            createAccount = { method = "post", path = "/sobjects/Account" }
            "#,
        )
        .unwrap();
        ServiceDescriptor::from_config("salesforce", &config.services["salesforce"], &config.defaults).unwrap()
    }

    #[test]
    fn test_policies_merged() {
        let sf = salesforce();
        assert_eq!(sf.resilience.max_attempts(), 4);
        assert_eq!(sf.resilience.base_backoff.as_millis(), 300);
        assert_eq!(sf.resilience.breaker_threshold, 5);
        assert_eq!(sf.resilience.breaker_reset.as_millis(), 15_000);
        assert!(sf.cache.enabled);
        assert_eq!(sf.cache.ttl.as_millis(), 5_000);
    }

    #[test]
    fn test_endpoints() {
        let sf = salesforce();
        let get = sf.endpoint("getAccount").unwrap();
        assert!(get.is_read());
        let create = sf.endpoint("createAccount").unwrap();
        assert_eq!(create.method, Method::POST);
        assert!(!create.is_read());
    }

    #[test]
    fn test_url_for_keeps_base_path() {
        let sf = salesforce();
        let path = sf.endpoint("getAccount").unwrap().render(&["42".to_string()]).unwrap();
        assert_eq!(
            sf.url_for(&path).unwrap().as_str(),
            "https://example.my.salesforce.com/services/data/v58.0/sobjects/Account/42"
        );
    }
}
