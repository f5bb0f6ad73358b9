//! Per-call authentication header providers.

use std::fmt::Debug;
use std::sync::Arc;

use crate::config::AuthConfig;

/// A header to attach to an upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeader {
    pub name: String,
    pub value: String,
}

/// Produces the authentication header for each upstream call.
pub trait AuthProvider: Send + Sync + Debug {
    /// Header for the next call, or `None` to send the call unauthenticated.
    fn header(&self) -> Option<AuthHeader>;
}

/// Where a credential comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Secret {
    Literal(String),
    /// Environment variable, read on every call so rotated tokens take effect.
    Env(String),
}

impl Secret {
    fn resolve(&self) -> Option<String> {
        match self {
            Secret::Literal(value) => Some(value.clone()),
            Secret::Env(var) => match std::env::var(var) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::debug!(env = %var, "Credential variable not set, sending call without it");
                    None
                }
            },
        }
    }
}

/// Sends no authentication.
#[derive(Debug, Default)]
pub struct NoAuth;

impl AuthProvider for NoAuth {
    fn header(&self) -> Option<AuthHeader> {
        None
    }
}

/// `Authorization: Bearer <token>`.
#[derive(Debug)]
pub struct BearerToken(pub Secret);

impl AuthProvider for BearerToken {
    fn header(&self) -> Option<AuthHeader> {
        self.0.resolve().map(|token| AuthHeader {
            name: "authorization".to_string(),
            value: format!("Bearer {}", token),
        })
    }
}

/// A fixed header name with a secret value, e.g. `x-api-key`.
#[derive(Debug)]
pub struct StaticHeader {
    pub name: String,
    pub value: Secret,
}

impl AuthProvider for StaticHeader {
    fn header(&self) -> Option<AuthHeader> {
        self.value.resolve().map(|value| AuthHeader {
            name: self.name.to_ascii_lowercase(),
            value,
        })
    }
}

/// Build a provider from config, or explain why the settings are unusable.
pub fn provider_from_config(config: &AuthConfig) -> Result<Arc<dyn AuthProvider>, String> {
    match config {
        AuthConfig::None => Ok(Arc::new(NoAuth)),
        AuthConfig::Bearer { token, token_env } => {
            secret_from(token, token_env, "token").map(|s| Arc::new(BearerToken(s)) as Arc<dyn AuthProvider>)
        }
        AuthConfig::Header { name, value, value_env } => {
            if name.trim().is_empty() {
                return Err("header name is empty".to_string());
            }
            let value = secret_from(value, value_env, "value")?;
            Ok(Arc::new(StaticHeader {
                name: name.clone(),
                value,
            }))
        }
    }
}

fn secret_from(literal: &Option<String>, env: &Option<String>, field: &str) -> Result<Secret, String> {
    match (literal, env) {
        (Some(value), None) => Ok(Secret::Literal(value.clone())),
        (None, Some(var)) => Ok(Secret::Env(var.clone())),
        (Some(_), Some(_)) => Err(format!("set either {field} or {field}_env, not both")),
        (None, None) => Err(format!("one of {field} or {field}_env is required")),
    }
}
