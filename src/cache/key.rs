//! Canonical cache keys.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

/// Deterministic key for a cacheable request.
///
/// Encoded as the JSON array `[service, endpoint, args, query|null]` with query
/// parameters in sorted key order, so logically identical requests always
/// produce the same key and JSON string escaping keeps distinct inputs apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(service: &str, endpoint: &str, args: &[String], query: &BTreeMap<String, String>) -> Self {
        let args = args.iter().cloned().map(Value::String).collect();
        let query = if query.is_empty() {
            Value::Null
        } else {
            let sorted: Map<String, Value> = query
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            Value::Object(sorted)
        };

        let encoded = Value::Array(vec![
            Value::String(service.to_string()),
            Value::String(endpoint.to_string()),
            Value::Array(args),
            query,
        ]);
        Self(encoded.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
