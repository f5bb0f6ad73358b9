//! Response cache for idempotent upstream reads.
//!
//! Entries carry an absolute expiry and are evicted lazily: a lookup that
//! finds an expired entry removes it and reports a miss. There is no capacity
//! bound and no background sweeper, so keys that are never read again stay
//! resident until `purge_expired` is called.

pub mod key;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::time::Instant;

use crate::config::CacheConfig;

pub use key::CacheKey;

/// Cache settings for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CachePolicy {
    pub enabled: bool,
    pub ttl: Duration,
}

impl From<&CacheConfig> for CachePolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            ttl: Duration::from_millis(config.ttl_ms),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Value,
    expires_at: Instant,
}

/// Thread-safe TTL store of successful responses.
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    inner: Arc<DashMap<CacheKey, CacheEntry>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached payload for `key`, unless absent or expired.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let now = Instant::now();
        {
            let entry = self.inner.get(key)?;
            if now < entry.expires_at {
                return Some(entry.payload.clone());
            }
        }
        // Re-check under the shard lock: a concurrent put may have refreshed it.
        self.inner.remove_if(key, |_, entry| now >= entry.expires_at);
        None
    }

    /// Insert or replace `key` with a fresh expiry of `ttl` from now.
    pub fn put(&self, key: CacheKey, payload: Value, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.inner.insert(key, CacheEntry { payload, expires_at });
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, entry| now < entry.expires_at);
        before.saturating_sub(self.inner.len())
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Entries currently held, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn key(id: &str) -> CacheKey {
        CacheKey::new("sf", "getAccount", &[id.to_string()], &BTreeMap::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_before_expiry() {
        let cache = ResponseCache::new();
        cache.put(key("1"), json!({"Id": "1"}), Duration::from_millis(5000));

        tokio::time::advance(Duration::from_millis(4999)).await;
        assert_eq!(cache.get(&key("1")), Some(json!({"Id": "1"})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_at_expiry_evicts() {
        let cache = ResponseCache::new();
        cache.put(key("1"), json!(1), Duration::from_millis(5000));

        tokio::time::advance(Duration::from_millis(5000)).await;
        assert_eq!(cache.get(&key("1")), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_refreshes_expiry() {
        let cache = ResponseCache::new();
        cache.put(key("1"), json!("old"), Duration::from_millis(100));
        tokio::time::advance(Duration::from_millis(80)).await;
        cache.put(key("1"), json!("new"), Duration::from_millis(100));
        tokio::time::advance(Duration::from_millis(80)).await;

        assert_eq!(cache.get(&key("1")), Some(json!("new")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = ResponseCache::new();
        cache.put(key("1"), json!(1), Duration::from_millis(10));
        cache.put(key("2"), json!(2), Duration::from_millis(1000));
        tokio::time::advance(Duration::from_millis(10)).await;

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.get(&key("2")), Some(json!(2)));
    }

    #[test]
    fn test_absent_key_is_miss() {
        let cache = ResponseCache::new();
        assert_eq!(cache.get(&key("missing")), None);
    }
}
