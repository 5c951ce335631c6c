//! Process-local cache backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::{Cache, CacheEntry, CacheStats, SharedClock, SystemClock};
use crate::types::Result;

/// Lock-free in-memory cache
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    clock: SharedClock,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hit count of a live entry
    pub fn hits(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|e| e.hits)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let now = self.clock.now_ms();
        // Evict before taking a write guard on the same shard
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            tracing::debug!("Cache: evicted expired entry {}", key);
            return Ok(None);
        }

        Ok(self.entries.get_mut(key).map(|mut entry| {
            entry.hits += 1;
            entry.value.clone()
        }))
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(value, self.clock.now_ms(), ttl);
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn clear(&self) -> Result<usize> {
        let count = self.entries.len();
        self.entries.clear();
        Ok(count)
    }

    async fn stats(&self) -> Result<CacheStats> {
        let now = self.clock.now_ms();
        let mut stats = CacheStats {
            backend: self.backend().to_string(),
            ..Default::default()
        };
        for entry in self.entries.iter() {
            stats.entries += 1;
            stats.total_hits += entry.hits;
            if entry.is_expired(now) {
                stats.expired += 1;
            }
        }
        Ok(stats)
    }

    fn backend(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use serde_json::json;

    fn cache_with_clock() -> (MemoryCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        (MemoryCache::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_set_is_idempotent() {
        let (cache, _) = cache_with_clock();
        let ttl = Duration::from_secs(60);
        cache.set("k", json!({"rows": 3}), ttl).await.unwrap();
        cache.set("k", json!({"rows": 3}), ttl).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k").await.unwrap(), Some(json!({"rows": 3})));
    }

    #[tokio::test]
    async fn test_ttl_expiry_with_simulated_clock() {
        let (cache, clock) = cache_with_clock();
        cache
            .set("k", json!("v"), Duration::from_secs(30 * 60))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(29 * 60));
        assert_eq!(cache.get("k").await.unwrap(), Some(json!("v")));

        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get("k").await.unwrap(), None);
        // Lazily evicted on that lookup
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_expired_entries_linger_until_lookup() {
        let (cache, clock) = cache_with_clock();
        cache.set("a", json!(1), Duration::from_secs(1)).await.unwrap();
        cache.set("b", json!(2), Duration::from_secs(100)).await.unwrap();
        clock.advance(Duration::from_secs(5));

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.expired, 1);
    }

    #[tokio::test]
    async fn test_hits_counted() {
        let (cache, _) = cache_with_clock();
        cache.set("k", json!(true), Duration::from_secs(10)).await.unwrap();
        cache.get("k").await.unwrap();
        cache.get("k").await.unwrap();
        assert_eq!(cache.hits("k"), Some(2));
        assert_eq!(cache.stats().await.unwrap().total_hits, 2);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let (cache, _) = cache_with_clock();
        cache.set("a", json!(1), Duration::from_secs(10)).await.unwrap();
        cache.set("b", json!(2), Duration::from_secs(10)).await.unwrap();
        assert!(cache.remove("a").await.unwrap());
        assert!(!cache.remove("a").await.unwrap());
        assert_eq!(cache.clear().await.unwrap(), 1);
        assert!(cache.is_empty());
    }
}
