//! Cache & Memoization
//!
//! Generated text, SQL validation results, SQL execution results and schema
//! lookups are all memoized through one abstraction:
//!
//! - [`Cache`]: untyped key/value store with per-entry TTL
//! - [`ContentCache`]: typed view keyed by `namespace:sha256(parts)`
//!
//! Entries expire lazily: an expired entry is removed when a lookup finds it,
//! and nothing sweeps in the background. Writes are idempotent, so an
//! abandoned request can leave a cache write behind harmlessly.
//!
//! ## Backends
//!
//! - `memory`: process-local `DashMap`
//! - `sqlite`: `cache_entries` table, shared across process runs

mod clock;
mod memory;
mod sqlite;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{CacheBackend, CacheConfig};
use crate::storage::Database;
use crate::types::{Result, content_hash};

// =============================================================================
// Entries
// =============================================================================

/// Stored payload with expiry bookkeeping (milliseconds since epoch)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    pub created_at: i64,
    pub expires_at: i64,
    pub hits: u64,
}

impl CacheEntry {
    pub fn new(value: Value, now_ms: i64, ttl: Duration) -> Self {
        Self {
            value,
            created_at: now_ms,
            expires_at: now_ms.saturating_add(ttl.as_millis() as i64),
            hits: 0,
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }
}

/// Snapshot of a backend's contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub backend: String,
    pub entries: usize,
    /// Entries past expiry that no lookup has evicted yet
    pub expired: usize,
    pub total_hits: u64,
}

// =============================================================================
// Cache Trait
// =============================================================================

/// Key/value store with per-entry TTL
#[async_trait]
pub trait Cache: Send + Sync {
    /// Live value for `key`; an expired entry is evicted and reported as absent
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Insert or overwrite
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<bool>;

    /// Remove every entry, returning how many were removed
    async fn clear(&self) -> Result<usize>;

    async fn stats(&self) -> Result<CacheStats>;

    /// Backend name for logging
    fn backend(&self) -> &str;
}

pub type SharedCache = Arc<dyn Cache>;

/// Create the configured cache backend
pub fn create_cache(config: &CacheConfig) -> Result<SharedCache> {
    match config.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryCache::new())),
        CacheBackend::Sqlite => {
            let path = config.resolved_path();
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            Ok(Arc::new(open_sqlite_cache(&path)?))
        }
    }
}

fn open_sqlite_cache(path: &Path) -> Result<SqliteCache> {
    let db = Database::open(path)?;
    db.initialize()?;
    debug!("Cache: sqlite backend at {}", path.display());
    Ok(SqliteCache::new(Arc::new(db)))
}

// =============================================================================
// Typed Content Cache
// =============================================================================

/// Typed, namespaced view over a [`Cache`]
///
/// Keys are `namespace:sha256(parts...)`. Backend failures are logged and
/// treated as a miss (reads) or a no-op (writes); a broken cache never fails
/// the request using it.
pub struct ContentCache<T> {
    cache: SharedCache,
    namespace: String,
    ttl: Duration,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ContentCache<T> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            namespace: self.namespace.clone(),
            ttl: self.ttl,
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> ContentCache<T> {
    pub fn new(cache: SharedCache, namespace: impl Into<String>, ttl: Duration) -> Self {
        Self {
            cache,
            namespace: namespace.into(),
            ttl,
            _marker: PhantomData,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Content-hash key for the given parts
    pub fn key(&self, parts: &[&str]) -> String {
        format!("{}:{}", self.namespace, content_hash(parts))
    }

    pub async fn get(&self, parts: &[&str]) -> Option<T> {
        let key = self.key(parts);
        match self.cache.get(&key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(typed) => {
                    debug!("Cache: hit {}", key);
                    Some(typed)
                }
                Err(e) => {
                    warn!("Cache: undecodable entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Cache: {} lookup failed, treating as miss: {}", self.namespace, e);
                None
            }
        }
    }

    pub async fn put(&self, parts: &[&str], value: &T) {
        self.put_with_ttl(parts, value, self.ttl).await;
    }

    pub async fn put_with_ttl(&self, parts: &[&str], value: &T, ttl: Duration) {
        let key = self.key(parts);
        let encoded = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!("Cache: cannot encode entry for {}: {}", self.namespace, e);
                return;
            }
        };
        if let Err(e) = self.cache.set(&key, encoded, ttl).await {
            warn!("Cache: {} write failed: {}", self.namespace, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuorumError;

    struct BrokenCache;

    #[async_trait]
    impl Cache for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<Value>> {
            Err(QuorumError::Cache("offline".into()))
        }
        async fn set(&self, _key: &str, _value: Value, _ttl: Duration) -> Result<()> {
            Err(QuorumError::Cache("offline".into()))
        }
        async fn remove(&self, _key: &str) -> Result<bool> {
            Ok(false)
        }
        async fn clear(&self) -> Result<usize> {
            Ok(0)
        }
        async fn stats(&self) -> Result<CacheStats> {
            Ok(CacheStats::default())
        }
        fn backend(&self) -> &str {
            "broken"
        }
    }

    #[test]
    fn test_entry_expiry() {
        let entry = CacheEntry::new(Value::Null, 1_000, Duration::from_secs(1));
        assert!(!entry.is_expired(1_999));
        assert!(entry.is_expired(2_000));
    }

    #[tokio::test]
    async fn test_content_cache_roundtrip_and_namespacing() {
        let backend: SharedCache = Arc::new(MemoryCache::new());
        let a: ContentCache<Vec<u32>> =
            ContentCache::new(backend.clone(), "a", Duration::from_secs(60));
        let b: ContentCache<Vec<u32>> = ContentCache::new(backend, "b", Duration::from_secs(60));

        a.put(&["SELECT 1"], &vec![1, 2, 3]).await;
        assert_eq!(a.get(&["SELECT 1"]).await, Some(vec![1, 2, 3]));
        assert_eq!(b.get(&["SELECT 1"]).await, None);
        assert_ne!(a.key(&["SELECT 1"]), b.key(&["SELECT 1"]));
    }

    #[tokio::test]
    async fn test_content_cache_errors_mean_no_cache() {
        let cache: ContentCache<String> =
            ContentCache::new(Arc::new(BrokenCache), "text", Duration::from_secs(60));
        cache.put(&["k"], &"v".to_string()).await;
        assert_eq!(cache.get(&["k"]).await, None);
    }

    #[tokio::test]
    async fn test_content_cache_shape_mismatch_is_miss() {
        let backend: SharedCache = Arc::new(MemoryCache::new());
        let writer: ContentCache<String> =
            ContentCache::new(backend.clone(), "ns", Duration::from_secs(60));
        let reader: ContentCache<u64> = ContentCache::new(backend, "ns", Duration::from_secs(60));
        writer.put(&["k"], &"text".to_string()).await;
        assert_eq!(reader.get(&["k"]).await, None);
    }

    #[test]
    fn test_create_cache_sqlite_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            backend: CacheBackend::Sqlite,
            path: Some(dir.path().join("nested/cache.db")),
            ..Default::default()
        };
        let cache = create_cache(&config).unwrap();
        assert_eq!(cache.backend(), "sqlite");
        assert!(dir.path().join("nested/cache.db").exists());
    }
}
