//! Persistent cache backend on the pooled SQLite database.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{OptionalExtension, params};
use serde_json::Value;

use super::{Cache, CacheStats, SharedClock, SystemClock};
use crate::storage::SharedDatabase;
use crate::types::{QuorumError, Result};

/// Cache entries persisted in the `cache_entries` table
///
/// Entries outlive the process, so a later run answering an unrelated
/// request can reuse validation and execution results.
#[derive(Clone)]
pub struct SqliteCache {
    db: SharedDatabase,
    clock: SharedClock,
}

impl SqliteCache {
    /// `db` must already be initialized
    pub fn new(db: SharedDatabase) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    pub fn with_clock(db: SharedDatabase, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(SharedDatabase, i64) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let now = self.clock.now_ms();
        tokio::task::spawn_blocking(move || f(db, now))
            .await
            .map_err(|e| QuorumError::Cache(format!("Cache task failed: {}", e)))?
    }
}

#[async_trait]
impl Cache for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let key = key.to_string();
        self.blocking(move |db, now| {
            let conn = db.connection()?;
            let row: Option<(String, i64)> = conn
                .query_row(
                    "SELECT value, expires_at FROM cache_entries WHERE key = ?1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((raw, expires_at)) = row else {
                return Ok(None);
            };

            if now >= expires_at {
                conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
                tracing::debug!("Cache: evicted expired entry {}", key);
                return Ok(None);
            }

            conn.execute(
                "UPDATE cache_entries SET hits = hits + 1 WHERE key = ?1",
                params![key],
            )?;
            Ok(Some(serde_json::from_str(&raw)?))
        })
        .await
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let key = key.to_string();
        let raw = serde_json::to_string(&value)?;
        self.blocking(move |db, now| {
            let expires_at = now.saturating_add(ttl.as_millis() as i64);
            db.execute(
                "INSERT INTO cache_entries (key, value, created_at, expires_at, hits)
                 VALUES (?1, ?2, ?3, ?4, 0)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    created_at = excluded.created_at,
                    expires_at = excluded.expires_at",
                &[&key, &raw, &now, &expires_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.blocking(move |db, _| {
            Ok(db.execute("DELETE FROM cache_entries WHERE key = ?1", &[&key])? > 0)
        })
        .await
    }

    async fn clear(&self) -> Result<usize> {
        self.blocking(|db, _| db.execute("DELETE FROM cache_entries", &[]))
            .await
    }

    async fn stats(&self) -> Result<CacheStats> {
        self.blocking(|db, now| {
            let conn = db.connection()?;
            let (entries, expired, hits): (i64, i64, i64) = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN expires_at <= ?1 THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(hits), 0)
                 FROM cache_entries",
                params![now],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;
            Ok(CacheStats {
                backend: "sqlite".to_string(),
                entries: entries as usize,
                expired: expired as usize,
                total_hits: hits as u64,
            })
        })
        .await
    }

    fn backend(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::storage::Database;
    use serde_json::json;

    fn cache(path: &std::path::Path, clock: Arc<ManualClock>) -> SqliteCache {
        let db = Database::open(path).unwrap();
        db.initialize().unwrap();
        SqliteCache::with_clock(Arc::new(db), clock)
    }

    #[tokio::test]
    async fn test_roundtrip_and_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir.path().join("c.db"), Arc::new(ManualClock::new(0)));
        let ttl = Duration::from_secs(60);

        cache.set("k", json!({"a": 1}), ttl).await.unwrap();
        cache.set("k", json!({"a": 2}), ttl).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(json!({"a": 2})));

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_hits, 1);
    }

    #[tokio::test]
    async fn test_expiry_evicts_on_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache(&dir.path().join("c.db"), clock.clone());

        cache.set("k", json!(1), Duration::from_secs(10)).await.unwrap();
        clock.advance(Duration::from_secs(11));
        assert_eq!(cache.stats().await.unwrap().expired, 1);
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert_eq!(cache.stats().await.unwrap().entries, 0);
    }

    #[tokio::test]
    async fn test_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.db");
        let clock = Arc::new(ManualClock::new(0));
        {
            let first = cache(&path, clock.clone());
            first.set("k", json!("kept"), Duration::from_secs(60)).await.unwrap();
        }
        let second = cache(&path, clock);
        assert_eq!(second.get("k").await.unwrap(), Some(json!("kept")));
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir.path().join("c.db"), Arc::new(ManualClock::new(0)));
        cache.set("a", json!(1), Duration::from_secs(10)).await.unwrap();
        cache.set("b", json!(2), Duration::from_secs(10)).await.unwrap();
        assert!(cache.remove("a").await.unwrap());
        assert_eq!(cache.clear().await.unwrap(), 1);
    }
}
