//! Schema Context
//!
//! Ranked schema/fact snippets for a free-text question. Snippets are fed to
//! SQL generation and analysis prompts and recorded as data provenance.
//!
//! - [`StaticSchemaContext`]: fixed snippet list (fixtures, offline use)
//! - [`SqliteSchemaContext`]: introspects a read-only SQLite dataset

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::ContentCache;
use crate::storage::SharedDatabase;
use crate::types::{QuorumError, Result};

/// Sample rows rendered into a table snippet
const SAMPLE_ROWS: usize = 3;

/// One ranked piece of schema or domain context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnippet {
    /// Table name or fact identifier
    pub source: String,
    pub content: String,
    /// Relevance in [0,1]
    pub score: f32,
}

impl SchemaSnippet {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
            score: 0.0,
        }
    }
}

/// Free-text query in, up to `k` ranked snippets out
#[async_trait]
pub trait SchemaContext: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SchemaSnippet>>;

    fn name(&self) -> &str;
}

pub type SharedSchemaContext = Arc<dyn SchemaContext>;

// =============================================================================
// Ranking
// =============================================================================

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .map(|t| {
            let lower = t.to_lowercase();
            // Crude singularization so "suppliers" matches "supplier"
            match lower.strip_suffix('s') {
                Some(stem) if stem.len() >= 3 => stem.to_string(),
                _ => lower,
            }
        })
        .collect()
}

/// Fraction of query terms present in the snippet
fn relevance(query_terms: &HashSet<String>, content: &str) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let content_terms = tokens(content);
    let hits = query_terms
        .iter()
        .filter(|t| content_terms.contains(*t))
        .count();
    hits as f32 / query_terms.len() as f32
}

/// Score, order by relevance (stable for ties) and keep the top `k`
fn rank(query: &str, snippets: Vec<SchemaSnippet>, k: usize) -> Vec<SchemaSnippet> {
    let terms = tokens(query);
    let mut scored: Vec<SchemaSnippet> = snippets
        .into_iter()
        .map(|mut s| {
            s.score = relevance(&terms, &format!("{} {}", s.source, s.content));
            s
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    scored
}

// =============================================================================
// Static Context
// =============================================================================

/// Fixed snippet list ranked by term overlap
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaContext {
    snippets: Vec<SchemaSnippet>,
}

impl StaticSchemaContext {
    pub fn new(snippets: Vec<SchemaSnippet>) -> Self {
        Self { snippets }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchemaContext for StaticSchemaContext {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SchemaSnippet>> {
        Ok(rank(query, self.snippets.clone(), k))
    }

    fn name(&self) -> &str {
        "static"
    }
}

// =============================================================================
// SQLite Introspection
// =============================================================================

/// Describes every user table of a SQLite dataset
///
/// One snippet per table: column list with declared types plus a few sample
/// rows. Table descriptions are memoized when a cache is attached.
pub struct SqliteSchemaContext {
    db: SharedDatabase,
    source_id: String,
    cache: Option<ContentCache<Vec<SchemaSnippet>>>,
}

impl SqliteSchemaContext {
    pub fn new(db: SharedDatabase, source_id: impl Into<String>) -> Self {
        Self {
            db,
            source_id: source_id.into(),
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: ContentCache<Vec<SchemaSnippet>>) -> Self {
        self.cache = Some(cache);
        self
    }

    async fn describe_tables(&self) -> Result<Vec<SchemaSnippet>> {
        let key = [self.source_id.as_str(), "tables"];
        if let Some(cache) = &self.cache
            && let Some(hit) = cache.get(&key).await
        {
            return Ok(hit);
        }

        let db = Arc::clone(&self.db);
        let snippets = tokio::task::spawn_blocking(move || introspect(&db))
            .await
            .map_err(|e| QuorumError::Storage(format!("Schema task failed: {}", e)))??;

        debug!("Schema: described {} tables", snippets.len());
        if let Some(cache) = &self.cache {
            cache.put(&key, &snippets).await;
        }
        Ok(snippets)
    }
}

fn introspect(db: &SharedDatabase) -> Result<Vec<SchemaSnippet>> {
    let conn = db.connection()?;
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let tables: Vec<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<_, _>>()?;

    let mut snippets = Vec::with_capacity(tables.len());
    for table in tables {
        let quoted = table.replace('"', "\"\"");

        let mut cols = conn.prepare(&format!("PRAGMA table_info(\"{}\")", quoted))?;
        let columns: Vec<String> = cols
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let ty: String = row.get(2)?;
                Ok(if ty.is_empty() {
                    name
                } else {
                    format!("{} {}", name, ty)
                })
            })?
            .collect::<std::result::Result<_, _>>()?;

        let mut sample = conn.prepare(&format!(
            "SELECT * FROM \"{}\" LIMIT {}",
            quoted, SAMPLE_ROWS
        ))?;
        let width = sample.column_count();
        let rows: Vec<String> = sample
            .query_map([], |row| {
                let values: Vec<String> = (0..width)
                    .map(|i| match row.get_ref(i) {
                        Ok(v) => render_value(v),
                        Err(_) => "?".to_string(),
                    })
                    .collect();
                Ok(format!("({})", values.join(", ")))
            })?
            .collect::<std::result::Result<_, _>>()?;

        let mut content = format!("TABLE {} ({})", table, columns.join(", "));
        if !rows.is_empty() {
            content.push_str(&format!("\nSample: {}", rows.join(" ")));
        }
        snippets.push(SchemaSnippet::new(table, content));
    }
    Ok(snippets)
}

fn render_value(value: rusqlite::types::ValueRef<'_>) -> String {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => format!("'{}'", String::from_utf8_lossy(t)),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

#[async_trait]
impl SchemaContext for SqliteSchemaContext {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SchemaSnippet>> {
        let tables = self.describe_tables().await?;
        Ok(rank(query, tables, k))
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::storage::Database;
    use std::time::Duration;

    fn dataset() -> (tempfile::TempDir, SharedDatabase) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE suppliers (id INTEGER, name TEXT, region TEXT);
                 CREATE TABLE purchase_orders (id INTEGER, supplier_id INTEGER, spend REAL);
                 INSERT INTO suppliers VALUES (1, 'Acme', 'EU');
                 INSERT INTO purchase_orders VALUES (1, 1, 1200.5);",
            )
            .unwrap();
        }
        let db = Arc::new(Database::open_read_only(&path).unwrap());
        (dir, db)
    }

    #[test]
    fn test_tokens_singularize() {
        let t = tokens("Top Suppliers by spend");
        assert!(t.contains("supplier"));
        assert!(t.contains("spend"));
        assert!(!t.contains("by"));
    }

    #[tokio::test]
    async fn test_static_ranks_by_overlap() {
        let ctx = StaticSchemaContext::new(vec![
            SchemaSnippet::new("weather", "TABLE weather (day, rain)"),
            SchemaSnippet::new("suppliers", "TABLE suppliers (id, name, spend)"),
        ]);
        let hits = ctx.search("top suppliers by spend", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "suppliers");
        assert!(hits[0].score > 0.5);
    }

    #[tokio::test]
    async fn test_empty_context() {
        let hits = StaticSchemaContext::empty().search("anything", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_introspection() {
        let (_dir, db) = dataset();
        let ctx = SqliteSchemaContext::new(db, "data");
        let hits = ctx.search("supplier regions", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source, "suppliers");
        assert!(hits[0].content.contains("region TEXT"));
        assert!(hits[0].content.contains("'Acme'"));
    }

    #[tokio::test]
    async fn test_sqlite_descriptions_cached() {
        let (_dir, db) = dataset();
        let cache: ContentCache<Vec<SchemaSnippet>> =
            ContentCache::new(Arc::new(MemoryCache::new()), "schema", Duration::from_secs(60));
        let ctx = SqliteSchemaContext::new(db, "data").with_cache(cache.clone());

        ctx.search("spend", 5).await.unwrap();
        let cached = cache.get(&["data", "tables"]).await.unwrap();
        assert_eq!(cached.len(), 2);
    }
}
