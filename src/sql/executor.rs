//! Query execution against the analytical store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use serde_json::{Map, Value};
use tokio::sync::oneshot;

use super::types::QueryRows;
use crate::storage::SharedDatabase;
use crate::types::{QuorumError, Result};

/// SQL in, rows out
///
/// Implementations receive statements that already passed the safety pass.
/// `timeout` is the hard budget for the call; the tool chain enforces it
/// independently as well.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str, timeout: Duration) -> Result<QueryRows>;

    /// Identifies the data source in results and cache keys
    fn source_id(&self) -> &str;
}

pub type SharedExecutor = Arc<dyn QueryExecutor>;

/// Executor over a read-only pooled SQLite database
///
/// Statements run on the blocking pool. When the timeout elapses the
/// connection is interrupted so the worker thread is released.
pub struct SqliteExecutor {
    db: SharedDatabase,
    source_id: String,
}

impl SqliteExecutor {
    pub fn new(db: SharedDatabase, source_id: impl Into<String>) -> Self {
        Self {
            db,
            source_id: source_id.into(),
        }
    }
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
    }
}

fn run_query(conn: &rusqlite::Connection, sql: &str) -> Result<QueryRows> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let rows = stmt
        .query_map([], |row| {
            let mut obj = Map::with_capacity(columns.len());
            for (i, name) in columns.iter().enumerate() {
                obj.insert(name.clone(), json_value(row.get_ref(i)?));
            }
            Ok(Value::Object(obj))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(QueryRows::new(rows))
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    async fn execute(&self, sql: &str, timeout: Duration) -> Result<QueryRows> {
        let db = Arc::clone(&self.db);
        let statement = sql.to_string();
        let (handle_tx, mut handle_rx) = oneshot::channel();

        let task = tokio::task::spawn_blocking(move || {
            let conn = db.connection()?;
            let _ = handle_tx.send(conn.get_interrupt_handle());
            run_query(&conn, &statement)
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => joined
                .map_err(|e| QuorumError::execution(&self.source_id, format!("task failed: {}", e)))?
                .map_err(|e| match e {
                    QuorumError::Database(db_err) => {
                        QuorumError::execution(&self.source_id, db_err.to_string())
                    }
                    other => other,
                }),
            Err(_) => {
                if let Ok(handle) = handle_rx.try_recv() {
                    handle.interrupt();
                }
                Err(QuorumError::timeout("sql execution", timeout))
            }
        }
    }

    fn source_id(&self) -> &str {
        &self.source_id
    }
}
