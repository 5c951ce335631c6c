//! Database Layer with Connection Pooling
//!
//! SQLite access featuring:
//! - Connection pooling via r2d2 for concurrent access
//! - Read-write pools (persistent cache, WAL) and read-only pools (analytical
//!   datasets, `query_only` enforced per connection)
//! - Panic-safe transactions with automatic rollback
//! - Version-tracked schema

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};

use crate::types::{QuorumError, Result, ResultExt};

/// Shared database handle for async contexts.
pub type SharedDatabase = Arc<Database>;

const SCHEMA: &str = include_str!("schema.sql");

/// Current schema version for migration tracking
const SCHEMA_VERSION: u32 = 1;

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl PoolConfig {
    const MIN_POOL_SIZE: u32 = 2;
    const MAX_POOL_SIZE: u32 = 16;

    /// Two connections per core, clamped
    pub fn auto() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);
        Self {
            max_size: (cores * 2).clamp(Self::MIN_POOL_SIZE, Self::MAX_POOL_SIZE),
            connection_timeout_secs: 30,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::auto()
    }
}

/// Thread-safe database with connection pooling.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
    read_only: bool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("read_only", &self.read_only)
            .field("connections", &self.pool.state().connections)
            .finish()
    }
}

impl Database {
    /// Open a read-write database, creating the file if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_read_write);
        Self::build(manager, PoolConfig::default(), false)
    }

    /// Open an existing database for reading only.
    ///
    /// Every pooled connection is opened with `SQLITE_OPEN_READ_ONLY` and
    /// `PRAGMA query_only`, so no statement can modify the file.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(QuorumError::Storage(format!(
                "Dataset not found: {}",
                path.display()
            )));
        }

        let manager = SqliteConnectionManager::file(path)
            .with_flags(OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX)
            .with_init(|conn| {
                conn.execute_batch("PRAGMA query_only = ON; PRAGMA busy_timeout = 5000;")
            });
        Self::build(manager, PoolConfig::default(), true)
    }

    /// Open an in-memory database for testing or temporary use.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();
        Self::build(
            manager,
            PoolConfig {
                max_size: 1,
                connection_timeout_secs: 5,
            },
            false,
        )
    }

    fn build(manager: SqliteConnectionManager, config: PoolConfig, read_only: bool) -> Result<Self> {
        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .build(manager)
            .map_err(|e| QuorumError::Storage(format!("Failed to create connection pool: {}", e)))?;

        Ok(Self { pool, read_only })
    }

    fn configure_read_write(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            "#,
        )
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Get a connection from the pool.
    pub fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            QuorumError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    /// Initialize the cache schema.
    pub fn initialize(&self) -> Result<()> {
        if self.read_only {
            return Err(QuorumError::Storage(
                "Cannot initialize a read-only database".to_string(),
            ));
        }

        let conn = self.connection()?;
        let current_version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        conn.execute_batch(SCHEMA)
            .with_context("Failed to initialize database schema")?;

        if current_version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .with_context("Failed to set schema version")?;
            tracing::debug!("Storage: schema at version {}", SCHEMA_VERSION);
        }
        Ok(())
    }

    /// Execute a single SQL statement.
    pub fn execute(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<usize> {
        let conn = self.connection()?;
        conn.execute(sql, params)
            .with_context("Failed to execute SQL")
    }

    /// Execute a closure within a transaction.
    ///
    /// If the closure panics the transaction is rolled back and an error is
    /// returned instead of poisoning the pool.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.connection()?;
        let tx = conn
            .transaction()
            .with_context("Failed to start transaction")?;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&tx)));

        match result {
            Ok(Ok(value)) => {
                tx.commit().with_context("Failed to commit transaction")?;
                Ok(value)
            }
            Ok(Err(e)) => Err(e),
            Err(panic_payload) => {
                let panic_msg = panic_payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Unknown panic".to_string());

                tracing::error!("Storage: transaction panicked: {}", panic_msg);
                Err(QuorumError::Storage(format!(
                    "Transaction panicked: {}",
                    panic_msg
                )))
            }
        }
    }
}
