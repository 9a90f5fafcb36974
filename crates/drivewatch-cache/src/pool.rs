//! SQLite state file shared by `drivewatchd` and the `drivewatch` CLI
//!
//! Both binaries open the same file: the daemon keeps a pool for its whole
//! lifetime while CLI commands open one briefly to read or rewrite cursors
//! and history. WAL mode lets the CLI read while the daemon writes, and the
//! busy timeout covers the short window where both want the write lock.
//!
//! The schema is versioned through `PRAGMA user_version`. A file stamped by a
//! newer DriveWatch is refused instead of being written with an older layout.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{debug, info};

use crate::CacheError;

/// Schema version written to `user_version` after migrating
pub const SCHEMA_VERSION: i64 = 1;

/// Tables every opened database must contain
const REQUIRED_TABLES: &[&str] = &["sync_cursors", "emitted_events"];

const INITIAL_SCHEMA: &str = include_str!("migrations/20261016_initial.sql");

/// How long a writer waits for the other process to release the lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// One writer per account at a time is all the pipeline ever needs
const MAX_CONNECTIONS: u32 = 4;

/// Connection pool over the DriveWatch state file
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the state file at `db_path`
    ///
    /// Missing parent directories are created. The schema is migrated to
    /// [`SCHEMA_VERSION`] and checked before the pool is returned.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("{}: {e}", db_path.display()))
            })?;

        let db = Self { pool };
        db.prepare_schema().await?;

        info!(path = %db_path.display(), "State database ready");
        Ok(db)
    }

    /// Private in-memory database with the full schema
    ///
    /// Limited to a single connection since every SQLite memory connection
    /// is its own database.
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("in-memory database: {e}")))?;

        let db = Self { pool };
        db.prepare_schema().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes all connections, waiting for in-flight queries
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Version stamped in the open file
    pub async fn schema_version(&self) -> Result<i64, CacheError> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;
        Ok(version)
    }

    async fn prepare_schema(&self) -> Result<(), CacheError> {
        let found = self.schema_version().await?;
        if found > SCHEMA_VERSION {
            return Err(CacheError::MigrationFailed(format!(
                "database schema v{found} is newer than supported v{SCHEMA_VERSION}"
            )));
        }

        // Idempotent DDL; a concurrent open by the other binary is harmless
        sqlx::raw_sql(INITIAL_SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::MigrationFailed(format!("initial schema: {e}")))?;

        if found < SCHEMA_VERSION {
            sqlx::raw_sql(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
                .execute(&self.pool)
                .await?;
            debug!(from = found, to = SCHEMA_VERSION, "Schema migrated");
        }

        verify_tables(&self.pool).await
    }
}

/// Fails with the first of [`REQUIRED_TABLES`] absent from `pool`
async fn verify_tables(pool: &SqlitePool) -> Result<(), CacheError> {
    let present: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(pool)
            .await?;

    match REQUIRED_TABLES
        .iter()
        .find(|table| !present.iter().any(|p| p == *table))
    {
        Some(missing) => Err(CacheError::MigrationFailed(format!(
            "table '{missing}' is missing"
        ))),
        None => Ok(()),
    }
}
