//! DriveWatch Cache - Local state persistence
//!
//! SQLite-based storage for:
//! - The change-feed cursor of each monitored account
//! - A history of emitted events
//!
//! ## Architecture
//!
//! This crate implements the `ICursorStore` and `INotificationSink` ports from
//! `drivewatch-core` using SQLite as the storage backend. It is a driven
//! (secondary) adapter in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteCursorStore`] - Account-scoped `ICursorStore`
//! - [`SqliteEventLog`] - Event history, usable as a notification sink
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use drivewatch_cache::{DatabasePool, SqliteCursorStore};
//! use drivewatch_core::domain::AccountId;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/drivewatch/drivewatch.db")).await?;
//! let account = AccountId::new("office".to_string())?;
//! let store = SqliteCursorStore::new(pool.pool().clone(), account);
//! // Use store as ICursorStore...
//! # Ok(())
//! # }
//! ```

pub mod cursor_store;
pub mod event_log;
pub mod pool;

pub use cursor_store::SqliteCursorStore;
pub use event_log::{EventRecord, SqliteEventLog};
pub use pool::DatabasePool;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be turned back into a domain type
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}

/// Parse a DateTime<Utc> from an RFC 3339 string
pub(crate) fn parse_datetime(s: &str) -> Result<chrono::DateTime<chrono::Utc>, CacheError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| {
            CacheError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}
