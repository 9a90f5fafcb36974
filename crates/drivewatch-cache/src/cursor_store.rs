//! SQLite implementation of ICursorStore
//!
//! One row per account in `sync_cursors`. The store instance is bound to a
//! single account, so several pipelines can share one database file.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use drivewatch_core::domain::{AccountId, Cursor};
use drivewatch_core::ports::ICursorStore;

use crate::{parse_datetime, CacheError};

/// Account-scoped cursor persistence
#[derive(Clone)]
pub struct SqliteCursorStore {
    pool: SqlitePool,
    account_id: AccountId,
}

impl SqliteCursorStore {
    /// Creates a store for `account_id` on the given pool
    pub fn new(pool: SqlitePool, account_id: AccountId) -> Self {
        Self { pool, account_id }
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    /// Loads the cursor together with the time it was last saved
    pub async fn load_with_timestamp(
        &self,
    ) -> Result<Option<(Cursor, DateTime<Utc>)>, CacheError> {
        let row = sqlx::query("SELECT cursor, updated_at FROM sync_cursors WHERE account_id = ?")
            .bind(self.account_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row.get("cursor");
        let updated_at: String = row.get("updated_at");
        let cursor = Cursor::new(raw).map_err(|e| CacheError::SerializationError(e.to_string()))?;
        Ok(Some((cursor, parse_datetime(&updated_at)?)))
    }
}

#[async_trait::async_trait]
impl ICursorStore for SqliteCursorStore {
    async fn load(&self) -> anyhow::Result<Option<Cursor>> {
        Ok(self.load_with_timestamp().await?.map(|(cursor, _)| cursor))
    }

    async fn save(&self, cursor: &Cursor) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO sync_cursors (account_id, cursor, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(account_id) DO UPDATE SET cursor = excluded.cursor, \
             updated_at = excluded.updated_at",
        )
        .bind(self.account_id.as_str())
        .bind(cursor.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(CacheError::from)?;

        tracing::trace!(account = %self.account_id, cursor = %cursor, "Saved cursor");
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM sync_cursors WHERE account_id = ?")
            .bind(self.account_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(CacheError::from)?;

        tracing::debug!(account = %self.account_id, "Cleared cursor");
        Ok(())
    }
}
