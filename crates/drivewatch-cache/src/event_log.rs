//! Emitted-event history
//!
//! [`SqliteEventLog`] records every event it receives. It implements
//! [`INotificationSink`] so the pipeline can feed it like any other sink, and
//! offers queries for the `history` command.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use drivewatch_core::domain::{AccountId, ClassifiedEvent, FileId};
use drivewatch_core::ports::INotificationSink;

use crate::{parse_datetime, CacheError};

/// One stored event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub account_id: String,
    pub event: ClassifiedEvent,
    pub emitted_at: DateTime<Utc>,
}

/// Fixed-width RFC 3339 so stored timestamps sort lexically
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn record_from_row(row: &SqliteRow) -> Result<EventRecord, CacheError> {
    let file_id: String = row.get("file_id");
    let emitted_at: String = row.get("emitted_at");

    Ok(EventRecord {
        account_id: row.get("account_id"),
        event: ClassifiedEvent {
            file_id: FileId::new(file_id)
                .map_err(|e| CacheError::SerializationError(e.to_string()))?,
            client_name: row.get("client_name"),
            year: row.get("year"),
            month: row.get("month"),
        },
        emitted_at: parse_datetime(&emitted_at)?,
    })
}

/// Account-scoped writer and reader of the `emitted_events` table
#[derive(Clone)]
pub struct SqliteEventLog {
    pool: SqlitePool,
    account_id: AccountId,
}

impl SqliteEventLog {
    pub fn new(pool: SqlitePool, account_id: AccountId) -> Self {
        Self { pool, account_id }
    }

    /// Stores `event` as emitted at `emitted_at`
    pub async fn record(
        &self,
        event: &ClassifiedEvent,
        emitted_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        sqlx::query(
            "INSERT INTO emitted_events \
             (account_id, file_id, client_name, year, month, emitted_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(self.account_id.as_str())
        .bind(event.file_id.as_str())
        .bind(&event.client_name)
        .bind(&event.year)
        .bind(&event.month)
        .bind(timestamp(emitted_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent events of this account, newest first
    pub async fn recent(&self, limit: u32) -> Result<Vec<EventRecord>, CacheError> {
        Self::query_recent(&self.pool, Some(&self.account_id), None, limit).await
    }

    /// Most recent events across accounts, newest first
    ///
    /// # Arguments
    /// * `account` - Restrict to one account
    /// * `client` - Restrict to one client folder name
    pub async fn query_recent(
        pool: &SqlitePool,
        account: Option<&AccountId>,
        client: Option<&str>,
        limit: u32,
    ) -> Result<Vec<EventRecord>, CacheError> {
        let rows = sqlx::query(
            "SELECT * FROM emitted_events \
             WHERE (?1 IS NULL OR account_id = ?1) AND (?2 IS NULL OR client_name = ?2) \
             ORDER BY emitted_at DESC, id DESC LIMIT ?3",
        )
        .bind(account.map(|a| a.as_str()))
        .bind(client)
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Deletes events emitted before `cutoff`; returns the number removed
    pub async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, CacheError> {
        let result =
            sqlx::query("DELETE FROM emitted_events WHERE account_id = ? AND emitted_at < ?")
                .bind(self.account_id.as_str())
                .bind(timestamp(cutoff))
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl INotificationSink for SqliteEventLog {
    fn name(&self) -> &str {
        "history"
    }

    async fn emit(&self, event: &ClassifiedEvent) -> anyhow::Result<()> {
        self.record(event, Utc::now()).await?;
        Ok(())
    }
}
