//! History command - Browse and prune emitted events

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Args;
use drivewatch_cache::{EventRecord, SqliteEventLog};

use super::{open_database, select_account, Context};
use crate::output::{get_formatter, plural};

#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Only events of this account
    #[arg(long)]
    pub account: Option<String>,

    /// Only events of this client folder
    #[arg(long)]
    pub client: Option<String>,

    /// Maximum number of events to show
    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// Delete events older than this many days before listing
    #[arg(long, value_name = "DAYS")]
    pub prune: Option<u32>,
}

impl HistoryCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config = ctx.load_config()?;
        let db = open_database(&config).await?;

        let account = match &self.account {
            Some(_) => Some(select_account(&config, self.account.as_deref())?.account_id()?),
            None => None,
        };

        if let Some(days) = self.prune {
            let cutoff = Utc::now() - Duration::days(i64::from(days));
            let mut removed = 0;
            for configured in &config.accounts {
                if account.as_ref().is_some_and(|a| a.as_str() != configured.id) {
                    continue;
                }
                let log = SqliteEventLog::new(db.pool().clone(), configured.account_id()?);
                removed += log.prune_before(cutoff).await?;
            }
            formatter.success(&format!("Pruned {}", plural(removed as usize, "event")));
        }

        let records = SqliteEventLog::query_recent(
            db.pool(),
            account.as_ref(),
            self.client.as_deref(),
            self.limit,
        )
        .await?;
        db.close().await;

        if ctx.format.is_json() {
            let json: Vec<_> = records.iter().map(record_json).collect();
            formatter.print_json(&serde_json::Value::Array(json));
            return Ok(());
        }

        if records.is_empty() {
            formatter.info("No events recorded");
            return Ok(());
        }

        formatter.success(&format!("Last {}", plural(records.len(), "event")));
        for record in &records {
            formatter.info(&format!(
                "{}  {:<10}  {}  [{}]",
                record.emitted_at.format("%Y-%m-%d %H:%M:%S"),
                record.account_id,
                record.event.summary(),
                record.event.file_id
            ));
        }
        Ok(())
    }
}

fn record_json(record: &EventRecord) -> serde_json::Value {
    serde_json::json!({
        "account": record.account_id,
        "emitted_at": record.emitted_at.to_rfc3339(),
        "event": record.event,
    })
}
