//! Cursor command - Inspect or reset stored change-feed positions

use anyhow::Result;
use clap::Subcommand;
use drivewatch_cache::SqliteCursorStore;
use drivewatch_core::ports::ICursorStore;

use super::{open_database, select_account, Context};
use crate::output::get_formatter;

#[derive(Debug, Subcommand)]
pub enum CursorCommand {
    /// Show the stored cursor of every account (or one)
    Show {
        #[arg(long)]
        account: Option<String>,
    },
    /// Forget the stored cursor; the next cycle starts from "now"
    ///
    /// Only affects processes that load the cursor afterwards. A running
    /// drivewatchd keeps its in-memory cursor and writes it back on its next
    /// cycle, so stop the daemon before resetting.
    Reset {
        #[arg(long)]
        account: Option<String>,
    },
}

impl CursorCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        match self {
            CursorCommand::Show { account } => self.execute_show(ctx, account.as_deref()).await,
            CursorCommand::Reset { account } => self.execute_reset(ctx, account.as_deref()).await,
        }
    }

    async fn execute_show(&self, ctx: &Context, account: Option<&str>) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config = ctx.load_config()?;
        let db = open_database(&config).await?;

        let accounts: Vec<_> = match account {
            Some(_) => vec![select_account(&config, account)?],
            None => config.accounts.iter().collect(),
        };

        let mut rows = Vec::new();
        for account in accounts {
            let store = SqliteCursorStore::new(db.pool().clone(), account.account_id()?);
            let stored = store.load_with_timestamp().await?;
            rows.push((account.id.clone(), stored));
        }
        db.close().await;

        if ctx.format.is_json() {
            let json: Vec<_> = rows
                .iter()
                .map(|(id, stored)| {
                    serde_json::json!({
                        "account": id,
                        "cursor": stored.as_ref().map(|(c, _)| c.as_str()),
                        "updated_at": stored.as_ref().map(|(_, at)| at.to_rfc3339()),
                    })
                })
                .collect();
            formatter.print_json(&serde_json::Value::Array(json));
            return Ok(());
        }

        if rows.is_empty() {
            formatter.warn("No accounts configured");
        }
        for (id, stored) in rows {
            match stored {
                Some((cursor, updated_at)) => formatter.success(&format!(
                    "{id}: {cursor} (saved {})",
                    updated_at.format("%Y-%m-%d %H:%M:%S UTC")
                )),
                None => formatter.info(&format!("{id}: no cursor yet (next cycle bootstraps)")),
            }
        }
        Ok(())
    }

    async fn execute_reset(&self, ctx: &Context, account: Option<&str>) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config = ctx.load_config()?;
        let account = select_account(&config, account)?;
        let db = open_database(&config).await?;

        let store = SqliteCursorStore::new(db.pool().clone(), account.account_id()?);
        store.clear().await?;
        db.close().await;

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({"success": true, "account": account.id}));
        } else {
            formatter.success(&format!("Cursor reset for '{}'", account.id));
            formatter.warn(
                "A running drivewatchd keeps its in-memory cursor; restart it to apply.",
            );
        }
        Ok(())
    }
}
