//! Poll command - Run one cycle for an account
//!
//! Provides the `drivewatch poll` CLI command which:
//! 1. Loads configuration and opens the state database
//! 2. Builds the Drive adapter and the account's pipeline
//! 3. Runs a single cycle, advancing the stored cursor like the daemon would
//! 4. Prints the emitted events (and records them in history when enabled)

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use drivewatch_cache::{SqliteCursorStore, SqliteEventLog};
use drivewatch_core::ports::{INotificationSink, IRemoteStore};
use drivewatch_gdrive::DriveRemoteStore;
use drivewatch_sync::{ChangePoller, CycleOutcome, CycleReport, PipelineRunner, TriggerSource};
use tracing::info;

use super::{open_database, select_account, Context};
use crate::output::{get_formatter, plural, OutputFormatter};

#[derive(Debug, Args)]
pub struct PollCommand {
    /// Account to poll (defaults to the first configured one)
    #[arg(long)]
    pub account: Option<String>,
}

impl PollCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let formatter = get_formatter(ctx.format);

        let config = ctx.load_config()?;
        let account = select_account(&config, self.account.as_deref())?;
        let account_id = account.account_id()?;
        let token = account
            .resolve_token()
            .with_context(|| format!("No access token for account '{}'", account.id))?;

        let db = open_database(&config).await?;
        let remote: Arc<dyn IRemoteStore> = Arc::new(
            DriveRemoteStore::from_config(&config.drive, token)
                .context("Failed to build Drive client")?,
        );
        let cursor_store = Arc::new(SqliteCursorStore::new(db.pool().clone(), account_id.clone()));

        let mut sinks: Vec<Arc<dyn INotificationSink>> = Vec::new();
        if config.notify.history {
            sinks.push(Arc::new(SqliteEventLog::new(
                db.pool().clone(),
                account_id.clone(),
            )));
        }

        let poller =
            ChangePoller::from_config(account_id.clone(), remote, cursor_store, &config.pipeline);
        let runner = PipelineRunner::new(poller, sinks);

        info!(account = %account_id, "Running one poll cycle");
        let outcome = runner.trigger(TriggerSource::Manual).await;
        db.close().await;

        match outcome {
            CycleOutcome::Completed(report) => {
                if ctx.format.is_json() {
                    formatter.print_json(&report_json(account_id.as_str(), &report));
                } else {
                    print_report(formatter.as_ref(), account_id.as_str(), &report);
                }
                Ok(())
            }
            CycleOutcome::Failed(e) => Err(e).context("Poll cycle failed"),
            // The runner is local to this command, nothing else can hold it
            CycleOutcome::Skipped => anyhow::bail!("Poll cycle did not run"),
        }
    }
}

fn report_json(account: &str, report: &CycleReport) -> serde_json::Value {
    let failures: Vec<_> = report
        .failures
        .iter()
        .map(|f| serde_json::json!({"fileId": f.file_id.as_str(), "error": f.error.to_string()}))
        .collect();

    serde_json::json!({
        "account": account,
        "cycle_id": report.cycle_id.to_string(),
        "bootstrapped": report.bootstrapped,
        "events": report.events,
        "changes_received": report.changes_received,
        "skipped": report.skipped,
        "unmatched": report.unmatched,
        "suppressed": report.suppressed,
        "failures": failures,
        "cursor_advanced": report.cursor_advanced,
        "duration_ms": report.duration_ms,
    })
}

fn print_report(formatter: &dyn OutputFormatter, account: &str, report: &CycleReport) {
    if report.bootstrapped {
        formatter.success(&format!("Cursor initialized for '{account}'"));
        formatter.info("Changes made from now on will be reported by the next poll.");
        return;
    }

    if report.events.is_empty() {
        formatter.success(&format!(
            "No relevant changes ({} received)",
            plural(report.changes_received, "change")
        ));
    } else {
        formatter.success(&format!(
            "{} for '{account}'",
            plural(report.events.len(), "event")
        ));
        for event in &report.events {
            formatter.event(event);
        }
    }

    formatter.info("A running drivewatchd keeps its own cursor and may report these again.");
    formatter.info(&format!(
        "Skipped: {}  Unmatched: {}  Suppressed: {}  Took: {}ms",
        report.skipped, report.unmatched, report.suppressed, report.duration_ms
    ));

    if !report.failures.is_empty() {
        formatter.warn(&format!(
            "{} could not be resolved:",
            plural(report.failures.len(), "file")
        ));
        for failure in &report.failures {
            formatter.info(&format!("  - {}: {}", failure.file_id, failure.error));
        }
    }
}
