//! Trigger entry point of one account's pipeline
//!
//! Both the interval scheduler and the webhook receiver call
//! [`PipelineRunner::trigger`]. A trigger that arrives while a cycle is in
//! flight is dropped, not queued: the running cycle will observe the same
//! changes anyway.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use drivewatch_core::domain::AccountId;
use drivewatch_core::ports::INotificationSink;

use crate::engine::{ChangePoller, CycleReport};
use crate::PipelineError;

/// What caused a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Timer,
    Push,
    Manual,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerSource::Timer => "timer",
            TriggerSource::Push => "push",
            TriggerSource::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// Result of a trigger
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle of the same account was in flight
    Skipped,
    Failed(PipelineError),
}

/// Serializes cycles of one account and fans events out to the sinks
pub struct PipelineRunner {
    account_id: AccountId,
    poller: Mutex<ChangePoller>,
    sinks: Vec<Arc<dyn INotificationSink>>,
}

impl PipelineRunner {
    pub fn new(poller: ChangePoller, sinks: Vec<Arc<dyn INotificationSink>>) -> Self {
        Self {
            account_id: poller.account_id().clone(),
            poller: Mutex::new(poller),
            sinks,
        }
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    /// Runs a cycle unless one is already in flight
    ///
    /// Events of a completed cycle are handed to every sink after the cycle
    /// lock is released. Sink failures are logged and otherwise ignored.
    pub async fn trigger(&self, source: TriggerSource) -> CycleOutcome {
        let Ok(mut poller) = self.poller.try_lock() else {
            debug!(account = %self.account_id, source = %source, "Cycle in flight, trigger dropped");
            return CycleOutcome::Skipped;
        };

        debug!(account = %self.account_id, source = %source, "Starting cycle");
        let result = poller.run_cycle().await;
        drop(poller);

        match result {
            Ok(report) => {
                self.dispatch(&report).await;
                CycleOutcome::Completed(report)
            }
            Err(e) => {
                error!(account = %self.account_id, source = %source, error = %e, "Cycle failed");
                CycleOutcome::Failed(e)
            }
        }
    }

    /// Clears the cursor so the next cycle bootstraps; waits for a running cycle
    pub async fn resync(&self) -> Result<(), PipelineError> {
        self.poller.lock().await.resync().await
    }

    async fn dispatch(&self, report: &CycleReport) {
        for event in &report.events {
            for sink in &self.sinks {
                if let Err(e) = sink.emit(event).await {
                    warn!(
                        account = %self.account_id,
                        sink = sink.name(),
                        file_id = %event.file_id,
                        error = %format!("{e:#}"),
                        "Sink failed to emit event"
                    );
                }
            }
        }
    }
}
