//! Interval trigger
//!
//! [`PollScheduler`] fires [`PipelineRunner::trigger`] on a fixed period
//! until its cancellation token is triggered. Ticks missed while a slow
//! cycle runs are skipped rather than fired in a burst.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::runner::{PipelineRunner, TriggerSource};

/// Periodic poll trigger for one account
pub struct PollScheduler {
    runner: Arc<PipelineRunner>,
    interval: Duration,
}

impl PollScheduler {
    /// Creates a scheduler; a zero interval is raised to one second
    pub fn new(runner: Arc<PipelineRunner>, interval: Duration) -> Self {
        Self {
            runner,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs until `shutdown` is cancelled. The first cycle starts immediately.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            account = %self.runner.account_id(),
            interval_secs = self.interval.as_secs(),
            "Poll scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.runner.trigger(TriggerSource::Timer).await;
                }
                _ = shutdown.cancelled() => {
                    info!(account = %self.runner.account_id(), "Poll scheduler stopping");
                    break;
                }
            }
        }
    }
}
