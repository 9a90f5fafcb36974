//! Notification sink port (driven/secondary port)
//!
//! This module defines the interface through which classified events leave
//! the pipeline. Implementations may log them, fan them out to in-process
//! subscribers, forward them to a webhook, or record them in a history table.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because delivery is adapter-specific.
//! - Emission is fire-and-forget. The caller logs a failed `emit` and moves
//!   on; it never retries and never re-opens the dedup window, since the
//!   dedup entry was committed before delivery.
//! - `name` identifies the sink in log records.

use crate::domain::ClassifiedEvent;

/// Port trait for delivering classified events to subscribers
#[async_trait::async_trait]
pub trait INotificationSink: Send + Sync {
    /// Short identifier for log records (e.g. "log", "broadcast")
    fn name(&self) -> &str;

    /// Delivers one event
    ///
    /// # Errors
    /// Any delivery failure (no subscriber, HTTP error, ...). The caller treats
    /// it as non-fatal.
    async fn emit(&self, event: &ClassifiedEvent) -> anyhow::Result<()>;
}
