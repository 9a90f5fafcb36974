//! DriveWatch Sync - Change classification pipeline
//!
//! Provides:
//! - The per-account poll cycle (cursor, ancestor resolution, classification, dedup)
//! - An overlap guard shared by every trigger of an account
//! - Interval and push-notification triggers
//! - Notification sinks
//!
//! ## Modules
//!
//! - [`engine`] - [`ChangePoller`](engine::ChangePoller), one cycle at a time
//! - [`runner`] - [`PipelineRunner`](runner::PipelineRunner), drops overlapping triggers and dispatches events
//! - [`scheduler`] - Interval trigger
//! - [`webhook`] - Inbound push notification receiver
//! - [`events`] - Server-Sent Events stream fed by the broadcast sink
//! - [`sinks`] - Log, broadcast and HTTP forward sinks

pub mod engine;
pub mod events;
pub mod runner;
pub mod scheduler;
pub mod sinks;
pub mod webhook;

pub use engine::{ChangePoller, CycleReport, FileFailure};
pub use runner::{CycleOutcome, PipelineRunner, TriggerSource};
pub use scheduler::PollScheduler;
pub use sinks::{BroadcastSink, DriveChangeMessage, ForwardSink, LogSink};
pub use webhook::WebhookServer;

use drivewatch_core::domain::FileId;
use thiserror::Error;

/// Errors produced by a poll cycle
///
/// [`ProviderUnavailable`](PipelineError::ProviderUnavailable),
/// [`RootNotResolved`](PipelineError::RootNotResolved) and a failed cursor
/// load abort the cycle. The others only ever appear in
/// [`CycleReport::failures`] for a single file.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The remote store could not be reached or refused the request
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// An individual file vanished while it was being resolved
    #[error("File not found: {0}")]
    NotFound(FileId),

    /// The parent links of a file loop back onto themselves
    #[error("Broken folder hierarchy at {0}")]
    BrokenHierarchy(FileId),

    /// The Clients root folder does not exist
    #[error("Root folder not resolved: {0}")]
    RootNotResolved(String),

    /// The cursor store failed
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),
}

