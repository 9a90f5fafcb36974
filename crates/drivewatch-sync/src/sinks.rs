//! Notification sinks
//!
//! - [`LogSink`]: one `info` line per event
//! - [`BroadcastSink`]: in-process fan-out of [`DriveChangeMessage`] to any
//!   number of subscribers (e.g. a WebSocket bridge)
//! - [`ForwardSink`]: HTTP `POST` of the event JSON to a fixed URL
//!
//! The SQLite history sink lives in `drivewatch-cache`.

use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use drivewatch_core::domain::{AccountId, ClassifiedEvent};
use drivewatch_core::ports::INotificationSink;

// ============================================================================
// LogSink
// ============================================================================

/// Logs each event as `"<cliente> (Data: <mes>/<ano>)"`
pub struct LogSink {
    account_id: AccountId,
}

impl LogSink {
    pub fn new(account_id: AccountId) -> Self {
        Self { account_id }
    }
}

#[async_trait::async_trait]
impl INotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn emit(&self, event: &ClassifiedEvent) -> anyhow::Result<()> {
        info!(
            account = %self.account_id,
            file_id = %event.file_id,
            "{}",
            event.summary()
        );
        Ok(())
    }
}

// ============================================================================
// BroadcastSink
// ============================================================================

/// Message pushed to front-end subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveChangeMessage {
    /// Always `"driveChange"`
    pub event: String,
    pub cliente: String,
    pub ano: String,
    pub mes: String,
    /// Human-readable summary
    pub mensagem: String,
    /// Local time, `dd/mm/yyyy, hh:mm:ss`
    pub timestamp: String,
}

impl DriveChangeMessage {
    pub const EVENT_NAME: &'static str = "driveChange";

    pub fn from_event(event: &ClassifiedEvent) -> Self {
        Self {
            event: Self::EVENT_NAME.to_string(),
            cliente: event.client_name.clone(),
            ano: event.year.clone(),
            mes: event.month.clone(),
            mensagem: event.summary(),
            timestamp: Local::now().format("%d/%m/%Y, %H:%M:%S").to_string(),
        }
    }
}

/// Fans events out over a tokio broadcast channel
///
/// Emitting with no subscriber is not an error. Slow subscribers lose the
/// oldest messages once `capacity` is exceeded.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<DriveChangeMessage>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DriveChangeMessage> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait::async_trait]
impl INotificationSink for BroadcastSink {
    fn name(&self) -> &str {
        "broadcast"
    }

    async fn emit(&self, event: &ClassifiedEvent) -> anyhow::Result<()> {
        match self.tx.send(DriveChangeMessage::from_event(event)) {
            Ok(receivers) => debug!(receivers, file_id = %event.file_id, "Broadcast event"),
            Err(_) => debug!(file_id = %event.file_id, "No broadcast subscribers"),
        }
        Ok(())
    }
}

// ============================================================================
// ForwardSink
// ============================================================================

/// POSTs each event as JSON (`fileId`, `clienteName`, `ano`, `mes`)
pub struct ForwardSink {
    client: reqwest::Client,
    url: String,
}

impl ForwardSink {
    /// Default request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_timeout(url, Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build forward HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl INotificationSink for ForwardSink {
    fn name(&self) -> &str {
        "forward"
    }

    async fn emit(&self, event: &ClassifiedEvent) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("POST {} rejected", self.url))?;
        debug!(url = %self.url, file_id = %event.file_id, "Forwarded event");
        Ok(())
    }
}
