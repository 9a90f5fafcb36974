//! Push notification channels for the changes feed
//!
//! Drive delivers a bodiless `POST` to the channel address whenever the feed
//! moves; the `X-Goog-Resource-State` header says why (`sync` for the
//! handshake right after registration, `change` afterwards). Channels expire
//! and must be renewed by registering again.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use drivewatch_core::domain::Cursor;

use crate::client::DriveClient;
use crate::DriveError;

/// Request body of `changes.watch`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchRequest {
    /// Channel id chosen by the caller
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// HTTPS URL Drive will POST to
    pub address: String,
    /// Opaque value echoed back in `X-Goog-Channel-Token`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Requested expiration, epoch milliseconds as a string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
}

impl WatchRequest {
    /// A web_hook channel with a fresh id expiring `ttl` from now
    pub fn web_hook(address: impl Into<String>, token: Option<String>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
        let expires_at = Utc::now() + ttl;
        Self {
            id: Uuid::new_v4().to_string(),
            kind: "web_hook".to_string(),
            address: address.into(),
            token,
            expiration: Some(expires_at.timestamp_millis().to_string()),
        }
    }
}

/// A registered channel as returned by Drive
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchChannel {
    pub id: String,
    /// Drive's id of the watched resource; needed to stop the channel
    pub resource_id: String,
    #[serde(default)]
    pub expiration: Option<String>,
}

impl WatchChannel {
    /// Expiration as a timestamp, when Drive reported one
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let millis = self.expiration.as_deref()?.parse::<i64>().ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StopRequest<'a> {
    id: &'a str,
    resource_id: &'a str,
}

/// Registers a push channel on the changes feed starting at `cursor`
pub async fn watch_changes(
    client: &DriveClient,
    cursor: &Cursor,
    watch: &WatchRequest,
) -> Result<WatchChannel, DriveError> {
    debug!(channel = %watch.id, address = %watch.address, "Registering changes channel");

    let request = client
        .request(Method::POST, "/changes/watch")
        .query(&[
            ("pageToken", cursor.as_str()),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ])
        .json(watch);

    let channel: WatchChannel = client.get_json(request).await?;
    info!(
        channel = %channel.id,
        resource = %channel.resource_id,
        expires_at = ?channel.expires_at(),
        "Changes channel registered"
    );
    Ok(channel)
}

/// Stops a previously registered channel (`POST /channels/stop`)
pub async fn stop_channel(client: &DriveClient, channel: &WatchChannel) -> Result<(), DriveError> {
    let request = client
        .request(Method::POST, "/channels/stop")
        .json(&StopRequest {
            id: &channel.id,
            resource_id: &channel.resource_id,
        });

    client.execute_with_retry(request).await?;
    debug!(channel = %channel.id, "Changes channel stopped");
    Ok(())
}
