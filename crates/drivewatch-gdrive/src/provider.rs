//! DriveRemoteStore - IRemoteStore implementation for Google Drive
//!
//! Wraps the [`DriveClient`] and delegates to the changes and files
//! modules to fulfil the [`IRemoteStore`] port contract.
//!
//! ## Design Notes
//!
//! - Uses `tokio::sync::RwLock` because `IRemoteStore` methods take `&self`
//!   while replacing the access token needs `&mut DriveClient`.
//! - [`DriveError`] is folded into [`RemoteStoreError`]: only `NotFound`
//!   survives as such, everything else is `Unavailable`.

use std::time::Duration;

use drivewatch_core::config::DriveConfig;
use drivewatch_core::domain::{AncestorEntry, ChangePage, Cursor, FileId};
use drivewatch_core::ports::{IRemoteStore, RemoteStoreError};
use tokio::sync::RwLock;
use tracing::debug;

use crate::changes;
use crate::client::{DriveClient, DEFAULT_BACKOFF};
use crate::files;
use crate::watch::{self, WatchChannel, WatchRequest};
use crate::DriveError;

/// Default number of change pages read per cycle
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Remote store implementation backed by the Google Drive v3 API
pub struct DriveRemoteStore {
    client: RwLock<DriveClient>,
    max_pages: u32,
}

impl DriveRemoteStore {
    /// Creates a new `DriveRemoteStore` wrapping the given [`DriveClient`]
    pub fn new(client: DriveClient) -> Self {
        Self {
            client: RwLock::new(client),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Builds a store from the `drive` configuration section
    pub fn from_config(
        config: &DriveConfig,
        access_token: impl Into<String>,
    ) -> Result<Self, DriveError> {
        let client = DriveClient::with_base_url(access_token, config.api_base_url.clone())
            .with_timeout(Duration::from_secs(config.request_timeout_secs))?
            .with_retry_policy(config.max_retries, DEFAULT_BACKOFF);
        Ok(Self::new(client).with_max_pages(config.max_pages_per_cycle))
    }

    /// Sets how many change pages one `list_changes_since` call may read
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Replaces the access token used for subsequent calls
    pub async fn set_access_token(&self, token: impl Into<String>) {
        self.client.write().await.set_access_token(token);
    }

    /// Registers a push channel on the feed at `cursor`
    pub async fn watch(
        &self,
        cursor: &Cursor,
        request: &WatchRequest,
    ) -> Result<WatchChannel, DriveError> {
        let client = self.client.read().await;
        watch::watch_changes(&client, cursor, request).await
    }

    /// Stops a channel registered with [`watch`](Self::watch)
    pub async fn stop_watch(&self, channel: &WatchChannel) -> Result<(), DriveError> {
        let client = self.client.read().await;
        watch::stop_channel(&client, channel).await
    }
}

#[async_trait::async_trait]
impl IRemoteStore for DriveRemoteStore {
    async fn get_start_cursor(&self) -> Result<Cursor, RemoteStoreError> {
        let client = self.client.read().await;
        debug!("DriveRemoteStore::get_start_cursor");
        Ok(changes::get_start_page_token(&client).await?)
    }

    async fn list_changes_since(&self, cursor: &Cursor) -> Result<ChangePage, RemoteStoreError> {
        let client = self.client.read().await;
        debug!(cursor = %cursor, "DriveRemoteStore::list_changes_since");
        Ok(changes::list_changes(&client, cursor, self.max_pages).await?)
    }

    async fn get_metadata(&self, file_id: &FileId) -> Result<AncestorEntry, RemoteStoreError> {
        let client = self.client.read().await;
        Ok(files::get_file_metadata(&client, file_id).await?)
    }

    async fn find_folder_by_name(&self, name: &str) -> Result<FileId, RemoteStoreError> {
        let client = self.client.read().await;
        debug!(name, "DriveRemoteStore::find_folder_by_name");
        Ok(files::find_folder_by_name(&client, name).await?)
    }
}
