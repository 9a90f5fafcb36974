//! DriveWatch GDrive - Google Drive v3 API adapter
//!
//! Provides async client for:
//! - The changes feed (start page token, paged change listing)
//! - File metadata and folder lookup by name
//! - Push channel registration (`changes/watch`, `channels/stop`)
//!
//! ## Modules
//!
//! - [`client`] - Authenticated HTTP client with throttling retry
//! - [`changes`] - Change feed queries
//! - [`files`] - Metadata and folder lookups
//! - [`watch`] - Push notification channels
//! - [`provider`] - [`IRemoteStore`](drivewatch_core::ports::IRemoteStore) implementation

pub mod changes;
pub mod client;
pub mod files;
pub mod provider;
pub mod watch;

use std::time::Duration;

use drivewatch_core::ports::RemoteStoreError;
use thiserror::Error;

pub use client::DriveClient;
pub use provider::DriveRemoteStore;

/// Errors that can occur when communicating with the Google Drive API
#[derive(Debug, Error)]
pub enum DriveError {
    /// Authentication credentials are invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions, or a quota that will not clear by waiting
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded and retries exhausted
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration the server asked to wait
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx) and retries were exhausted
    #[error("Server error: {0}")]
    ServerError(String),

    /// The request was rejected as malformed (4xx other than the above)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl DriveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriveError::NotFound(_))
    }
}

impl From<DriveError> for RemoteStoreError {
    fn from(err: DriveError) -> Self {
        match err {
            DriveError::NotFound(what) => RemoteStoreError::NotFound(what),
            other => RemoteStoreError::Unavailable(other.to_string()),
        }
    }
}
