//! Remote store port (driven/secondary port)
//!
//! This module defines the narrow interface the classification pipeline
//! needs from the remote file store. The implementation targets Google Drive
//! v3, but nothing here is Drive-specific.
//!
//! ## Design Notes
//!
//! - Unlike the other ports this one returns a classified error,
//!   [`RemoteStoreError`], because the pipeline must tell a vanished file
//!   (skip it) from an unreachable store (abort the cycle).
//! - Uses `#[async_trait]` for async trait methods.
//! - Authentication and push-channel management are the adapter's business.

use thiserror::Error;

use crate::domain::{AncestorEntry, ChangePage, Cursor, FileId};

// ============================================================================
// RemoteStoreError
// ============================================================================

/// Errors reported by a remote store adapter
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteStoreError {
    /// The requested item or folder does not exist (or is not visible)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The store could not be reached or refused the request
    /// (network, authentication, quota, malformed response)
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

impl RemoteStoreError {
    /// Returns true for [`RemoteStoreError::NotFound`]
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteStoreError::NotFound(_))
    }
}

// ============================================================================
// IRemoteStore trait
// ============================================================================

/// Port trait for the remote hierarchical file store
///
/// ## Implementation Notes
///
/// - `list_changes_since` may follow the store's own pagination internally;
///   whatever cursor it returns must be a valid argument for the next call.
/// - `find_folder_by_name` resolves ambiguous names to the first match the
///   store returns.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Returns a cursor positioned at the current head of the change feed
    ///
    /// # Errors
    /// `Unavailable` if the feed cannot be initialized
    async fn get_start_cursor(&self) -> Result<Cursor, RemoteStoreError>;

    /// Lists the changes recorded after `cursor`
    ///
    /// # Arguments
    /// * `cursor` - Position returned by a previous call or by `get_start_cursor`
    async fn list_changes_since(&self, cursor: &Cursor) -> Result<ChangePage, RemoteStoreError>;

    /// Retrieves name and parents of a single item
    ///
    /// # Errors
    /// `NotFound` if the item no longer exists
    async fn get_metadata(&self, file_id: &FileId) -> Result<AncestorEntry, RemoteStoreError>;

    /// Finds a (non-trashed) folder by its exact name
    ///
    /// # Errors
    /// `NotFound` if no folder carries that name
    async fn find_folder_by_name(&self, name: &str) -> Result<FileId, RemoteStoreError>;
}
