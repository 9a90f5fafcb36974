//! Change feed types
//!
//! A [`ChangePage`] is what one call to the remote store's change feed
//! returns: the changed items plus the cursor to continue from.
//! These values are transient; nothing here is persisted except the cursor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{Cursor, FileId};

/// Metadata attached to a change entry when the item still exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Item name (file or folder name)
    pub name: String,
    /// Parent folder IDs in the order the store lists them; the first one is
    /// the primary parent
    pub parent_ids: Vec<FileId>,
    /// Creation timestamp, when the store reports it
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification timestamp, when the store reports it
    pub modified_at: Option<DateTime<Utc>>,
}

impl FileMeta {
    /// Creates metadata with a name and parents and no timestamps
    pub fn new(name: impl Into<String>, parent_ids: Vec<FileId>) -> Self {
        Self {
            name: name.into(),
            parent_ids,
            created_at: None,
            modified_at: None,
        }
    }

    /// Sets the creation timestamp
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets the modification timestamp
    pub fn with_modified_at(mut self, modified_at: DateTime<Utc>) -> Self {
        self.modified_at = Some(modified_at);
        self
    }
}

/// A single entry from the change feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The changed item
    pub file_id: FileId,
    /// Whether the item was removed (deleted or access revoked)
    pub removed: bool,
    /// Item metadata; absent for removed items and some shared-drive changes
    pub file: Option<FileMeta>,
}

impl ChangeEvent {
    /// A change for an item that still exists
    pub fn updated(file_id: FileId, file: FileMeta) -> Self {
        Self {
            file_id,
            removed: false,
            file: Some(file),
        }
    }

    /// A change reporting that the item was removed
    pub fn removed(file_id: FileId) -> Self {
        Self {
            file_id,
            removed: true,
            file: None,
        }
    }

    /// Returns the metadata if this change is a classification candidate
    ///
    /// Removed entries and entries without metadata are never candidates.
    pub fn candidate_meta(&self) -> Option<&FileMeta> {
        if self.removed {
            return None;
        }
        self.file.as_ref()
    }
}

/// One response from the change feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangePage {
    /// Changed items, in feed order
    pub events: Vec<ChangeEvent>,
    /// Cursor to resume from on the next cycle (None if the store supplied none)
    pub next_cursor: Option<Cursor>,
}

impl ChangePage {
    /// Creates a page from its events and continuation cursor
    pub fn new(events: Vec<ChangeEvent>, next_cursor: Option<Cursor>) -> Self {
        Self {
            events,
            next_cursor,
        }
    }
}
