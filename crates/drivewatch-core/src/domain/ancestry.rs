//! Ancestor chain entries

use serde::{Deserialize, Serialize};

use super::newtypes::FileId;

/// One item in an ancestor chain: a file or folder with its parents
///
/// This is also what the remote store returns for a metadata lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorEntry {
    /// Item ID
    pub id: FileId,
    /// Item name
    pub name: String,
    /// Parent IDs as listed by the store (first = primary parent)
    pub parent_ids: Vec<FileId>,
}

impl AncestorEntry {
    /// Creates a new entry
    pub fn new(id: FileId, name: impl Into<String>, parent_ids: Vec<FileId>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_ids,
        }
    }

    /// The primary parent, if any
    ///
    /// Items with several parents are treated as single-parented through the
    /// first listed one.
    pub fn primary_parent(&self) -> Option<&FileId> {
        self.parent_ids.first()
    }
}
