//! Classification results and the emitted event
//!
//! [`Classification`] is what the pattern classifier derives from an ancestor
//! chain. [`ClassifiedEvent`] is the enriched notification that leaves the
//! pipeline; its wire names (`clienteName`, `ano`, `mes`) are the ones the
//! back-office front end consumes.

use serde::{Deserialize, Serialize};

use super::newtypes::FileId;

/// Placeholder for a year or month the ancestor chain was too short to contain
pub const UNKNOWN_SEGMENT: &str = "N/C";

/// Outcome of matching an ancestor chain against the client folder pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The chain has no marker folder
    Unmatched,
    /// The chain has a marker folder; surrounding positions may be missing
    Matched {
        /// Folder directly above the marker
        client_name: Option<String>,
        /// Folder directly below the marker
        year: Option<String>,
        /// Folder two levels below the marker
        month: Option<String>,
    },
}

impl Classification {
    /// Returns true if the chain contained the marker folder
    pub fn is_match(&self) -> bool {
        matches!(self, Classification::Matched { .. })
    }

    /// Builds the output event for `file_id`
    ///
    /// Returns `None` when unmatched or when the client position is missing,
    /// since an alert without a client is useless to the back office.
    pub fn into_event(self, file_id: FileId) -> Option<ClassifiedEvent> {
        match self {
            Classification::Matched {
                client_name: Some(client_name),
                year,
                month,
            } => Some(ClassifiedEvent {
                file_id,
                client_name,
                year: year.unwrap_or_else(|| UNKNOWN_SEGMENT.to_string()),
                month: month.unwrap_or_else(|| UNKNOWN_SEGMENT.to_string()),
            }),
            _ => None,
        }
    }
}

/// A deduplicated, enriched notification for one changed file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    /// The changed file
    #[serde(rename = "fileId")]
    pub file_id: FileId,
    /// Client folder name
    #[serde(rename = "clienteName")]
    pub client_name: String,
    /// Year folder name, or [`UNKNOWN_SEGMENT`]
    #[serde(rename = "ano")]
    pub year: String,
    /// Month folder name, or [`UNKNOWN_SEGMENT`]
    #[serde(rename = "mes")]
    pub month: String,
}

impl ClassifiedEvent {
    /// Human-readable one-line summary, e.g. `ClienteX (Data: 2024-03/2024)`
    pub fn summary(&self) -> String {
        format!("{} (Data: {}/{})", self.client_name, self.month, self.year)
    }
}
