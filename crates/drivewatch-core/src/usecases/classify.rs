//! Pattern classification of ancestor chains
//!
//! The back office files accounting documents as
//! `<root>/<client>/<marker>/<year>/<month>/<file>`. Given a closest-first
//! ancestor chain, the classifier finds the marker folder and reads the
//! client, year and month from the positions around it.

use crate::domain::{AncestorEntry, Classification};

/// Default name of the marker folder
pub const DEFAULT_MARKER_FOLDER: &str = "Movimentação contábil";

/// Extracts `{client, year, month}` from an ancestor chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternClassifier {
    marker: String,
}

impl PatternClassifier {
    /// Creates a classifier for the given marker folder name
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// The marker folder name this classifier looks for
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Classifies a closest-first chain
    ///
    /// The first marker found scanning outward from the file wins. The client
    /// is the entry right after it (one level up); year and month are the
    /// entries one and two positions before it (toward the file). Missing
    /// positions are left unset.
    pub fn classify(&self, chain: &[AncestorEntry]) -> Classification {
        let Some(index) = chain.iter().position(|entry| entry.name == self.marker) else {
            return Classification::Unmatched;
        };

        let name_at = |i: Option<usize>| i.and_then(|i| chain.get(i)).map(|e| e.name.clone());

        Classification::Matched {
            client_name: name_at(index.checked_add(1)),
            year: name_at(index.checked_sub(1)),
            month: name_at(index.checked_sub(2)),
        }
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER_FOLDER)
    }
}
