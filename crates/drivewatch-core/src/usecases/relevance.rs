//! Optional relevance filter applied before classification
//!
//! By default every non-removed change with metadata is a candidate.
//! [`RelevancePolicy::CreatedWithin`] narrows that to items created recently,
//! which keeps edits to old documents from raising alerts.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::FileMeta;

/// Which candidate changes are worth classifying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelevancePolicy {
    /// Every candidate is relevant
    #[default]
    Any,
    /// Only items whose creation time is within the window before `now`
    CreatedWithin(Duration),
}

impl RelevancePolicy {
    /// Returns true if `meta` passes the policy at `now`
    ///
    /// Under `CreatedWithin`, items without a creation time never pass. A
    /// window reaching past the earliest representable time admits every
    /// timestamped item.
    pub fn is_relevant(&self, meta: &FileMeta, now: DateTime<Utc>) -> bool {
        match self {
            RelevancePolicy::Any => true,
            RelevancePolicy::CreatedWithin(window) => {
                let Some(created_at) = meta.created_at else {
                    return false;
                };
                let Ok(window) = chrono::Duration::from_std(*window) else {
                    return true;
                };
                match now.checked_sub_signed(window) {
                    Some(cutoff) => created_at >= cutoff,
                    None => true,
                }
            }
        }
    }
}
