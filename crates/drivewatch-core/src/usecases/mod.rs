//! Use cases for DriveWatch
//!
//! The pure building blocks of one poll cycle. The cycle itself (cursor
//! handling, error policy, logging) is orchestrated in `drivewatch-sync`.
//!
//! ## Use Cases
//!
//! - [`AncestorResolver`] - Memoized walk of an item's parent chain
//! - [`PatternClassifier`] - Client/year/month extraction from a chain
//! - [`DedupCache`] - Time-windowed suppression of repeat events
//! - [`RelevancePolicy`] - Optional creation-time filter

pub mod classify;
pub mod dedup;
pub mod relevance;
pub mod resolve_ancestors;

pub use classify::{PatternClassifier, DEFAULT_MARKER_FOLDER};
pub use dedup::{DedupCache, DEFAULT_DEDUP_TTL};
pub use relevance::RelevancePolicy;
pub use resolve_ancestors::{AncestorResolver, ResolveError};
