//! Domain entities
//!
//! This module contains the core domain types for DriveWatch:
//! - Newtypes for type-safe identifiers (`FileId`, `Cursor`, `AccountId`, `CycleId`)
//! - Change feed entries and pages
//! - Ancestor chain entries
//! - Classification results and the emitted event
//! - Domain-specific error types

pub mod ancestry;
pub mod change;
pub mod classification;
pub mod errors;
pub mod newtypes;

// Re-export commonly used types
pub use ancestry::AncestorEntry;
pub use change::{ChangeEvent, ChangePage, FileMeta};
pub use classification::{Classification, ClassifiedEvent, UNKNOWN_SEGMENT};
pub use errors::DomainError;
pub use newtypes::*;
