//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! mostly validation failures when constructing newtypes.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid remote file or folder identifier
    #[error("Invalid file ID: {0}")]
    InvalidFileId(String),

    /// Invalid change-feed cursor
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Invalid monitored account identifier
    #[error("Invalid account ID: {0}")]
    InvalidAccountId(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
