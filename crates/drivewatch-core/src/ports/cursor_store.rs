//! Cursor store port (driven/secondary port)
//!
//! This module defines the interface for persisting the change-feed cursor
//! of one monitored account between poll cycles and across restarts.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (SQLite, filesystem, etc.) and don't need domain-level classification.
//! - A store instance is scoped to a single account; the adapter decides how
//!   the account key is stored.
//! - The durable copy is advisory. The orchestrator keeps the authoritative
//!   cursor in memory and only reads the store when it has none
//!   (load-or-bootstrap on startup).

use crate::domain::Cursor;

/// Port trait for cursor persistence
#[async_trait::async_trait]
pub trait ICursorStore: Send + Sync {
    /// Loads the persisted cursor
    ///
    /// Returns `None` on first run, or after [`clear`](Self::clear).
    async fn load(&self) -> anyhow::Result<Option<Cursor>>;

    /// Persists `cursor`, replacing any previous value
    async fn save(&self, cursor: &Cursor) -> anyhow::Result<()>;

    /// Forgets the persisted cursor so the next start bootstraps a fresh one
    ///
    /// This is the only way a cursor is ever rolled back (explicit resync).
    async fn clear(&self) -> anyhow::Result<()>;
}
