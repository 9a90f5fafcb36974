//! Ancestor chain resolution
//!
//! Walks the primary-parent chain of an item up to the client root folder,
//! fetching each item's metadata through [`IRemoteStore`] at most once per
//! resolver. A resolver is meant to live for exactly one poll cycle: several
//! changed files usually share their ancestors, but folder moves between
//! cycles make any longer-lived cache stale.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::{
    domain::{AncestorEntry, FileId},
    ports::{IRemoteStore, RemoteStoreError},
};

/// Errors from resolving a single item's chain
///
/// All of them are local to the item being resolved; whether a
/// [`RemoteStoreError::Unavailable`] should abort the whole cycle is the
/// caller's decision.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A metadata lookup failed
    #[error(transparent)]
    Remote(#[from] RemoteStoreError),

    /// The parent links loop back onto an item already in the chain
    #[error("Parent cycle detected at {0}")]
    CycleDetected(FileId),
}

/// Per-cycle memoizing resolver for ancestor chains
pub struct AncestorResolver<'a> {
    remote: &'a dyn IRemoteStore,
    cache: HashMap<FileId, AncestorEntry>,
    fetches: usize,
}

impl<'a> AncestorResolver<'a> {
    /// Creates a resolver with an empty cache
    pub fn new(remote: &'a dyn IRemoteStore) -> Self {
        Self {
            remote,
            cache: HashMap::new(),
            fetches: 0,
        }
    }

    /// Resolves the chain from `file_id` up to `root`, closest-first
    ///
    /// The first entry is `file_id` itself. The walk stops when an item has
    /// no parent, or when its primary parent is `root`, in which case `root`
    /// is appended as the last entry without being fetched.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::Remote`] if any lookup along the chain fails
    /// - [`ResolveError::CycleDetected`] if the parent links loop
    pub async fn resolve_chain_to_root(
        &mut self,
        file_id: &FileId,
        root: &AncestorEntry,
    ) -> Result<Vec<AncestorEntry>, ResolveError> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = file_id.clone();

        loop {
            if !visited.insert(current.clone()) {
                return Err(ResolveError::CycleDetected(current));
            }

            let entry = self.lookup(&current).await?;
            let parent = entry.primary_parent().cloned();
            chain.push(entry);

            match parent {
                None => break,
                Some(parent) if parent == root.id => {
                    chain.push(root.clone());
                    break;
                }
                Some(parent) => current = parent,
            }
        }

        Ok(chain)
    }

    /// Number of remote metadata lookups performed so far
    pub fn fetch_count(&self) -> usize {
        self.fetches
    }

    async fn lookup(&mut self, id: &FileId) -> Result<AncestorEntry, RemoteStoreError> {
        if let Some(entry) = self.cache.get(id) {
            return Ok(entry.clone());
        }

        let entry = self.remote.get_metadata(id).await?;
        self.fetches += 1;
        self.cache.insert(id.clone(), entry.clone());
        Ok(entry)
    }
}
