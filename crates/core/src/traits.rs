//! Core traits for store and indexer abstraction
//!
//! The engine depends only on these capability sets, never on a specific
//! relational engine or search backend.

use crate::entity::EntityType;
use crate::error::StoreResult;
use crate::types::{Record, TenantScope};

/// Relational store the engine exports from and restores into
///
/// Thread safety: all methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync).
pub trait Store: Send + Sync {
    /// Read every row of `entity` visible in `scope`
    ///
    /// Tenant scopes return only that tenant's rows; global-only entity
    /// types return nothing for tenant scopes.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn read_all(&self, entity: EntityType, scope: &TenantScope) -> StoreResult<Vec<Record>>;

    /// Open a transaction
    ///
    /// Writes become visible to other readers only after
    /// [`StoreTransaction::commit`]. Dropping the transaction without
    /// committing rolls it back.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot start a transaction.
    fn begin_transaction(&self) -> StoreResult<Box<dyn StoreTransaction + '_>>;
}

/// Open store transaction
pub trait StoreTransaction {
    /// Insert `record`, or replace the row with the same identifier
    ///
    /// # Errors
    ///
    /// Returns an error if the row violates a constraint (unresolved
    /// reference, duplicate unique field, ...).
    fn upsert(&mut self, entity: EntityType, record: Record) -> StoreResult<()>;

    /// Make all writes visible atomically
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; no write is applied then.
    fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Discard all writes
    ///
    /// # Errors
    ///
    /// Returns an error if the store reports a rollback failure.
    fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Full-text search indexer notified after a committed restore
///
/// Implementations must only enqueue work and return; reindexing is
/// eventually consistent and retryable on its own.
pub trait SearchIndexer: Send + Sync {
    /// Request a rebuild of the index for `scope`
    ///
    /// # Errors
    ///
    /// Returns a description of why the request could not be queued.
    fn reindex(&self, scope: &TenantScope) -> Result<(), String>;
}

/// Indexer that accepts every request and does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIndexer;

impl SearchIndexer for NoopIndexer {
    fn reindex(&self, _scope: &TenantScope) -> Result<(), String> {
        Ok(())
    }
}
