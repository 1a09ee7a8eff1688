//! Service facade
//!
//! [`FerryService`] owns the shared pieces (store, indexer, scope locks,
//! config) and runs every export and restore under the lock of its scope.
//! Locks are taken without waiting: a busy scope fails immediately with a
//! conflict failure.

use std::path::Path;
use std::sync::Arc;

use ferry_concurrency::ScopeLocks;
use ferry_core::{FerryResult, SearchIndexer, Store, TenantId};
use ferry_durability::{ArchiveInfo, ArchiveReader, ArchiveVerifyInfo, ValidatedArchive};
use tracing::debug;

use crate::config::FerryConfig;
use crate::export::{ExportPipeline, ExportSpec};
use crate::restore::{RestoreOptions, RestoreOrchestrator, RestoreReport};

/// Export/restore entry point shared by every request
#[derive(Clone)]
pub struct FerryService {
    store: Arc<dyn Store>,
    indexer: Arc<dyn SearchIndexer>,
    locks: ScopeLocks,
    config: FerryConfig,
}

impl FerryService {
    /// Service over `store` with a fresh lock table
    pub fn new(store: Arc<dyn Store>, indexer: Arc<dyn SearchIndexer>, config: FerryConfig) -> Self {
        Self {
            store,
            indexer,
            locks: ScopeLocks::new(),
            config,
        }
    }

    /// Share an existing lock table
    pub fn with_locks(mut self, locks: ScopeLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Lock table guarding every scope
    pub fn locks(&self) -> &ScopeLocks {
        &self.locks
    }

    /// Active configuration
    pub fn config(&self) -> &FerryConfig {
        &self.config
    }

    /// Export for a caller belonging to `tenant`
    ///
    /// Tenant specs export `tenant`; global specs export everything.
    ///
    /// # Errors
    ///
    /// Conflict failure when the scope is busy, otherwise any export error.
    pub fn export(&self, spec: &ExportSpec, tenant: &TenantId) -> FerryResult<ArchiveInfo> {
        let scope = spec.resolve_scope(tenant);
        let _guard = self.locks.try_acquire(&scope)?;
        ExportPipeline::new(self.store.as_ref(), &self.config).run(spec, &scope)
    }

    /// Restore a validated archive
    ///
    /// The lock is taken on the archive's tenant (or global) before any
    /// validation of its records.
    ///
    /// # Errors
    ///
    /// Conflict failure when the scope is busy, otherwise any restore error.
    pub fn restore(
        &self,
        archive: &ValidatedArchive,
        options: &RestoreOptions,
    ) -> FerryResult<RestoreReport> {
        let scope = RestoreOrchestrator::lock_scope(archive, options)?;
        let _guard = self.locks.try_acquire(&scope)?;
        debug!(target: "ferry::restore", scope = %scope, "Restore lock held");

        RestoreOrchestrator::new(
            self.store.as_ref(),
            self.indexer.as_ref(),
            self.config.restore_timeout(),
        )
        .restore(archive, options)
    }

    /// Read, validate and restore an archive held in memory
    ///
    /// # Errors
    ///
    /// Archive validation errors, then as [`FerryService::restore`].
    pub fn restore_bytes(&self, bytes: &[u8], options: &RestoreOptions) -> FerryResult<RestoreReport> {
        let archive = ArchiveReader::from_bytes(bytes)?;
        self.restore(&archive, options)
    }

    /// Read, validate and restore an archive file
    ///
    /// # Errors
    ///
    /// Archive validation errors, then as [`FerryService::restore`].
    pub fn restore_file(&self, path: &Path, options: &RestoreOptions) -> FerryResult<RestoreReport> {
        let archive = ArchiveReader::open(path)?;
        self.restore(&archive, options)
    }

    /// Validate an archive file without restoring it
    ///
    /// # Errors
    ///
    /// Any archive validation error.
    pub fn verify(&self, path: &Path) -> FerryResult<ArchiveVerifyInfo> {
        Ok(ArchiveReader::verify(path)?)
    }
}
