//! Ferry - tenant data portability
//!
//! Ferry exports the whole dataset of one tenant (or of the deployment) into
//! a portable, checksummed ZIP archive and restores such an archive into a
//! store inside a single transaction.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use ferry::{ExportSpec, FerryConfig, FerryService, NoopIndexer, RestoreOptions, TenantId};
//!
//! let service = FerryService::new(store, Arc::new(NoopIndexer), FerryConfig::default());
//!
//! // Archive one tenant
//! let archive = service.export(&ExportSpec::tenant(), &TenantId::new("org-1"))?;
//!
//! // Restore it elsewhere with fresh identifiers
//! let report = other.restore_file(&archive.path, &RestoreOptions::default())?;
//! ```
//!
//! # Architecture
//!
//! - `ferry-core`: entity catalogue, records, errors, store/indexer traits
//! - `ferry-storage`: in-memory reference store
//! - `ferry-concurrency`: scope locks and deadlines
//! - `ferry-durability`: archive format, writer and reader
//! - `ferry-engine`: ordering, serialization, restore, service facade
//! - `ferry-api`: transfer endpoints

pub use ferry_api::{
    ApiError, ApiResult, ErrorBody, ExportResponse, RequestContext, TransferEndpoint,
    FILENAME_HEADER,
};
pub use ferry_concurrency::{Deadline, ScopeGuard, ScopeLocks};
pub use ferry_core::{
    EntityType, ErrorKind, FerryError, FerryResult, NoopIndexer, Record, RecordId, RestoreMode,
    SearchIndexer, Store, StoreError, StoreTransaction, TenantId, TenantScope,
};
pub use ferry_durability::{
    ArchiveInfo, ArchiveManifest, ArchiveReader, ArchiveVerifyInfo, ArchiveWriter,
    EntityRecordSet, ScopeKind, ValidatedArchive, FORMAT_VERSION, MIN_SUPPORTED_FORMAT_VERSION,
};
pub use ferry_engine::{
    dependency_order, ExportSpec, FerryConfig, FerryService, RestoreOptions, RestoreReport,
    RestoreState,
};
pub use ferry_storage::MemoryStore;
