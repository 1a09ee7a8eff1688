//! Durability layer for Ferry
//!
//! This crate owns everything that touches archive files:
//!
//! - Archive manifest and per-entity payload formats
//! - Archive Writer: checksummed, atomic (temp file + rename) zip output
//! - Archive Reader: version gating, integrity and entity-set validation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod archive;

pub use archive::{
    ArchiveCompression, ArchiveError, ArchiveInfo, ArchiveManifest, ArchiveReader, ArchiveResult,
    ArchiveVerifyInfo, ArchiveWriter, EntityRecordSet, ExportOptions, ManifestEntity,
    ManifestScope, ScopeKind, ValidatedArchive, ARCHIVE_EXTENSION, FORMAT_VERSION,
    MIN_SUPPORTED_FORMAT_VERSION,
};
