//! Archive error types

use ferry_core::{EntityType, FerryError, TenantScope};
use std::io;
use thiserror::Error;

/// Errors that can occur while writing or reading archives
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Nothing was serialized for the scope
    #[error("Refusing to write an empty archive for {0}")]
    Empty(TenantScope),

    /// Writing the archive failed
    #[error("Archive write failed: {0}")]
    Write(String),

    /// Unsupported archive format version
    #[error("Unsupported format version: {version}. Supported: {min}..={max}")]
    UnsupportedVersion {
        /// Version found in the manifest
        version: u32,
        /// Oldest supported version
        min: u32,
        /// Newest supported version
        max: u32,
    },

    /// Payload written with a newer record layout than this build knows
    #[error("Record set {entity} has schema version {version}, newest supported is {supported}")]
    SchemaTooNew {
        /// Entity type of the payload
        entity: EntityType,
        /// Version found in the payload
        version: u32,
        /// Version this build writes
        supported: u32,
    },

    /// Checksum verification failed
    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Entry that failed checksum
        file: String,
        /// Expected checksum value
        expected: String,
        /// Actual computed checksum
        actual: String,
    },

    /// Manifest disagrees with the archive contents
    #[error("Manifest mismatch: {0}")]
    ManifestMismatch(String),

    /// Required entry missing from the container
    #[error("Missing required file in archive: {0}")]
    MissingFile(String),

    /// Entity type unknown to this build and not skippable
    #[error("Unknown entity type: {0}")]
    UnknownEntity(String),

    /// Entity type the archive must contain is absent
    #[error("Missing entity type {entity}: {reason}")]
    MissingEntity {
        /// Absent entity type
        entity: EntityType,
        /// Why it is required
        reason: String,
    },

    /// Container could not be parsed
    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ArchiveError {
    /// Create a write error
    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }

    /// Create an invalid archive error
    pub fn invalid_archive(msg: impl Into<String>) -> Self {
        Self::InvalidArchive(msg.into())
    }

    /// Create a manifest mismatch error
    pub fn manifest_mismatch(msg: impl Into<String>) -> Self {
        Self::ManifestMismatch(msg.into())
    }

    /// Create a missing file error
    pub fn missing_file(path: impl Into<String>) -> Self {
        Self::MissingFile(path.into())
    }

    /// Reclassify low-level failures raised while producing an archive
    pub fn into_write_failure(self) -> Self {
        match self {
            ArchiveError::Io(e) => ArchiveError::Write(e.to_string()),
            ArchiveError::Json(e) => ArchiveError::Write(format!("encode: {}", e)),
            ArchiveError::InvalidArchive(msg) => ArchiveError::Write(msg),
            other => other,
        }
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => ArchiveError::Io(io),
            other => ArchiveError::InvalidArchive(other.to_string()),
        }
    }
}

impl From<ArchiveError> for FerryError {
    fn from(e: ArchiveError) -> Self {
        match e {
            ArchiveError::Empty(scope) => FerryError::EmptyExport(scope),
            ArchiveError::Write(msg) => FerryError::Write(msg),
            ArchiveError::UnsupportedVersion { .. } | ArchiveError::SchemaTooNew { .. } => {
                FerryError::version(e.to_string())
            }
            ArchiveError::UnknownEntity(name) => FerryError::UnknownEntity(name),
            ArchiveError::MissingEntity { entity, reason } => {
                FerryError::missing_entity(entity, reason)
            }
            ArchiveError::ChecksumMismatch { .. }
            | ArchiveError::ManifestMismatch(_)
            | ArchiveError::MissingFile(_)
            | ArchiveError::InvalidArchive(_)
            | ArchiveError::Io(_)
            | ArchiveError::Json(_) => FerryError::integrity(e.to_string()),
        }
    }
}

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;
