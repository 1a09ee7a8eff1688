//! Error types for Ferry
//!
//! [`FerryError`] is the operation-level taxonomy every export or restore
//! failure is surfaced as. [`StoreError`] is what store implementations
//! report; the engine lifts it into a `FerryError` with context.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::entity::EntityType;
use crate::types::TenantScope;
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for Ferry operations
pub type FerryResult<T> = std::result::Result<T, FerryError>;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Discriminant of a [`FerryError`], stable for API consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Store unreadable during export
    ReadFailure,
    /// Archive could not be written
    WriteFailure,
    /// Scope produced zero data
    EmptyExportFailure,
    /// Archive format or schema version not supported
    VersionFailure,
    /// Checksum or manifest/payload mismatch
    IntegrityFailure,
    /// Archive declares an entity type this build does not know
    UnknownEntityFailure,
    /// Archive lacks an entity type it must contain
    MissingEntityFailure,
    /// Another operation holds the scope
    ConflictFailure,
    /// A record violates store constraints or references
    ConstraintFailure,
    /// Restore exceeded its wall-clock ceiling
    TimeoutFailure,
    /// Malformed request
    InvalidRequest,
}

impl ErrorKind {
    /// Name as reported to callers
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ReadFailure => "ReadFailure",
            ErrorKind::WriteFailure => "WriteFailure",
            ErrorKind::EmptyExportFailure => "EmptyExportFailure",
            ErrorKind::VersionFailure => "VersionFailure",
            ErrorKind::IntegrityFailure => "IntegrityFailure",
            ErrorKind::UnknownEntityFailure => "UnknownEntityFailure",
            ErrorKind::MissingEntityFailure => "MissingEntityFailure",
            ErrorKind::ConflictFailure => "ConflictFailure",
            ErrorKind::ConstraintFailure => "ConstraintFailure",
            ErrorKind::TimeoutFailure => "TimeoutFailure",
            ErrorKind::InvalidRequest => "InvalidRequest",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of one export or restore operation
#[derive(Debug, Error)]
pub enum FerryError {
    /// Store read failed during export; no archive was produced
    #[error("Read failure on {entity}: {reason}")]
    Read {
        /// Entity type being read
        entity: EntityType,
        /// Underlying cause
        reason: String,
    },

    /// Archive could not be written; partial file removed
    #[error("Write failure: {0}")]
    Write(String),

    /// Export scope produced no data
    #[error("Nothing to export for {0}: zero entity types serialized")]
    EmptyExport(TenantScope),

    /// Archive version outside the supported range
    #[error("Version failure: {0}")]
    Version(String),

    /// Checksum mismatch or manifest/payload disagreement
    #[error("Integrity failure: {0}")]
    Integrity(String),

    /// Archive declares a required entity type this build does not know
    #[error("Unknown entity type in archive: {0}")]
    UnknownEntity(String),

    /// Archive lacks an entity type it must contain
    #[error("Missing entity type in archive: {entity} ({reason})")]
    MissingEntity {
        /// Absent entity type
        entity: EntityType,
        /// Why it was required
        reason: String,
    },

    /// Another backup/restore holds the scope
    #[error("Conflict: a backup or restore is already running for {0}")]
    Conflict(TenantScope),

    /// A record was rejected during restore
    #[error("Constraint failure in {entity} at record {index}: {reason}")]
    Constraint {
        /// Entity type of the failing record
        entity: EntityType,
        /// Zero-based index of the record within its record set
        index: usize,
        /// Description of the violation
        reason: String,
    },

    /// Restore ran past its wall-clock ceiling and was rolled back
    #[error("Restore exceeded its time limit of {limit_ms}ms and was rolled back")]
    Timeout {
        /// Configured ceiling in milliseconds
        limit_ms: u64,
    },

    /// Malformed request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FerryError {
    /// Create a write failure
    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }

    /// Create a version failure
    pub fn version(msg: impl Into<String>) -> Self {
        Self::Version(msg.into())
    }

    /// Create an integrity failure
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a constraint failure for one record
    pub fn constraint(entity: EntityType, index: usize, reason: impl Into<String>) -> Self {
        Self::Constraint {
            entity,
            index,
            reason: reason.into(),
        }
    }

    /// Create a missing entity failure
    pub fn missing_entity(entity: EntityType, reason: impl Into<String>) -> Self {
        Self::MissingEntity {
            entity,
            reason: reason.into(),
        }
    }

    /// Discriminant of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FerryError::Read { .. } => ErrorKind::ReadFailure,
            FerryError::Write(_) => ErrorKind::WriteFailure,
            FerryError::EmptyExport(_) => ErrorKind::EmptyExportFailure,
            FerryError::Version(_) => ErrorKind::VersionFailure,
            FerryError::Integrity(_) => ErrorKind::IntegrityFailure,
            FerryError::UnknownEntity(_) => ErrorKind::UnknownEntityFailure,
            FerryError::MissingEntity { .. } => ErrorKind::MissingEntityFailure,
            FerryError::Conflict(_) => ErrorKind::ConflictFailure,
            FerryError::Constraint { .. } => ErrorKind::ConstraintFailure,
            FerryError::Timeout { .. } => ErrorKind::TimeoutFailure,
            FerryError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    /// Whether the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(self, FerryError::Conflict(_) | FerryError::Timeout { .. })
    }
}

impl From<io::Error> for FerryError {
    fn from(e: io::Error) -> Self {
        FerryError::Write(e.to_string())
    }
}

/// Errors reported by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store could not be reached or read
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A referenced row does not exist
    #[error("Unresolved reference {field} -> {parent}:{target}")]
    UnresolvedReference {
        /// Reference field
        field: String,
        /// Parent entity type
        parent: EntityType,
        /// Referenced identifier
        target: String,
    },

    /// A unique field collides with an existing row
    #[error("Duplicate value for unique field {field}: {value}")]
    Duplicate {
        /// Unique field
        field: String,
        /// Colliding value
        value: String,
    },

    /// Row rejected by any other constraint
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// Transaction is no longer usable
    #[error("Transaction closed: {0}")]
    TransactionClosed(String),
}

impl StoreError {
    /// Create an unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a generic constraint error
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }
}
