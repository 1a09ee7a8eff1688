//! Portable tenant archive format
//!
//! This module implements the container that carries a tenant's (or the
//! whole deployment's) relational data between deployments.
//!
//! ## Archive Structure
//!
//! ```text
//! ferry-<scope>-<id>.zip
//! └── ferry/
//!     ├── MANIFEST.json            # format version, scope, entity order, checksums
//!     └── records/
//!         ├── organizations.json   # one payload per present entity type
//!         ├── spaces.json
//!         └── ...
//! ```
//!
//! ## Format Version
//!
//! Readers accept `MIN_SUPPORTED_FORMAT_VERSION..=FORMAT_VERSION` and refuse
//! anything else before parsing a payload. Each payload carries its own
//! record layout version; a payload newer than this build is refused too.
//!
//! ## Properties
//!
//! - **Atomic**: a failed write leaves no file behind
//! - **Verifiable**: every payload is checksummed (xxh3) in the manifest
//! - **Inspectable**: any unzip tool and jq can read the contents
//! - **Deterministic**: same data and manifest produce identical bytes

pub mod error;
pub mod reader;
pub mod record_set;
pub mod types;
pub mod writer;

pub use error::{ArchiveError, ArchiveResult};
pub use reader::{ArchiveReader, ValidatedArchive};
pub use record_set::EntityRecordSet;
pub use types::{
    paths, xxh3_hex, ArchiveCompression, ArchiveInfo, ArchiveManifest, ArchiveVerifyInfo,
    ExportOptions, ManifestEntity, ManifestScope, ScopeKind, ARCHIVE_EXTENSION,
    CHECKSUM_ALGORITHM, FORMAT_VERSION, MIN_SUPPORTED_FORMAT_VERSION,
};
pub use writer::ArchiveWriter;
