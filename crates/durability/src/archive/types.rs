//! Archive core types
//!
//! Types for the portable archive format (.zip)

use ferry_core::{EntityType, TenantId, TenantScope};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Current archive format version
pub const FORMAT_VERSION: u32 = 1;

/// Oldest archive format version this build restores
pub const MIN_SUPPORTED_FORMAT_VERSION: u32 = 1;

/// File extension for archives
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// Checksum algorithm recorded in manifests
pub const CHECKSUM_ALGORITHM: &str = "xxh3";

/// Archive paths within the container
pub mod paths {
    /// Root directory in the archive
    pub const ROOT: &str = "ferry";
    /// Archive manifest file
    pub const MANIFEST: &str = "ferry/MANIFEST.json";
    /// Directory holding one payload per entity type
    pub const RECORDS_DIR: &str = "ferry/records/";

    /// Payload path for an entity type name
    pub fn record_set(name: &str) -> String {
        format!("{}{}.json", RECORDS_DIR, name)
    }

    /// Entity type name of a payload path, if it is one
    pub fn entity_name(path: &str) -> Option<&str> {
        path.strip_prefix(RECORDS_DIR)
            .and_then(|rest| rest.strip_suffix(".json"))
            .filter(|name| !name.is_empty() && !name.contains('/'))
    }
}

// =============================================================================
// MANIFEST.json
// =============================================================================

/// Scope kind recorded in a manifest
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// Single organization
    Tenant,
    /// Whole deployment
    Global,
}

/// Scope an archive was exported from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestScope {
    /// Tenant or global
    pub kind: ScopeKind,
    /// Organizations contained in the archive
    pub tenants: Vec<TenantId>,
}

impl ManifestScope {
    /// Scope for a tenant or global export
    pub fn new(scope: &TenantScope, tenants: Vec<TenantId>) -> Self {
        let kind = match scope {
            TenantScope::Tenant(_) => ScopeKind::Tenant,
            TenantScope::Global => ScopeKind::Global,
        };
        Self { kind, tenants }
    }

    /// Operation scope this manifest scope corresponds to
    ///
    /// A tenant archive that lists no tenant maps to an empty tenant id.
    pub fn to_scope(&self) -> TenantScope {
        match self.kind {
            ScopeKind::Global => TenantScope::Global,
            ScopeKind::Tenant => TenantScope::Tenant(
                self.tenants
                    .first()
                    .cloned()
                    .unwrap_or_else(|| TenantId::new("")),
            ),
        }
    }
}

/// One payload entry as declared by the manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestEntity {
    /// Entity type name
    pub name: String,

    /// Record layout version of the payload
    pub schema_version: u32,

    /// Number of records in the payload
    pub records: u64,

    /// Hex-encoded checksum of the payload bytes
    pub checksum: String,

    /// Whether a reader that does not know this type must refuse the archive
    pub required: bool,
}

/// Archive manifest - format metadata and checksums
///
/// This is the first entry read when opening an archive.
/// `entities` is ordered: it is the export (and restore) order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchiveManifest {
    /// Format version
    pub format_version: u32,

    /// Ferry version that created this archive
    pub producer_version: String,

    /// RFC 3339 timestamp when the archive was created
    pub created_at: String,

    /// Scope and tenants contained
    pub scope: ManifestScope,

    /// Checksum algorithm used (currently "xxh3")
    pub checksum_algorithm: String,

    /// Payload entries in archive order
    pub entities: Vec<ManifestEntity>,
}

impl ArchiveManifest {
    /// Create a manifest skeleton with the current timestamp and no entities
    ///
    /// The writer fills in the entity list and the tenants.
    pub fn skeleton(producer_version: impl Into<String>, scope: &TenantScope) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            producer_version: producer_version.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            scope: ManifestScope::new(scope, Vec::new()),
            checksum_algorithm: CHECKSUM_ALGORITHM.to_string(),
            entities: Vec::new(),
        }
    }

    /// Declared entity names in archive order
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }

    /// Declared entry for a name
    pub fn entity(&self, name: &str) -> Option<&ManifestEntity> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Total records across all payloads
    pub fn record_count(&self) -> u64 {
        self.entities.iter().map(|e| e.records).sum()
    }
}

// =============================================================================
// Export Types
// =============================================================================

/// Compression method for archive entries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveCompression {
    /// Deflate: readable by every unzip tool
    #[default]
    Deflate,
    /// Zstandard: smaller and faster, needs a modern extractor
    Zstd,
}

/// Options for the archive writer
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Entry compression method
    pub compression: ArchiveCompression,
    /// Compression level (Deflate 0-9, Zstd 1-22; default: 6)
    pub compression_level: i32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            compression: ArchiveCompression::Deflate,
            compression_level: 6,
        }
    }
}

/// Information returned after writing an archive
#[derive(Debug, Clone)]
pub struct ArchiveInfo {
    /// Path where the archive was written (empty for in-memory archives)
    pub path: PathBuf,

    /// Final file name, as sent in transport headers
    pub filename: String,

    /// Finalized manifest
    pub manifest: ArchiveManifest,

    /// Sum of manifest and payload sizes before compression
    pub uncompressed_bytes: u64,

    /// Size of the archive file
    pub compressed_bytes: u64,

    /// xxh3 checksum of the entire archive file
    pub checksum: String,
}

// =============================================================================
// Verify Types
// =============================================================================

/// Summary returned after verifying an archive
#[derive(Debug, Clone)]
pub struct ArchiveVerifyInfo {
    /// Format version of the archive
    pub format_version: u32,

    /// Producer version string
    pub producer_version: String,

    /// Scope recorded in the manifest
    pub scope: ManifestScope,

    /// Entity types that will be restored, with record counts
    pub entities: Vec<(EntityType, u64)>,

    /// Entity type names skipped as unknown and optional
    pub skipped: Vec<String>,
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Compute xxh3 hash of data and return as hex string
pub fn xxh3_hex(data: &[u8]) -> String {
    use xxhash_rust::xxh3::xxh3_64;
    format!("{:016x}", xxh3_64(data))
}
