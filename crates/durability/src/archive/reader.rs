//! Archive reader
//!
//! Reads .zip archives and validates their contents before anything is
//! handed to a restore. Validation runs in a fixed order:
//!
//! 1. Format version (the manifest header is the only thing parsed)
//! 2. Manifest entity list against the payload entries, then checksums
//! 3. Entity names: unknown optional types are skipped, unknown required
//!    types are refused
//! 4. Payload schema versions and record counts
//! 5. Mandatory types and required parent types are present

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::record_set::{tenants_in, EntityRecordSet};
use crate::archive::types::{
    paths, xxh3_hex, ArchiveManifest, ArchiveVerifyInfo, CHECKSUM_ALGORITHM, FORMAT_VERSION,
    MIN_SUPPORTED_FORMAT_VERSION,
};
use ferry_core::{EntityType, TenantScope};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

/// Archive whose manifest, checksums and entity set have been validated
#[derive(Debug, Clone)]
pub struct ValidatedArchive {
    /// Archive manifest
    pub manifest: ArchiveManifest,
    /// Known record sets in archive order
    pub record_sets: Vec<EntityRecordSet>,
    /// Unknown optional entity types that were skipped
    pub skipped: Vec<String>,
}

impl ValidatedArchive {
    /// Scope the archive was exported from
    pub fn scope(&self) -> TenantScope {
        self.manifest.scope.to_scope()
    }

    /// Entity types in archive order
    pub fn entity_types(&self) -> Vec<EntityType> {
        self.record_sets.iter().map(|s| s.entity).collect()
    }

    /// Record set for an entity type
    pub fn record_set(&self, entity: EntityType) -> Option<&EntityRecordSet> {
        self.record_sets.iter().find(|s| s.entity == entity)
    }

    /// Total records that would be restored
    pub fn record_count(&self) -> usize {
        self.record_sets.iter().map(|s| s.len()).sum()
    }
}

/// Only the version of a manifest; parsed before the rest is trusted
#[derive(Deserialize)]
struct ManifestHeader {
    format_version: u32,
}

/// Reader for archives
///
/// Never touches a store: it only turns bytes into validated record sets.
pub struct ArchiveReader;

impl ArchiveReader {
    /// Open and validate an archive file
    pub fn open(path: &Path) -> ArchiveResult<ValidatedArchive> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Validate an archive held in memory
    pub fn from_bytes(data: &[u8]) -> ArchiveResult<ValidatedArchive> {
        Self::from_reader(Cursor::new(data))
    }

    /// Validate an archive from any seekable source
    pub fn from_reader<R: Read + Seek>(reader: R) -> ArchiveResult<ValidatedArchive> {
        let mut archive = ZipArchive::new(reader)?;
        let manifest = Self::load_manifest(&mut archive)?;
        let validated = Self::load_record_sets(&mut archive, manifest)?;

        debug!(
            target: "ferry::archive",
            entities = validated.record_sets.len(),
            records = validated.record_count(),
            skipped = validated.skipped.len(),
            "Archive validated"
        );
        Ok(validated)
    }

    /// Validate an archive file and summarize it without keeping the records
    pub fn verify(path: &Path) -> ArchiveResult<ArchiveVerifyInfo> {
        Ok(Self::summarize(Self::open(path)?))
    }

    /// Validate an in-memory archive and summarize it
    pub fn verify_bytes(data: &[u8]) -> ArchiveResult<ArchiveVerifyInfo> {
        Ok(Self::summarize(Self::from_bytes(data)?))
    }

    /// Read and version-check the manifest only
    pub fn read_manifest(path: &Path) -> ArchiveResult<ArchiveManifest> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(BufReader::new(file))?;
        Self::load_manifest(&mut archive)
    }

    /// Read and version-check the manifest of an in-memory archive
    pub fn read_manifest_from_bytes(data: &[u8]) -> ArchiveResult<ArchiveManifest> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        Self::load_manifest(&mut archive)
    }

    fn summarize(validated: ValidatedArchive) -> ArchiveVerifyInfo {
        ArchiveVerifyInfo {
            format_version: validated.manifest.format_version,
            producer_version: validated.manifest.producer_version.clone(),
            scope: validated.manifest.scope.clone(),
            entities: validated
                .record_sets
                .iter()
                .map(|s| (s.entity, s.len() as u64))
                .collect(),
            skipped: validated.skipped,
        }
    }

    fn load_manifest<R: Read + Seek>(archive: &mut ZipArchive<R>) -> ArchiveResult<ArchiveManifest> {
        let data = read_entry(archive, paths::MANIFEST)?;

        let header: ManifestHeader = serde_json::from_slice(&data)?;
        if header.format_version < MIN_SUPPORTED_FORMAT_VERSION
            || header.format_version > FORMAT_VERSION
        {
            return Err(ArchiveError::UnsupportedVersion {
                version: header.format_version,
                min: MIN_SUPPORTED_FORMAT_VERSION,
                max: FORMAT_VERSION,
            });
        }

        let manifest: ArchiveManifest = serde_json::from_slice(&data)?;
        if manifest.checksum_algorithm != CHECKSUM_ALGORITHM {
            return Err(ArchiveError::manifest_mismatch(format!(
                "unsupported checksum algorithm '{}'",
                manifest.checksum_algorithm
            )));
        }
        Ok(manifest)
    }

    fn load_record_sets<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
        manifest: ArchiveManifest,
    ) -> ArchiveResult<ValidatedArchive> {
        check_entry_list(archive, &manifest)?;

        // Every checksum is verified before any payload is interpreted
        let mut payloads = Vec::with_capacity(manifest.entities.len());
        for declared in &manifest.entities {
            let path = paths::record_set(&declared.name);
            let data = read_entry(archive, &path)?;
            let actual = xxh3_hex(&data);
            if actual != declared.checksum {
                return Err(ArchiveError::ChecksumMismatch {
                    file: path,
                    expected: declared.checksum.clone(),
                    actual,
                });
            }
            payloads.push(data);
        }

        let mut record_sets = Vec::with_capacity(payloads.len());
        let mut skipped = Vec::new();

        for (declared, data) in manifest.entities.iter().zip(payloads) {
            let entity = match EntityType::from_name(&declared.name) {
                Some(entity) => entity,
                None if declared.required => {
                    return Err(ArchiveError::UnknownEntity(declared.name.clone()));
                }
                None => {
                    warn!(
                        target: "ferry::archive",
                        entity = %declared.name,
                        records = declared.records,
                        "Skipping unknown optional entity type"
                    );
                    skipped.push(declared.name.clone());
                    continue;
                }
            };

            let supported = entity.schema().version;
            let version = EntityRecordSet::peek_schema_version(&data)?;
            if version > supported || declared.schema_version > supported {
                return Err(ArchiveError::SchemaTooNew {
                    entity,
                    version: version.max(declared.schema_version),
                    supported,
                });
            }

            let set = EntityRecordSet::decode(&data)?;
            if set.entity != entity || set.schema_version != declared.schema_version {
                return Err(ArchiveError::manifest_mismatch(format!(
                    "payload for {} does not match its manifest entry",
                    declared.name
                )));
            }
            if set.len() as u64 != declared.records {
                return Err(ArchiveError::manifest_mismatch(format!(
                    "{} declares {} records, payload holds {}",
                    declared.name,
                    declared.records,
                    set.len()
                )));
            }
            record_sets.push(set);
        }

        check_entity_set(&manifest, &record_sets)?;

        Ok(ValidatedArchive {
            manifest,
            record_sets,
            skipped,
        })
    }
}

/// Largest entry a reader will decompress
pub const MAX_ENTRY_BYTES: u64 = 1 << 30;

/// Upper bound on buffer space reserved from a declared entry size
const PREALLOC_LIMIT: u64 = 1 << 20;

/// Read one entry fully, reporting a missing entry as such
fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> ArchiveResult<Vec<u8>> {
    read_bounded(archive, name, MAX_ENTRY_BYTES)
}

/// Read one entry, refusing declared or actual sizes above `limit`
fn read_bounded<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    limit: u64,
) -> ArchiveResult<Vec<u8>> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Err(ArchiveError::missing_file(name)),
        Err(e) => return Err(e.into()),
    };
    if entry.size() > limit {
        return Err(ArchiveError::invalid_archive(format!(
            "{} declares {} bytes, limit is {}",
            name,
            entry.size(),
            limit
        )));
    }

    let mut data = Vec::with_capacity(entry.size().min(PREALLOC_LIMIT) as usize);
    entry
        .take(limit + 1)
        .read_to_end(&mut data)
        .map_err(|e| ArchiveError::invalid_archive(format!("read {}: {}", name, e)))?;
    if data.len() as u64 > limit {
        return Err(ArchiveError::invalid_archive(format!(
            "{} inflates past {} bytes",
            name, limit
        )));
    }
    Ok(data)
}

/// The manifest must declare exactly the payloads the container holds
fn check_entry_list<R: Read + Seek>(
    archive: &ZipArchive<R>,
    manifest: &ArchiveManifest,
) -> ArchiveResult<()> {
    let mut declared = HashSet::new();
    for entity in &manifest.entities {
        if !declared.insert(entity.name.as_str()) {
            return Err(ArchiveError::manifest_mismatch(format!(
                "entity type {} declared twice",
                entity.name
            )));
        }
    }

    let mut present = HashSet::new();
    for name in archive.file_names() {
        if name == paths::MANIFEST || name.ends_with('/') {
            continue;
        }
        match paths::entity_name(name) {
            Some(entity) => {
                present.insert(entity.to_string());
            }
            None => {
                return Err(ArchiveError::manifest_mismatch(format!(
                    "unexpected entry {}",
                    name
                )));
            }
        }
    }

    if let Some(undeclared) = present.iter().find(|p| !declared.contains(p.as_str())) {
        return Err(ArchiveError::manifest_mismatch(format!(
            "payload {} is not declared in the manifest",
            undeclared
        )));
    }
    if let Some(absent) = manifest
        .entities
        .iter()
        .find(|e| !present.contains(&e.name))
    {
        return Err(ArchiveError::missing_file(paths::record_set(&absent.name)));
    }
    Ok(())
}

/// Mandatory types exist and no type arrives without its required parents
fn check_entity_set(manifest: &ArchiveManifest, sets: &[EntityRecordSet]) -> ArchiveResult<()> {
    let present: HashSet<EntityType> = sets.iter().map(|s| s.entity).collect();

    for entity in EntityType::ALL.iter().filter(|t| t.is_mandatory()) {
        if !present.contains(entity) {
            return Err(ArchiveError::MissingEntity {
                entity: *entity,
                reason: "every archive must contain it".to_string(),
            });
        }
    }

    for set in sets {
        for parent in set.entity.required_parents() {
            if !present.contains(&parent) {
                return Err(ArchiveError::MissingEntity {
                    entity: parent,
                    reason: format!("required by {}", set.entity),
                });
            }
        }
    }

    let mut declared = manifest.scope.tenants.clone();
    declared.sort();
    let carried = tenants_in(sets);
    if declared != carried {
        return Err(ArchiveError::manifest_mismatch(format!(
            "manifest lists tenants {:?}, archive carries organizations {:?}",
            declared.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            carried.iter().map(|t| t.as_str()).collect::<Vec<_>>()
        )));
    }
    Ok(())
}
