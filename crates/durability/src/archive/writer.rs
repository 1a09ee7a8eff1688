//! Archive writer
//!
//! Creates .zip archives containing:
//! - ferry/MANIFEST.json - Format metadata, entity order and checksums
//! - ferry/records/<entity>.json - One payload per present entity type

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::record_set::{tenants_in, EntityRecordSet};
use crate::archive::types::{
    paths, xxh3_hex, ArchiveCompression, ArchiveInfo, ArchiveManifest, ExportOptions,
    ManifestEntity,
};
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use xxhash_rust::xxh3::Xxh3;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Manifest and payloads encoded, ready to be put in a container
struct Prepared {
    manifest: ArchiveManifest,
    manifest_json: Vec<u8>,
    payloads: Vec<(String, Vec<u8>)>,
}

impl Prepared {
    fn uncompressed_bytes(&self) -> u64 {
        let payloads: usize = self.payloads.iter().map(|(_, data)| data.len()).sum();
        (self.manifest_json.len() + payloads) as u64
    }
}

/// Writer for archives
///
/// Creates .zip files with atomic write semantics.
pub struct ArchiveWriter {
    compression: ArchiveCompression,
    compression_level: i32,
}

impl ArchiveWriter {
    /// Create a new writer with the given options
    pub fn new(options: &ExportOptions) -> Self {
        Self {
            compression: options.compression,
            compression_level: options.compression_level,
        }
    }

    /// Create a new writer with default options
    pub fn with_defaults() -> Self {
        Self::new(&ExportOptions::default())
    }

    /// Write a complete archive
    ///
    /// `manifest` is a skeleton: its entity list is rebuilt from `sets`,
    /// which must already be in export order. Either the complete archive
    /// is written or no file is left behind.
    pub fn write(
        &self,
        manifest: ArchiveManifest,
        sets: &[EntityRecordSet],
        path: &Path,
    ) -> ArchiveResult<ArchiveInfo> {
        let prepared = Self::prepare(manifest, sets)?;

        let temp_path = path.with_extension("tmp");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| ArchiveError::from(e).into_write_failure())?;
            }
        }

        let result = self
            .write_file(&prepared, &temp_path)
            .and_then(|()| fs::rename(&temp_path, path).map_err(ArchiveError::from))
            .map_err(ArchiveError::into_write_failure);

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        let (compressed_bytes, checksum) = match file_digest(path) {
            Ok(digest) => digest,
            Err(e) => {
                let _ = fs::remove_file(path);
                return Err(ArchiveError::from(e).into_write_failure());
            }
        };

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!(
            target: "ferry::archive",
            file = %filename,
            entities = prepared.payloads.len(),
            records = prepared.manifest.record_count(),
            bytes = compressed_bytes,
            "Archive written"
        );

        Ok(ArchiveInfo {
            path: path.to_path_buf(),
            filename,
            uncompressed_bytes: prepared.uncompressed_bytes(),
            compressed_bytes,
            checksum,
            manifest: prepared.manifest,
        })
    }

    /// Write an archive to a Vec<u8>
    pub fn write_to_vec(
        &self,
        manifest: ArchiveManifest,
        sets: &[EntityRecordSet],
    ) -> ArchiveResult<(Vec<u8>, ArchiveInfo)> {
        let prepared = Self::prepare(manifest, sets)?;

        let cursor = self
            .write_entries(Cursor::new(Vec::new()), &prepared)
            .map_err(ArchiveError::into_write_failure)?;
        let buffer = cursor.into_inner();

        let info = ArchiveInfo {
            path: PathBuf::new(),
            filename: String::new(),
            uncompressed_bytes: prepared.uncompressed_bytes(),
            compressed_bytes: buffer.len() as u64,
            checksum: xxh3_hex(&buffer),
            manifest: prepared.manifest,
        };
        Ok((buffer, info))
    }

    /// Encode payloads and finalize the manifest
    fn prepare(mut manifest: ArchiveManifest, sets: &[EntityRecordSet]) -> ArchiveResult<Prepared> {
        let present: Vec<&EntityRecordSet> = sets.iter().filter(|s| !s.is_empty()).collect();
        if present.is_empty() {
            return Err(ArchiveError::Empty(manifest.scope.to_scope()));
        }

        manifest.entities.clear();
        manifest.scope.tenants = tenants_in(sets);
        let mut payloads = Vec::with_capacity(present.len());

        for set in present {
            let data = set.encode().map_err(ArchiveError::into_write_failure)?;
            let name = set.entity.name();
            if manifest.entity(name).is_some() {
                return Err(ArchiveError::write(format!(
                    "entity type {} supplied twice",
                    name
                )));
            }
            manifest.entities.push(ManifestEntity {
                name: name.to_string(),
                schema_version: set.schema_version,
                records: set.len() as u64,
                checksum: xxh3_hex(&data),
                required: !set.entity.is_skippable(),
            });
            debug!(
                target: "ferry::archive",
                entity = name,
                records = set.len(),
                bytes = data.len(),
                "Payload encoded"
            );
            payloads.push((paths::record_set(name), data));
        }

        let manifest_json =
            serde_json::to_vec_pretty(&manifest).map_err(|e| ArchiveError::write(e.to_string()))?;

        Ok(Prepared {
            manifest,
            manifest_json,
            payloads,
        })
    }

    fn write_file(&self, prepared: &Prepared, path: &Path) -> ArchiveResult<()> {
        let file = File::create(path)?;
        let buf_writer = self.write_entries(BufWriter::new(file), prepared)?;
        let file = buf_writer
            .into_inner()
            .map_err(|e| ArchiveError::write(format!("flush: {}", e.error())))?;
        file.sync_all()?;
        Ok(())
    }

    /// Put the manifest first, then every payload in manifest order
    fn write_entries<W: Write + Seek>(&self, writer: W, prepared: &Prepared) -> ArchiveResult<W> {
        let options = self.file_options();
        let mut zip = ZipWriter::new(writer);

        zip.start_file(paths::MANIFEST, options)?;
        zip.write_all(&prepared.manifest_json)?;

        for (entry, data) in &prepared.payloads {
            zip.start_file(entry.as_str(), options)?;
            zip.write_all(data)?;
        }

        Ok(zip.finish()?)
    }

    fn file_options(&self) -> SimpleFileOptions {
        let method = match self.compression {
            ArchiveCompression::Deflate => CompressionMethod::Deflated,
            ArchiveCompression::Zstd => CompressionMethod::Zstd,
        };
        // Fixed timestamp so identical data yields identical archives
        SimpleFileOptions::default()
            .compression_method(method)
            .compression_level(Some(i64::from(self.compression_level)))
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644)
    }
}

/// Size and xxh3 checksum of a file, read in chunks
fn file_digest(path: &Path) -> std::io::Result<(u64, String)> {
    let mut file = File::open(path)?;
    let mut hasher = Xxh3::new();
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((total, format!("{:016x}", hasher.digest())))
}
