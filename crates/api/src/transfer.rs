//! Transfer endpoints
//!
//! Transport-agnostic handlers for the export ("backup") and restore
//! requests. The host maps its HTTP layer onto these: request body bytes
//! in, response headers and a body writer out.
//!
//! ## Export
//!
//! 1. Caller must be an administrator; a global export needs a global
//!    administrator.
//! 2. The archive is built on disk under the scope lock.
//! 3. The file is streamed into the response body, never buffered whole.
//! 4. The file is removed after streaming unless `retain` was asked for,
//!    and always removed when streaming fails.
//!
//! ## Restore
//!
//! The archive is validated before the scope lock is taken. Tenant
//! administrators may only restore an archive of their own organization.

use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use ferry_core::{FerryError, TenantScope};
use ferry_durability::{ArchiveReader, ScopeKind};
use ferry_engine::{ExportSpec, FerryService, RestoreOptions, RestoreOrchestrator, RestoreReport};
use tracing::{info, warn};

use crate::context::RequestContext;
use crate::error::{ApiError, ApiResult};

/// Custom header carrying the bare archive file name
pub const FILENAME_HEADER: &str = "x-ferry-filename";

/// Media type of archives
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Metadata of a completed export response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResponse {
    /// HTTP status
    pub status: u16,
    /// Response headers, in the order they are sent
    pub headers: Vec<(String, String)>,
    /// Archive file name
    pub filename: String,
    /// Bytes written to the body
    pub content_length: u64,
    /// Location of the archive when it was retained
    pub retained: Option<PathBuf>,
}

impl ExportResponse {
    /// Value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn export_headers(filename: &str, length: u64) -> Vec<(String, String)> {
    vec![
        ("Content-Type".to_string(), ARCHIVE_CONTENT_TYPE.to_string()),
        (
            "Content-Disposition".to_string(),
            content_disposition(filename),
        ),
        ("Content-Length".to_string(), length.to_string()),
        (FILENAME_HEADER.to_string(), filename.to_string()),
    ]
}

/// Download disposition carrying the name in both the plain and the
/// extended (RFC 6266) parameter; archive names are plain ASCII
fn content_disposition(filename: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        filename, filename
    )
}

/// Export and restore handlers over one [`FerryService`]
#[derive(Clone)]
pub struct TransferEndpoint {
    service: FerryService,
}

impl TransferEndpoint {
    /// Endpoints backed by `service`
    pub fn new(service: FerryService) -> Self {
        Self { service }
    }

    /// Underlying service
    pub fn service(&self) -> &FerryService {
        &self.service
    }

    /// Handle an export request, streaming the archive into `sink`
    ///
    /// # Errors
    ///
    /// Forbidden for callers without the needed role, invalid request for a
    /// bad body, any export failure, or a stream failure.
    pub fn request_export<W: Write>(
        &self,
        ctx: &RequestContext,
        body: &[u8],
        sink: &mut W,
    ) -> ApiResult<ExportResponse> {
        if !ctx.administrator {
            info!(
                target: "ferry::api",
                user = %ctx.user_id,
                "Non-administrator attempted an export"
            );
            return Err(ApiError::forbidden("administrator required"));
        }

        let spec = ExportSpec::from_json(body)?;
        if spec.scope == ScopeKind::Global && !ctx.global_admin {
            info!(
                target: "ferry::api",
                user = %ctx.user_id,
                "Non-global administrator attempted a global export"
            );
            return Err(ApiError::forbidden("global administrator required"));
        }

        let archive = self.service.export(&spec, &ctx.org_id)?;
        let headers = export_headers(&archive.filename, archive.compressed_bytes);

        let written = match stream_file(&archive.path, sink) {
            Ok(n) => n,
            Err(e) => {
                remove_archive(&archive.path);
                warn!(
                    target: "ferry::api",
                    file = %archive.filename,
                    error = %e,
                    "Export stream failed"
                );
                return Err(ApiError::Stream(e));
            }
        };

        let retained = if spec.retain {
            Some(archive.path.clone())
        } else {
            remove_archive(&archive.path);
            None
        };

        info!(
            target: "ferry::api",
            org = %ctx.org_id,
            user = %ctx.user_id,
            file = %archive.filename,
            bytes = written,
            retained = spec.retain,
            "Export delivered"
        );

        Ok(ExportResponse {
            status: 200,
            headers,
            filename: archive.filename,
            content_length: written,
            retained,
        })
    }

    /// Handle a restore request for an archive held in memory
    ///
    /// # Errors
    ///
    /// Forbidden for callers without the needed role or restoring another
    /// tenant's archive, invalid request for bad options, then any archive
    /// or restore failure.
    pub fn request_restore(
        &self,
        ctx: &RequestContext,
        archive_bytes: &[u8],
        options_json: &[u8],
    ) -> ApiResult<RestoreReport> {
        if !ctx.administrator {
            info!(
                target: "ferry::api",
                user = %ctx.user_id,
                "Non-administrator attempted a restore"
            );
            return Err(ApiError::forbidden("administrator required"));
        }

        let options = RestoreOptions::from_json(options_json)?;
        if options.scope == ScopeKind::Global && !ctx.global_admin {
            return Err(ApiError::forbidden("global administrator required"));
        }

        let archive = ArchiveReader::from_bytes(archive_bytes).map_err(FerryError::from)?;

        if !ctx.global_admin {
            let scope = RestoreOrchestrator::lock_scope(&archive, &options)?;
            if scope != TenantScope::Tenant(ctx.org_id.clone()) {
                info!(
                    target: "ferry::api",
                    user = %ctx.user_id,
                    archive = %scope,
                    "Restore of another organization's archive refused"
                );
                return Err(ApiError::forbidden(
                    "archive belongs to another organization",
                ));
            }
        }

        let report = self.service.restore(&archive, &options)?;
        info!(
            target: "ferry::api",
            org = %ctx.org_id,
            user = %ctx.user_id,
            scope = %report.scope,
            records = report.total(),
            "Restore completed"
        );
        Ok(report)
    }
}

fn stream_file<W: Write>(path: &Path, sink: &mut W) -> io::Result<u64> {
    let mut reader = BufReader::new(File::open(path)?);
    let n = io::copy(&mut reader, sink)?;
    sink.flush()?;
    Ok(n)
}

fn remove_archive(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(
            target: "ferry::api",
            path = %path.display(),
            error = %e,
            "Failed to remove archive"
        );
    }
}
