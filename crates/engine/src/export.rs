//! Export pipeline
//!
//! `ExportSpec` → dependency order (optionally narrowed by `include`) →
//! [`EntitySerializer`] → [`ArchiveWriter`] → archive file in
//! `archive_dir`. A failed export leaves no file behind.

use std::time::Instant;

use chrono::{DateTime, Utc};
use ferry_core::{EntityType, FerryError, FerryResult, Store, TenantId, TenantScope};
use ferry_durability::{
    ArchiveInfo, ArchiveManifest, ArchiveWriter, ScopeKind, ARCHIVE_EXTENSION,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::FerryConfig;
use crate::graph;
use crate::serializer::EntitySerializer;

/// Export request
///
/// JSON shape: `{"scope": "tenant" | "global", "retain": bool, "include": [names]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportSpec {
    /// Caller's tenant or the whole deployment
    #[serde(default = "default_scope")]
    pub scope: ScopeKind,
    /// Keep the archive file after it has been transferred
    #[serde(default)]
    pub retain: bool,
    /// Restrict to these entity types, their parents and the mandatory types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
}

fn default_scope() -> ScopeKind {
    ScopeKind::Tenant
}

impl Default for ExportSpec {
    fn default() -> Self {
        Self::tenant()
    }
}

impl ExportSpec {
    /// Export of the caller's tenant
    pub fn tenant() -> Self {
        Self {
            scope: ScopeKind::Tenant,
            retain: false,
            include: None,
        }
    }

    /// Export of every tenant plus instance settings
    pub fn global() -> Self {
        Self {
            scope: ScopeKind::Global,
            ..Self::tenant()
        }
    }

    /// Keep the file after transfer
    pub fn retained(mut self) -> Self {
        self.retain = true;
        self
    }

    /// Narrow the export to `names` and their parents
    pub fn including<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Parse a request body; an empty body is a tenant export
    ///
    /// # Errors
    ///
    /// Returns an invalid request error for malformed JSON or unknown fields.
    pub fn from_json(body: &[u8]) -> FerryResult<Self> {
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| FerryError::invalid_request(format!("export spec: {}", e)))
    }

    /// Scope for a caller belonging to `tenant`
    pub fn resolve_scope(&self, tenant: &TenantId) -> TenantScope {
        match self.scope {
            ScopeKind::Tenant => TenantScope::Tenant(tenant.clone()),
            ScopeKind::Global => TenantScope::Global,
        }
    }

    /// Entity types named by `include`, if any
    ///
    /// # Errors
    ///
    /// Returns an invalid request error for an unknown entity name.
    pub fn entity_filter(&self) -> FerryResult<Option<Vec<EntityType>>> {
        let Some(names) = &self.include else {
            return Ok(None);
        };
        names
            .iter()
            .map(|name| {
                EntityType::from_name(name).ok_or_else(|| {
                    FerryError::invalid_request(format!("unknown entity type '{}'", name))
                })
            })
            .collect::<FerryResult<Vec<_>>>()
            .map(Some)
    }

    /// Types to serialize, in dependency order
    ///
    /// # Errors
    ///
    /// Returns an invalid request error for an unknown entity name.
    pub fn export_order(&self) -> FerryResult<Vec<EntityType>> {
        Ok(match self.entity_filter()? {
            Some(types) => graph::include_closure(&types),
            None => graph::dependency_order().to_vec(),
        })
    }
}

/// Archive file name: `<prefix>-<scope>-<YYYYmmdd-HHMMSS>-<id>.zip`
///
/// The scope label is reduced to ASCII letters, digits, `-` and `_`.
pub fn archive_filename(prefix: &str, scope: &TenantScope, at: DateTime<Utc>) -> String {
    let label: String = scope
        .label()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let id = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}-{}{}",
        prefix,
        label,
        at.format("%Y%m%d-%H%M%S"),
        &id[..8],
        ARCHIVE_EXTENSION
    )
}

/// Runs one export from a store into `archive_dir`
pub struct ExportPipeline<'a> {
    store: &'a dyn Store,
    config: &'a FerryConfig,
}

impl<'a> ExportPipeline<'a> {
    /// Pipeline reading `store`, writing per `config`
    pub fn new(store: &'a dyn Store, config: &'a FerryConfig) -> Self {
        Self { store, config }
    }

    /// Export `scope` as described by `spec`
    ///
    /// # Errors
    ///
    /// - invalid request for an unknown `include` name
    /// - read failure naming the entity type whose read failed
    /// - empty export when nothing in scope has rows
    /// - write failure on disk or compression errors (no file is left)
    pub fn run(&self, spec: &ExportSpec, scope: &TenantScope) -> FerryResult<ArchiveInfo> {
        let started = Instant::now();
        let order = spec.export_order()?;

        info!(
            target: "ferry::export",
            scope = %scope,
            entities = order.len(),
            "Export started"
        );

        let sets = EntitySerializer::new(self.store).serialize(scope, &order)?;
        let manifest = ArchiveManifest::skeleton(env!("CARGO_PKG_VERSION"), scope);

        let filename = archive_filename(&self.config.filename_prefix, scope, Utc::now());
        let path = self.config.archive_dir.join(&filename);

        let writer = ArchiveWriter::new(&self.config.export_options());
        let archive = writer.write(manifest, &sets, &path).map_err(|e| {
            warn!(target: "ferry::export", scope = %scope, error = %e, "Export failed");
            FerryError::from(e)
        })?;

        info!(
            target: "ferry::export",
            scope = %scope,
            file = %archive.filename,
            records = archive.manifest.record_count(),
            bytes = archive.compressed_bytes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Export complete"
        );
        Ok(archive)
    }
}
