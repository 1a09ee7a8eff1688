//! Core types for Ferry
//!
//! This module defines the foundational types:
//! - TenantId: Identifier of one organization (tenant)
//! - RecordId: Identifier of one row of any entity type
//! - TenantScope: Boundary an export/restore operates on
//! - RestoreMode: Replace (fresh identifiers) or Merge (upsert by identifier)
//! - Record: One row with explicit identifier, references and data fields

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Name of the reference field every tenant-owned record carries
pub const ORG_REF: &str = "org_id";

/// Identifier of a single row
///
/// Identifiers are opaque strings. Archives carry them verbatim so that
/// restore can either keep them (merge) or remap them (replace).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier (UUID v4, simple form)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a tenant (the id of its organization record)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Wrap an existing tenant identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The organization record id this tenant corresponds to
    pub fn as_record_id(&self) -> RecordId {
        RecordId::new(self.0.clone())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Organizational boundary an operation applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "tenant", rename_all = "snake_case")]
pub enum TenantScope {
    /// A single organization and everything it owns
    Tenant(TenantId),
    /// The entire deployment, including instance-wide settings
    Global,
}

impl TenantScope {
    /// Scope for one tenant
    pub fn tenant(id: impl Into<String>) -> Self {
        TenantScope::Tenant(TenantId::new(id))
    }

    /// True for the deployment-wide scope
    pub fn is_global(&self) -> bool {
        matches!(self, TenantScope::Global)
    }

    /// Tenant identifier for tenant scopes
    pub fn tenant_id(&self) -> Option<&TenantId> {
        match self {
            TenantScope::Tenant(id) => Some(id),
            TenantScope::Global => None,
        }
    }

    /// Short label used in logs and archive names
    pub fn label(&self) -> String {
        match self {
            TenantScope::Tenant(id) => format!("tenant-{}", id),
            TenantScope::Global => "global".to_string(),
        }
    }
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantScope::Tenant(id) => write!(f, "tenant:{}", id),
            TenantScope::Global => f.write_str("global"),
        }
    }
}

/// How restored records are written to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RestoreMode {
    /// Archive is the sole source of truth; every record gets a new identifier
    #[default]
    Replace,
    /// Upsert by original identifier into the existing dataset
    Merge,
}

impl RestoreMode {
    /// Lowercase name as used in requests and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreMode::Replace => "replace",
            RestoreMode::Merge => "merge",
        }
    }
}

impl fmt::Display for RestoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of an entity type
///
/// Foreign keys live in `refs` as named fields, never as positional
/// references. An absent optional reference is an absent key; `refs`
/// never holds nulls. Everything else is carried opaquely in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Original identifier
    pub id: RecordId,

    /// Foreign-key fields: field name → referenced identifier
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub refs: BTreeMap<String, RecordId>,

    /// Data fields, carried verbatim
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl Record {
    /// Create a record with no references or fields
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            refs: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder: add a foreign-key reference
    pub fn with_ref(mut self, field: impl Into<String>, target: impl Into<RecordId>) -> Self {
        self.refs.insert(field.into(), target.into());
        self
    }

    /// Builder: add a data field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Referenced identifier for a foreign-key field
    pub fn reference(&self, field: &str) -> Option<&RecordId> {
        self.refs.get(field)
    }

    /// Owning organization, if this record is tenant-owned
    pub fn org_ref(&self) -> Option<&RecordId> {
        self.refs.get(ORG_REF)
    }

    /// Data field value
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&RecordId> for RecordId {
    fn from(id: &RecordId) -> Self {
        id.clone()
    }
}
