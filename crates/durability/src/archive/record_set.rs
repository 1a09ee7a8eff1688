//! Per-entity payload of an archive
//!
//! Each present entity type is stored as one JSON document under
//! `ferry/records/<entity>.json`:
//!
//! ```text
//! {
//!   "entity": "pages",
//!   "schema_version": 1,
//!   "records": [ { "id": "...", "refs": {...}, "fields": {...} }, ... ]
//! }
//! ```
//!
//! Records are sorted by original identifier so the same data always encodes
//! to the same bytes (and therefore the same checksum).

use ferry_core::{EntityType, Record, TenantId};
use serde::{Deserialize, Serialize};

use crate::archive::error::ArchiveResult;

/// All records of one entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecordSet {
    /// Entity type of every record in the set
    pub entity: EntityType,
    /// Record layout version
    pub schema_version: u32,
    /// Records, ordered by id
    pub records: Vec<Record>,
}

/// Organization ids carried by `sets`, sorted
pub fn tenants_in(sets: &[EntityRecordSet]) -> Vec<TenantId> {
    let mut tenants: Vec<TenantId> = sets
        .iter()
        .filter(|s| s.entity == EntityType::Organizations)
        .flat_map(|s| s.records.iter().map(|r| TenantId::new(r.id.as_str())))
        .collect();
    tenants.sort();
    tenants
}

/// Payload header only, used to look at the version before trusting the layout
#[derive(Deserialize)]
struct PayloadHeader {
    schema_version: u32,
}

impl EntityRecordSet {
    /// Record set at the current schema version, sorted by id
    pub fn new(entity: EntityType, mut records: Vec<Record>) -> Self {
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            entity,
            schema_version: entity.schema().version,
            records,
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the set holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Encode to payload bytes
    pub fn encode(&self) -> ArchiveResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode payload bytes
    pub fn decode(data: &[u8]) -> ArchiveResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Read only the schema version of a payload
    pub fn peek_schema_version(data: &[u8]) -> ArchiveResult<u32> {
        let header: PayloadHeader = serde_json::from_slice(data)?;
        Ok(header.schema_version)
    }
}
