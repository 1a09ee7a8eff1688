//! Per-entity-type handlers
//!
//! The set of entity types is closed, so their behaviour is a closed set of
//! handler variants rather than open dynamic dispatch. Every variant offers
//! the same three capabilities:
//!
//! - `serialize`: read the rows of one type that belong to a scope
//! - `validate`: check one archived record before any transaction opens
//! - `restore`: turn an archived record into the row to upsert
//!
//! | handler        | types                         | replace-mode identifiers |
//! |----------------|-------------------------------|--------------------------|
//! | `Organization` | organizations                 | fresh                    |
//! | `Owned`        | every type with an `org_id`   | fresh, refs rewritten    |
//! | `Instance`     | global-only types (config)    | kept (keyed by `key`)    |

use std::collections::{HashMap, HashSet};

use ferry_core::{
    EntityType, FerryError, FerryResult, Record, RecordId, RestoreMode, Store, TenantScope,
};

use crate::remap::IdMap;

/// Identifiers present in an archive, per entity type
///
/// Built once before validation so every reference can be resolved
/// against the archive itself.
#[derive(Debug, Default)]
pub struct ArchiveIndex {
    ids: HashMap<EntityType, HashSet<RecordId>>,
}

impl ArchiveIndex {
    /// Register the records of one type
    ///
    /// # Errors
    ///
    /// Fails with a constraint failure on a repeated identifier.
    pub fn add(&mut self, entity: EntityType, records: &[Record]) -> FerryResult<()> {
        let ids = self.ids.entry(entity).or_default();
        for (index, record) in records.iter().enumerate() {
            if !ids.insert(record.id.clone()) {
                return Err(FerryError::constraint(
                    entity,
                    index,
                    format!("duplicate identifier {}", record.id),
                ));
            }
        }
        Ok(())
    }

    /// Whether the archive holds `id` of `entity`
    pub fn contains(&self, entity: EntityType, id: &RecordId) -> bool {
        self.ids.get(&entity).map_or(false, |ids| ids.contains(id))
    }

    /// Number of records of `entity`
    pub fn count(&self, entity: EntityType) -> usize {
        self.ids.get(&entity).map_or(0, |ids| ids.len())
    }
}

/// Serialize/validate/restore behaviour of one entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityHandler {
    /// Tenants themselves
    Organization,
    /// Rows owned by one organization
    Owned(EntityType),
    /// Instance-wide rows, exported only in global scope
    Instance(EntityType),
}

impl EntityHandler {
    /// Handler for an entity type
    pub fn for_type(entity: EntityType) -> Self {
        if entity == EntityType::Organizations {
            EntityHandler::Organization
        } else if entity.is_global_only() {
            EntityHandler::Instance(entity)
        } else {
            EntityHandler::Owned(entity)
        }
    }

    /// Handler for an archive entity name
    pub fn for_name(name: &str) -> Option<Self> {
        EntityType::from_name(name).map(Self::for_type)
    }

    /// Entity type this handler serves
    pub fn entity(&self) -> EntityType {
        match *self {
            EntityHandler::Organization => EntityType::Organizations,
            EntityHandler::Owned(entity) | EntityHandler::Instance(entity) => entity,
        }
    }

    /// Whether rows of this type belong in an export of `scope`
    pub fn in_scope(&self, scope: &TenantScope) -> bool {
        !matches!((self, scope), (EntityHandler::Instance(_), TenantScope::Tenant(_)))
    }

    /// Read every row of this type that belongs to `scope`
    ///
    /// Records are returned verbatim. Rows the store hands back from other
    /// tenants are dropped.
    ///
    /// # Errors
    ///
    /// Any store error becomes a read failure for this type.
    pub fn serialize(&self, store: &dyn Store, scope: &TenantScope) -> FerryResult<Vec<Record>> {
        let entity = self.entity();
        if !self.in_scope(scope) {
            return Ok(Vec::new());
        }

        let mut records = store
            .read_all(entity, scope)
            .map_err(|e| FerryError::Read {
                entity,
                reason: e.to_string(),
            })?;

        if let TenantScope::Tenant(tenant) = scope {
            let tenant = tenant.as_record_id();
            match self {
                EntityHandler::Organization => records.retain(|r| r.id == tenant),
                EntityHandler::Owned(_) => records.retain(|r| r.org_ref() == Some(&tenant)),
                EntityHandler::Instance(_) => records.clear(),
            }
        }
        Ok(records)
    }

    /// Check one archived record at position `index` of its record set
    ///
    /// # Errors
    ///
    /// Fails with a constraint failure naming the record on an undeclared
    /// or unresolved reference, a missing required reference, or a missing
    /// required field.
    pub fn validate(&self, index: usize, record: &Record, archive: &ArchiveIndex) -> FerryResult<()> {
        let entity = self.entity();
        let schema = entity.schema();

        if record.id.as_str().is_empty() {
            return Err(FerryError::constraint(entity, index, "empty identifier"));
        }

        for field in record.refs.keys() {
            if !schema.foreign_keys.iter().any(|k| k.field == field.as_str()) {
                return Err(FerryError::constraint(
                    entity,
                    index,
                    format!("undeclared reference field {}", field),
                ));
            }
        }

        for key in schema.foreign_keys {
            match record.reference(key.field) {
                Some(target) if !archive.contains(key.parent, target) => {
                    return Err(FerryError::constraint(
                        entity,
                        index,
                        format!(
                            "unresolved reference {} -> {}:{}",
                            key.field, key.parent, target
                        ),
                    ));
                }
                None if key.required => {
                    return Err(FerryError::constraint(
                        entity,
                        index,
                        format!("missing required reference {}", key.field),
                    ));
                }
                _ => {}
            }
        }

        for field in schema.required_fields {
            if record.field(field).map_or(true, |v| v.is_null()) {
                return Err(FerryError::constraint(
                    entity,
                    index,
                    format!("missing required field {}", field),
                ));
            }
        }
        Ok(())
    }

    /// Row to upsert for an archived record
    ///
    /// Merge mode keeps every identifier. Replace mode gives the record a
    /// fresh identifier, recorded in `ids`, and rewrites its references to
    /// the parents' new identifiers; instance rows keep theirs.
    ///
    /// # Errors
    ///
    /// Fails with a constraint failure when a reference points at a parent
    /// that has not been restored.
    pub fn restore(
        &self,
        index: usize,
        record: &Record,
        mode: RestoreMode,
        ids: &mut IdMap,
    ) -> FerryResult<Record> {
        let entity = self.entity();
        match (mode, self) {
            (RestoreMode::Merge, _) => Ok(record.clone()),
            (RestoreMode::Replace, EntityHandler::Instance(_)) => {
                ids.keep(entity, &record.id);
                Ok(record.clone())
            }
            (RestoreMode::Replace, _) => {
                let mut row = record.clone();
                ids.rewrite_refs(entity, &mut row)
                    .map_err(|reason| FerryError::constraint(entity, index, reason))?;
                row.id = ids.assign(entity, &record.id);
                Ok(row)
            }
        }
    }
}
