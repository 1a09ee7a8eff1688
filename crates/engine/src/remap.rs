//! Identifier remapping for replace-mode restores
//!
//! One [`IdMap`] lives for exactly one restore and is passed through the
//! ordered restore steps. It is never shared, so concurrent restores of
//! different tenants cannot contend on it.

use std::collections::HashMap;

use ferry_core::{EntityType, Record, RecordId};

/// Per-restore mapping `(entity type, archived id) → stored id`
#[derive(Debug, Default)]
pub struct IdMap {
    map: HashMap<(EntityType, RecordId), RecordId>,
}

impl IdMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh identifier for an archived record
    ///
    /// Asking twice for the same record returns the same identifier.
    pub fn assign(&mut self, entity: EntityType, old: &RecordId) -> RecordId {
        self.map
            .entry((entity, old.clone()))
            .or_insert_with(RecordId::generate)
            .clone()
    }

    /// Record that an archived identifier is stored unchanged
    pub fn keep(&mut self, entity: EntityType, id: &RecordId) {
        self.map.insert((entity, id.clone()), id.clone());
    }

    /// Stored identifier of an archived record, if it was restored
    pub fn get(&self, entity: EntityType, old: &RecordId) -> Option<&RecordId> {
        self.map.get(&(entity, old.clone()))
    }

    /// Number of mapped identifiers
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when nothing has been mapped
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Point every declared reference of `record` at the parent's stored id
    ///
    /// Parents are restored first, so a reference without a mapping is an
    /// ordering or archive error and is reported, never left dangling.
    pub fn rewrite_refs(&self, entity: EntityType, record: &mut Record) -> Result<(), String> {
        for key in entity.foreign_keys() {
            let Some(target) = record.refs.get_mut(key.field) else {
                continue;
            };
            match self.get(key.parent, target) {
                Some(new_id) => *target = new_id.clone(),
                None => {
                    return Err(format!(
                        "reference {} -> {}:{} has not been restored",
                        key.field, key.parent, target
                    ))
                }
            }
        }
        Ok(())
    }
}
