//! Entity Serializer
//!
//! Turns the rows of a scope into one [`EntityRecordSet`] per entity type,
//! in the order it is given. Records are copied verbatim: identifiers,
//! references and fields are never transformed.

use std::time::Instant;

use ferry_core::{EntityType, FerryResult, Store, TenantScope};
use ferry_durability::EntityRecordSet;
use tracing::debug;

use crate::handlers::EntityHandler;

/// Reads record sets out of a store
pub struct EntitySerializer<'a> {
    store: &'a dyn Store,
}

impl<'a> EntitySerializer<'a> {
    /// Serializer over `store`
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Serialize `order` for `scope`
    ///
    /// Types outside the scope and types with no rows are left out. Output
    /// is all-or-nothing: on the first read failure nothing is returned.
    ///
    /// # Errors
    ///
    /// Returns a read failure naming the entity type whose read failed.
    pub fn serialize(
        &self,
        scope: &TenantScope,
        order: &[EntityType],
    ) -> FerryResult<Vec<EntityRecordSet>> {
        let started = Instant::now();
        let mut sets = Vec::with_capacity(order.len());

        for &entity in order {
            let handler = EntityHandler::for_type(entity);
            if !handler.in_scope(scope) {
                debug!(target: "ferry::export", entity = %entity, scope = %scope, "Out of scope");
                continue;
            }

            let records = handler.serialize(self.store, scope)?;
            debug!(
                target: "ferry::export",
                entity = %entity,
                records = records.len(),
                "Serialized"
            );
            if records.is_empty() {
                continue;
            }
            sets.push(EntityRecordSet::new(entity, records));
        }

        debug!(
            target: "ferry::export",
            scope = %scope,
            entities = sets.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Serialization complete"
        );
        Ok(sets)
    }
}
