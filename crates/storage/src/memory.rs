//! MemoryStore: in-memory transactional store
//!
//! This module implements the Store trait using:
//! - `BTreeMap<EntityType, BTreeMap<RecordId, Record>>` for ordered rows
//! - `parking_lot::RwLock` for thread-safe access
//! - Per-transaction staging maps that become visible only on commit
//!
//! # Constraints
//!
//! Every upsert is checked against the transaction's view (staged rows
//! overlaid on committed rows):
//! - Required foreign keys must be present
//! - Every foreign key must resolve to an existing parent row
//! - Required data fields must be present and non-null
//! - Unique fields must not collide within the owning organization
//!   (instance-wide for types without an `org_id`)

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use ferry_core::{
    EntityType, Record, RecordId, Store, StoreError, StoreResult, StoreTransaction, TenantScope,
};

use crate::testing::{FaultPlan, FaultPoint};

type Table = BTreeMap<RecordId, Record>;

/// Full copy of the committed rows, for equality checks in tests
pub type StoreSnapshot = BTreeMap<EntityType, Table>;

/// In-memory store with transactional writes and constraint enforcement
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Committed rows per entity type
    data: RwLock<BTreeMap<EntityType, Table>>,
    /// Armed failure injection points
    faults: Mutex<FaultPlan>,
    /// Number of committed transactions
    commits: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot failure
    pub fn inject(&self, point: FaultPoint) {
        self.faults.lock().arm(point);
    }

    /// Disarm all failures
    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Write `records` of one entity type in a single committed transaction
    pub fn load(
        &self,
        entity: EntityType,
        records: impl IntoIterator<Item = Record>,
    ) -> StoreResult<()> {
        let mut txn = self.begin_transaction()?;
        for record in records {
            txn.upsert(entity, record)?;
        }
        txn.commit()
    }

    /// Committed row by identifier
    pub fn get(&self, entity: EntityType, id: &RecordId) -> Option<Record> {
        self.data
            .read()
            .get(&entity)
            .and_then(|table| table.get(id))
            .cloned()
    }

    /// Committed rows of one type, ordered by identifier
    pub fn records(&self, entity: EntityType) -> Vec<Record> {
        self.data
            .read()
            .get(&entity)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of committed rows of one type
    pub fn count(&self, entity: EntityType) -> usize {
        self.data.read().get(&entity).map_or(0, |table| table.len())
    }

    /// Number of committed rows across all types
    pub fn total_rows(&self) -> usize {
        self.data.read().values().map(|table| table.len()).sum()
    }

    /// Number of committed transactions so far
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Copy of all committed rows
    pub fn snapshot(&self) -> StoreSnapshot {
        self.data.read().clone()
    }

    fn fire(&self, point: FaultPoint) -> bool {
        self.faults.lock().take(point)
    }
}

/// Whether `record` of `entity` is visible in `scope`
fn in_scope(entity: EntityType, record: &Record, scope: &TenantScope) -> bool {
    match scope {
        TenantScope::Global => true,
        TenantScope::Tenant(tenant) => {
            if entity.is_global_only() {
                false
            } else if entity == EntityType::Organizations {
                record.id.as_str() == tenant.as_str()
            } else {
                record.org_ref().map(|id| id.as_str()) == Some(tenant.as_str())
            }
        }
    }
}

impl Store for MemoryStore {
    fn read_all(&self, entity: EntityType, scope: &TenantScope) -> StoreResult<Vec<Record>> {
        if self.fire(FaultPoint::Read(entity)) {
            return Err(StoreError::unavailable(FaultPoint::Read(entity).message()));
        }

        let data = self.data.read();
        let rows = data
            .get(&entity)
            .map(|table| {
                table
                    .values()
                    .filter(|record| in_scope(entity, record, scope))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    fn begin_transaction(&self) -> StoreResult<Box<dyn StoreTransaction + '_>> {
        Ok(Box::new(MemoryTransaction {
            store: self,
            staged: BTreeMap::new(),
            upserts: BTreeMap::new(),
        }))
    }
}

/// Open transaction on a [`MemoryStore`]
///
/// Writes are staged locally; dropping without commit discards them.
pub struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    staged: BTreeMap<EntityType, Table>,
    /// Upserts seen per entity type, for fault positions
    upserts: BTreeMap<EntityType, usize>,
}

impl<'a> MemoryTransaction<'a> {
    fn exists(&self, committed: &BTreeMap<EntityType, Table>, entity: EntityType, id: &RecordId) -> bool {
        self.staged
            .get(&entity)
            .map_or(false, |table| table.contains_key(id))
            || committed
                .get(&entity)
                .map_or(false, |table| table.contains_key(id))
    }

    /// Rows of `entity` as seen by this transaction
    fn view<'b>(
        &'b self,
        committed: &'b BTreeMap<EntityType, Table>,
        entity: EntityType,
    ) -> impl Iterator<Item = &'b Record> + 'b {
        let staged = self.staged.get(&entity);
        let base = committed
            .get(&entity)
            .into_iter()
            .flat_map(|table| table.values())
            .filter(move |record| staged.map_or(true, |s| !s.contains_key(&record.id)));
        base.chain(staged.into_iter().flat_map(|table| table.values()))
    }

    fn check(
        &self,
        committed: &BTreeMap<EntityType, Table>,
        entity: EntityType,
        record: &Record,
    ) -> StoreResult<()> {
        let schema = entity.schema();

        for key in schema.foreign_keys {
            match record.reference(key.field) {
                Some(target) => {
                    if !self.exists(committed, key.parent, target) {
                        return Err(StoreError::UnresolvedReference {
                            field: key.field.to_string(),
                            parent: key.parent,
                            target: target.to_string(),
                        });
                    }
                }
                None if key.required => {
                    return Err(StoreError::constraint(format!(
                        "{}.{} is required",
                        entity, key.field
                    )));
                }
                None => {}
            }
        }

        for field in schema.required_fields {
            if record.field(field).map_or(true, |v| v.is_null()) {
                return Err(StoreError::constraint(format!(
                    "{}.{} must not be null",
                    entity, field
                )));
            }
        }

        for field in schema.unique_fields {
            let value = match record.field(field) {
                Some(value) if !value.is_null() => value,
                _ => continue,
            };
            let collision = self.view(committed, entity).any(|other| {
                other.id != record.id
                    && other.org_ref() == record.org_ref()
                    && other.field(field) == Some(value)
            });
            if collision {
                return Err(StoreError::Duplicate {
                    field: field.to_string(),
                    value: value.to_string(),
                });
            }
        }

        Ok(())
    }
}

impl<'a> StoreTransaction for MemoryTransaction<'a> {
    fn upsert(&mut self, entity: EntityType, record: Record) -> StoreResult<()> {
        let counter = self.upserts.entry(entity).or_insert(0);
        let index = *counter;
        *counter += 1;

        let point = FaultPoint::Upsert { entity, index };
        if self.store.fire(point) {
            return Err(StoreError::constraint(point.message()));
        }

        {
            let committed = self.store.data.read();
            self.check(&committed, entity, &record)?;
        }

        self.staged
            .entry(entity)
            .or_default()
            .insert(record.id.clone(), record);
        Ok(())
    }

    fn commit(self: Box<Self>) -> StoreResult<()> {
        if self.store.fire(FaultPoint::Commit) {
            return Err(StoreError::constraint(FaultPoint::Commit.message()));
        }

        let MemoryTransaction { store, staged, .. } = *self;
        let rows: usize = staged.values().map(|t| t.len()).sum();
        let mut data = store.data.write();
        for (entity, table) in staged {
            data.entry(entity).or_default().extend(table);
        }
        drop(data);

        store.commits.fetch_add(1, Ordering::SeqCst);
        debug!(target: "ferry::store", rows, "Transaction committed");
        Ok(())
    }

    fn rollback(self: Box<Self>) -> StoreResult<()> {
        let rows: usize = self.staged.values().map(|t| t.len()).sum();
        debug!(target: "ferry::store", rows, "Transaction rolled back");
        Ok(())
    }
}
