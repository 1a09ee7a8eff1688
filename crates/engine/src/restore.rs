//! Restore Orchestrator
//!
//! Applies a validated archive to a store inside one transaction.
//!
//! ```text
//! Validating ──► Ordering ──► Transacting ──► Committed
//!     │                            │
//!     └──────────► RolledBack ◄────┘
//! ```
//!
//! `Validating` never opens a transaction. Any failure in `Transacting`
//! (rejected record, unmapped reference, deadline, commit error) rolls the
//! whole transaction back. `Committed` triggers one best-effort reindex
//! request whose failure is only logged.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ferry_concurrency::Deadline;
use ferry_core::{
    EntityType, FerryError, FerryResult, RecordId, RestoreMode, SearchIndexer, Store,
    StoreTransaction, TenantId, TenantScope,
};
use ferry_durability::{EntityRecordSet, ScopeKind, ValidatedArchive};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::graph;
use crate::handlers::{ArchiveIndex, EntityHandler};
use crate::remap::IdMap;

/// Phase of one restore operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreState {
    /// Checking scope, identifiers and references
    Validating,
    /// Sorting record sets into dependency order
    Ordering,
    /// Writing inside the store transaction
    Transacting,
    /// Transaction committed
    Committed,
    /// Nothing was written
    RolledBack,
}

impl RestoreState {
    fn can_advance_to(self, next: RestoreState) -> bool {
        use RestoreState::*;
        matches!(
            (self, next),
            (Validating, Ordering)
                | (Validating, RolledBack)
                | (Ordering, Transacting)
                | (Transacting, Committed)
                | (Transacting, RolledBack)
        )
    }
}

/// Restore request options
///
/// JSON shape: `{"mode": "replace" | "merge", "scope": "tenant" | "global"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestoreOptions {
    /// Fresh identifiers (replace) or upsert by original identifier (merge)
    #[serde(default)]
    pub mode: RestoreMode,
    /// Restore one tenant or the whole archive
    #[serde(default = "default_scope")]
    pub scope: ScopeKind,
}

fn default_scope() -> ScopeKind {
    ScopeKind::Tenant
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            mode: RestoreMode::default(),
            scope: default_scope(),
        }
    }
}

impl RestoreOptions {
    /// Tenant restore in `mode`
    pub fn tenant(mode: RestoreMode) -> Self {
        Self {
            mode,
            scope: ScopeKind::Tenant,
        }
    }

    /// Global restore in `mode`
    pub fn global(mode: RestoreMode) -> Self {
        Self {
            mode,
            scope: ScopeKind::Global,
        }
    }

    /// Parse request options; an empty body means defaults
    ///
    /// # Errors
    ///
    /// Returns an invalid request error for malformed JSON or unknown fields.
    pub fn from_json(body: &[u8]) -> FerryResult<Self> {
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| FerryError::invalid_request(format!("restore options: {}", e)))
    }
}

/// Records restored for one entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityCount {
    /// Entity type
    pub entity: EntityType,
    /// Rows written
    pub records: u64,
}

/// Outcome of a committed restore
#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    /// Scope written (the new tenant identifier after a replace restore)
    pub scope: TenantScope,
    /// Mode used
    pub mode: RestoreMode,
    /// Final state
    pub state: RestoreState,
    /// Rows written per entity type, in restore order
    pub entities: Vec<EntityCount>,
    /// Unknown optional entity types skipped by the reader
    pub skipped: Vec<String>,
    /// Whether the search indexer accepted the reindex request
    pub reindexed: bool,
    /// Wall-clock duration of the restore
    pub elapsed_ms: u64,
}

impl RestoreReport {
    /// Rows written for an entity type
    pub fn count(&self, entity: EntityType) -> u64 {
        self.entities
            .iter()
            .find(|c| c.entity == entity)
            .map_or(0, |c| c.records)
    }

    /// Rows written in total
    pub fn total(&self) -> u64 {
        self.entities.iter().map(|c| c.records).sum()
    }
}

struct Progress {
    state: RestoreState,
}

impl Progress {
    fn advance(&mut self, next: RestoreState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal restore transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(target: "ferry::restore", from = ?self.state, to = ?next, "Restore state");
        self.state = next;
    }
}

/// Applies validated archives to a store
pub struct RestoreOrchestrator<'a> {
    store: &'a dyn Store,
    indexer: &'a dyn SearchIndexer,
    timeout: Duration,
}

impl<'a> RestoreOrchestrator<'a> {
    /// Orchestrator writing to `store`, bounded by `timeout` per transaction
    pub fn new(store: &'a dyn Store, indexer: &'a dyn SearchIndexer, timeout: Duration) -> Self {
        Self {
            store,
            indexer,
            timeout,
        }
    }

    /// Scope a restore of `archive` with `options` locks
    ///
    /// A tenant restore needs exactly one organization in the archive and
    /// no instance-wide entity types.
    ///
    /// # Errors
    ///
    /// Returns an invalid request error when the archive does not fit a
    /// tenant restore, or a missing entity failure when it has no tenant.
    pub fn lock_scope(
        archive: &ValidatedArchive,
        options: &RestoreOptions,
    ) -> FerryResult<TenantScope> {
        if options.scope == ScopeKind::Global {
            return Ok(TenantScope::Global);
        }

        if let Some(set) = archive
            .record_sets
            .iter()
            .find(|s| s.entity.is_global_only())
        {
            return Err(FerryError::invalid_request(format!(
                "archive contains instance-wide {}; use a global restore",
                set.entity
            )));
        }

        let orgs = archive
            .record_set(EntityType::Organizations)
            .map_or(&[][..], |s| s.records.as_slice());
        match orgs {
            [org] => Ok(TenantScope::Tenant(TenantId::new(org.id.as_str()))),
            [] => Err(FerryError::missing_entity(
                EntityType::Organizations,
                "archive holds no organization",
            )),
            many => Err(FerryError::invalid_request(format!(
                "archive spans {} tenants; use a global restore",
                many.len()
            ))),
        }
    }

    /// Restore `archive` and report per-entity counts
    ///
    /// # Errors
    ///
    /// Validation failures, rejected records (with entity type and index),
    /// deadline expiry and store commit failures. On every error the store
    /// is left as it was.
    pub fn restore(
        &self,
        archive: &ValidatedArchive,
        options: &RestoreOptions,
    ) -> FerryResult<RestoreReport> {
        let started = Instant::now();
        let deadline = Deadline::after(self.timeout);
        let mut progress = Progress {
            state: RestoreState::Validating,
        };

        info!(
            target: "ferry::restore",
            mode = %options.mode,
            entities = archive.record_sets.len(),
            records = archive.record_count(),
            "Restore started"
        );

        let scope = match Self::validate(archive, options) {
            Ok(scope) => scope,
            Err(e) => {
                progress.advance(RestoreState::RolledBack);
                warn!(target: "ferry::restore", error = %e, "Restore rejected during validation");
                return Err(e);
            }
        };

        progress.advance(RestoreState::Ordering);
        let mut plan: Vec<&EntityRecordSet> = archive.record_sets.iter().collect();
        plan.sort_by_key(|s| graph::rank(s.entity));

        if let (TenantScope::Tenant(tenant), RestoreMode::Merge) = (&scope, options.mode) {
            if let Err(e) = self.check_ownership(&plan, tenant) {
                progress.advance(RestoreState::RolledBack);
                warn!(target: "ferry::restore", scope = %scope, error = %e, "Restore rejected before transaction");
                return Err(e);
            }
        }

        progress.advance(RestoreState::Transacting);
        let (entities, ids) = match self.transact(&plan, options.mode, &deadline) {
            Ok(done) => done,
            Err(e) => {
                progress.advance(RestoreState::RolledBack);
                warn!(target: "ferry::restore", scope = %scope, error = %e, "Restore rolled back");
                return Err(e);
            }
        };
        progress.advance(RestoreState::Committed);

        let scope = match (&scope, options.mode) {
            (TenantScope::Tenant(tenant), RestoreMode::Replace) => ids
                .get(EntityType::Organizations, &tenant.as_record_id())
                .map(|id| TenantScope::tenant(id.as_str()))
                .unwrap_or(scope),
            _ => scope,
        };

        let reindexed = match self.indexer.reindex(&scope) {
            Ok(()) => true,
            Err(reason) => {
                warn!(
                    target: "ferry::restore",
                    scope = %scope,
                    reason = %reason,
                    "Reindex request failed; restore stays committed"
                );
                false
            }
        };

        let report = RestoreReport {
            scope,
            mode: options.mode,
            state: progress.state,
            entities,
            skipped: archive.skipped.clone(),
            reindexed,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            target: "ferry::restore",
            scope = %report.scope,
            records = report.total(),
            elapsed_ms = report.elapsed_ms,
            "Restore committed"
        );
        Ok(report)
    }

    /// Scope compatibility, identifier uniqueness and referential integrity
    fn validate(archive: &ValidatedArchive, options: &RestoreOptions) -> FerryResult<TenantScope> {
        let scope = Self::lock_scope(archive, options)?;

        let mut index = ArchiveIndex::default();
        for set in &archive.record_sets {
            index.add(set.entity, &set.records)?;
        }

        for set in &archive.record_sets {
            let handler = EntityHandler::for_type(set.entity);
            for (i, record) in set.records.iter().enumerate() {
                handler.validate(i, record, &index)?;
            }
        }
        Ok(scope)
    }

    /// Merge into `tenant` may only overwrite rows `tenant` already owns
    fn check_ownership(&self, plan: &[&EntityRecordSet], tenant: &TenantId) -> FerryResult<()> {
        let own = tenant.as_record_id();
        for set in plan {
            let entity = set.entity;
            let existing: HashMap<RecordId, Option<RecordId>> = self
                .store
                .read_all(entity, &TenantScope::Global)
                .map_err(|e| FerryError::Read {
                    entity,
                    reason: e.to_string(),
                })?
                .into_iter()
                .map(|row| {
                    let owner = match entity {
                        EntityType::Organizations => Some(row.id.clone()),
                        _ => row.org_ref().cloned(),
                    };
                    (row.id, owner)
                })
                .collect();

            for (index, record) in set.records.iter().enumerate() {
                match existing.get(&record.id) {
                    Some(Some(owner)) if *owner == own => {}
                    Some(owner) => {
                        return Err(FerryError::constraint(
                            entity,
                            index,
                            format!(
                                "id {} already belongs to {}",
                                record.id,
                                owner.as_ref().map_or("the instance", |o| o.as_str())
                            ),
                        ));
                    }
                    None => {}
                }
            }
        }
        Ok(())
    }

    /// Write every record in `plan` order, then commit
    fn transact(
        &self,
        plan: &[&EntityRecordSet],
        mode: RestoreMode,
        deadline: &Deadline,
    ) -> FerryResult<(Vec<EntityCount>, IdMap)> {
        let mut txn = self
            .store
            .begin_transaction()
            .map_err(|e| FerryError::write(format!("begin transaction: {}", e)))?;

        let mut ids = IdMap::new();
        match Self::apply(txn.as_mut(), plan, mode, deadline, &mut ids) {
            Ok(counts) => {
                txn.commit()
                    .map_err(|e| FerryError::write(format!("commit: {}", e)))?;
                Ok((counts, ids))
            }
            Err(e) => {
                if let Err(rollback) = txn.rollback() {
                    warn!(target: "ferry::restore", error = %rollback, "Rollback reported an error");
                }
                Err(e)
            }
        }
    }

    fn apply(
        txn: &mut dyn StoreTransaction,
        plan: &[&EntityRecordSet],
        mode: RestoreMode,
        deadline: &Deadline,
        ids: &mut IdMap,
    ) -> FerryResult<Vec<EntityCount>> {
        let mut counts = Vec::with_capacity(plan.len());

        for set in plan {
            let entity = set.entity;
            let handler = EntityHandler::for_type(entity);

            for (index, record) in set.records.iter().enumerate() {
                deadline.check()?;
                let row = handler.restore(index, record, mode, ids)?;
                txn.upsert(entity, row)
                    .map_err(|e| FerryError::constraint(entity, index, e.to_string()))?;
            }

            debug!(
                target: "ferry::restore",
                entity = %entity,
                records = set.len(),
                "Entity restored"
            );
            counts.push(EntityCount {
                entity,
                records: set.len() as u64,
            });
        }

        deadline.check()?;
        Ok(counts)
    }
}
