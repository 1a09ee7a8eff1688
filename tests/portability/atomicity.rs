//! All-or-nothing restores: any failure leaves the store untouched.

use crate::common::*;
use ferry::StoreError;
use ferry_storage::testing::FaultPoint;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn archive() -> (TempDir, Vec<u8>) {
    let dir = TempDir::new().unwrap();
    let bytes = export_tenant(&service(scenario_store("acme"), &dir), "acme");
    (dir, bytes)
}

#[test]
fn fault_on_last_record_commits_nothing() {
    init_tracing();
    let (dir, bytes) = archive();
    let target = Arc::new(MemoryStore::new());
    // Pages are restored last; the scenario has five
    target.inject(FaultPoint::Upsert {
        entity: EntityType::Pages,
        index: 4,
    });

    let err = service(target.clone(), &dir)
        .restore_bytes(&bytes, &RestoreOptions::default())
        .unwrap_err();

    match err {
        FerryError::Constraint { entity, index, .. } => {
            assert_eq!(entity, EntityType::Pages);
            assert_eq!(index, 4);
        }
        other => panic!("expected constraint failure, got {}", other),
    }
    assert_eq!(target.total_rows(), 0);
    assert_eq!(target.commit_count(), 0);
}

#[test]
fn failed_merge_leaves_existing_rows_untouched() {
    let dir = TempDir::new().unwrap();
    let store = scenario_store("acme");
    let svc = service(store.clone(), &dir);
    let bytes = export_tenant(&svc, "acme");
    let before = store.snapshot();

    store.inject(FaultPoint::Upsert {
        entity: EntityType::Documents,
        index: 2,
    });
    let err = svc
        .restore_bytes(&bytes, &RestoreOptions::tenant(RestoreMode::Merge))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintFailure);
    assert_eq!(store.snapshot(), before);
}

#[test]
fn commit_failure_commits_nothing() {
    let (dir, bytes) = archive();
    let target = Arc::new(MemoryStore::new());
    target.inject(FaultPoint::Commit);

    let err = service(target.clone(), &dir)
        .restore_bytes(&bytes, &RestoreOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WriteFailure);
    assert_eq!(target.total_rows(), 0);

    // The failure was one-shot and the lock was released: a retry succeeds
    service(target.clone(), &dir)
        .restore_bytes(&bytes, &RestoreOptions::default())
        .unwrap();
    assert_eq!(target.count(EntityType::Pages), 5);
}

/// Store that refuses to open transactions.
struct ReadOnlyStore(MemoryStore);

impl Store for ReadOnlyStore {
    fn read_all(
        &self,
        entity: EntityType,
        scope: &TenantScope,
    ) -> Result<Vec<Record>, StoreError> {
        self.0.read_all(entity, scope)
    }

    fn begin_transaction(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
        Err(StoreError::unavailable("read-only replica"))
    }
}

#[test]
fn begin_failure_is_write_failure() {
    let (dir, bytes) = archive();
    let err = service(Arc::new(ReadOnlyStore(MemoryStore::new())), &dir)
        .restore_bytes(&bytes, &RestoreOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WriteFailure);
    assert!(err.to_string().contains("read-only replica"));
}

#[test]
fn deadline_rolls_back_and_is_retryable() {
    let (_dir, bytes) = archive();
    let target = MemoryStore::new();
    let archive = ArchiveReader::from_bytes(&bytes).unwrap();

    let err = ferry_engine::RestoreOrchestrator::new(&target, &NoopIndexer, Duration::ZERO)
        .restore(&archive, &RestoreOptions::default())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TimeoutFailure);
    assert!(err.is_retryable());
    assert_eq!(target.total_rows(), 0);
}
