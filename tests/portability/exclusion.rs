//! Mutual exclusion: one operation per scope, never queued.

use crate::common::*;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

#[test]
fn concurrent_restores_of_one_tenant() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let bytes = Arc::new(export_tenant(
        &service(scenario_store("acme"), &dir),
        "acme",
    ));

    let target = Arc::new(MemoryStore::new());
    let gated = Arc::new(GatedStore::new(target.clone()));
    let svc = service(gated.clone(), &dir);

    let first = {
        let svc = svc.clone();
        let bytes = Arc::clone(&bytes);
        thread::spawn(move || svc.restore_bytes(&bytes, &RestoreOptions::default()))
    };

    // First restore holds the tenant lock and is parked in begin_transaction
    gated.entered.wait();
    let err = svc
        .restore_bytes(&bytes, &RestoreOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConflictFailure);
    assert!(err.is_retryable());
    assert_eq!(target.total_rows(), 0);

    gated.release.wait();
    let report = first.join().unwrap().unwrap();
    assert_eq!(report.state, RestoreState::Committed);
    assert_eq!(target.count(EntityType::Pages), 5);
    assert_eq!(target.commit_count(), 1);
    assert_eq!(svc.locks().held_count(), 0);
}

#[test]
fn other_tenants_proceed_while_one_is_held() {
    let dir = TempDir::new().unwrap();
    let source = MemoryStore::new();
    load_scenario(&source, "acme");
    load_scenario(&source, "globex");
    let source_svc = service(Arc::new(source), &dir);
    let acme = Arc::new(export_tenant(&source_svc, "acme"));
    let globex = export_tenant(&source_svc, "globex");

    let target = Arc::new(MemoryStore::new());
    let gated = Arc::new(GatedStore::new(target.clone()));
    let svc = service(gated.clone(), &dir);

    let first = {
        let svc = svc.clone();
        let acme = Arc::clone(&acme);
        thread::spawn(move || svc.restore_bytes(&acme, &RestoreOptions::default()))
    };
    gated.entered.wait();

    // A different tenant is independent
    svc.restore_bytes(&globex, &RestoreOptions::default())
        .unwrap();

    // A global operation needs every tenant free
    let err = svc
        .export(&ExportSpec::global(), &TenantId::new("globex"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConflictFailure);

    gated.release.wait();
    first.join().unwrap().unwrap();
    assert_eq!(target.count(EntityType::Organizations), 2);
}

#[test]
fn export_blocked_while_restore_holds_tenant() {
    let dir = TempDir::new().unwrap();
    let store = scenario_store("acme");
    let bytes = Arc::new(export_tenant(&service(store.clone(), &dir), "acme"));

    let gated = Arc::new(GatedStore::new(store.clone()));
    let svc = service(gated.clone(), &dir);

    let restore = {
        let svc = svc.clone();
        let bytes = Arc::clone(&bytes);
        thread::spawn(move || {
            svc.restore_bytes(&bytes, &RestoreOptions::tenant(RestoreMode::Merge))
        })
    };
    gated.entered.wait();

    let err = svc
        .export(&ExportSpec::tenant(), &TenantId::new("acme"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConflictFailure);

    gated.release.wait();
    restore.join().unwrap().unwrap();

    // Released: the export now succeeds
    svc.export(&ExportSpec::tenant(), &TenantId::new("acme"))
        .unwrap();
}

#[test]
fn services_sharing_a_lock_table_exclude_each_other() {
    let dir = TempDir::new().unwrap();
    let locks = ScopeLocks::new();
    let primary = service(scenario_store("acme"), &dir).with_locks(locks.clone());
    let replica = service(scenario_store("acme"), &dir).with_locks(locks.clone());

    let held = primary.locks().try_acquire(&TenantScope::tenant("acme")).unwrap();
    let err = replica
        .export(&ExportSpec::tenant(), &TenantId::new("acme"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConflictFailure);

    drop(held);
    replica
        .export(&ExportSpec::tenant(), &TenantId::new("acme"))
        .unwrap();
    assert_eq!(locks.held_count(), 0);
}
