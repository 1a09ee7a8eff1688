//! Merge mode: upsert by original identifier.

use crate::common::*;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn merge_restore_is_idempotent() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let bytes = export_tenant(&service(scenario_store("acme"), &dir), "acme");

    let target = Arc::new(MemoryStore::new());
    let svc = service(target.clone(), &dir);
    let options = RestoreOptions::tenant(RestoreMode::Merge);

    let first = svc.restore_bytes(&bytes, &options).unwrap();
    let once = target.snapshot();
    let second = svc.restore_bytes(&bytes, &options).unwrap();

    assert_eq!(target.snapshot(), once);
    assert_eq!(first.total(), second.total());
    assert_eq!(first.scope, TenantScope::tenant("acme"));
    assert_eq!(second.scope, TenantScope::tenant("acme"));
}

#[test]
fn merge_overwrites_changed_rows_and_keeps_extra_rows() {
    let dir = TempDir::new().unwrap();
    let store = scenario_store("acme");
    let svc = service(store.clone(), &dir);
    let bytes = export_tenant(&svc, "acme");

    // Edit a page and add a new one after the export
    store
        .load(
            EntityType::Pages,
            [
                page("acme-p1", "acme", "acme-d1", 1).with_field("body", json!("rewritten")),
                page("acme-p6", "acme", "acme-d2", 2),
            ],
        )
        .unwrap();

    svc.restore_bytes(&bytes, &RestoreOptions::tenant(RestoreMode::Merge))
        .unwrap();

    let p1 = store.get(EntityType::Pages, &"acme-p1".into()).unwrap();
    assert_eq!(p1.field("body"), Some(&json!("<p>content of acme-p1</p>")));
    // Merge never deletes
    assert!(store.get(EntityType::Pages, &"acme-p6".into()).is_some());
    assert_eq!(store.count(EntityType::Pages), 6);
}

#[test]
fn merge_into_source_store_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = scenario_store("acme");
    let svc = service(store.clone(), &dir);
    let before = store.snapshot();

    let bytes = export_tenant(&svc, "acme");
    svc.restore_bytes(&bytes, &RestoreOptions::tenant(RestoreMode::Merge))
        .unwrap();

    assert_eq!(store.snapshot(), before);
}

#[test]
fn replace_into_source_store_conflicts_on_unique_domain() {
    let dir = TempDir::new().unwrap();
    let store = scenario_store("acme");
    let svc = service(store.clone(), &dir);
    let before = store.snapshot();

    let bytes = export_tenant(&svc, "acme");
    let err = svc
        .restore_bytes(&bytes, &RestoreOptions::default())
        .unwrap_err();

    assert!(matches!(
        err,
        FerryError::Constraint {
            entity: EntityType::Organizations,
            index: 0,
            ..
        }
    ));
    assert_eq!(store.snapshot(), before);
}

#[test]
fn merge_cannot_take_over_another_tenants_rows() {
    use ferry_durability::{ArchiveManifest, ArchiveWriter, EntityRecordSet};

    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    store.load(EntityType::Organizations, [org("o1"), org("o2")]).unwrap();
    store
        .load(EntityType::Spaces, [space("victim", "o2", None)])
        .unwrap();
    let store = Arc::new(store);
    let before = store.snapshot();

    // An o1 archive that reuses the id of an o2 space
    let sets = vec![
        EntityRecordSet::new(EntityType::Organizations, vec![org("o1")]),
        EntityRecordSet::new(
            EntityType::Spaces,
            vec![space("victim", "o1", None).with_field("name", json!("stolen"))],
        ),
    ];
    let manifest = ArchiveManifest::skeleton("test", &TenantScope::tenant("o1"));
    let (bytes, _) = ArchiveWriter::with_defaults()
        .write_to_vec(manifest, &sets)
        .unwrap();

    let endpoint = TransferEndpoint::new(service(store.clone(), &dir));
    let err = endpoint
        .request_restore(
            &RequestContext::admin("o1", "mallory"),
            &bytes,
            br#"{"mode":"merge"}"#,
        )
        .unwrap_err();
    assert_eq!(err.status(), 422);

    let victim = store.get(EntityType::Spaces, &"victim".into()).unwrap();
    assert_eq!(victim.org_ref(), Some(&RecordId::from("o2")));
    assert_eq!(store.snapshot(), before);
}
