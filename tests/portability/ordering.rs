//! Ordering invariant: parents are restored before children, and a
//! reference that does not resolve inside the archive is rejected.

use crate::common::*;
use ferry_durability::{ArchiveManifest, ArchiveWriter, EntityRecordSet};
use std::sync::Arc;
use tempfile::TempDir;

fn build(sets: Vec<EntityRecordSet>) -> Vec<u8> {
    let manifest = ArchiveManifest::skeleton("test", &TenantScope::tenant("acme"));
    ArchiveWriter::with_defaults()
        .write_to_vec(manifest, &sets)
        .unwrap()
        .0
}

fn base_sets() -> Vec<EntityRecordSet> {
    vec![
        EntityRecordSet::new(EntityType::Organizations, vec![org("acme")]),
        EntityRecordSet::new(EntityType::Spaces, vec![space("s1", "acme", None)]),
        EntityRecordSet::new(EntityType::Documents, vec![document("d1", "acme", "s1")]),
        EntityRecordSet::new(
            EntityType::Pages,
            vec![page("p1", "acme", "d1", 1), page("p2", "acme", "d1", 2)],
        ),
    ]
}

#[test]
fn archive_order_does_not_matter() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let mut sets = base_sets();
    sets.reverse();
    let bytes = build(sets);

    let manifest = ArchiveReader::from_bytes(&bytes).unwrap().manifest;
    assert_eq!(
        manifest.entity_names(),
        vec!["pages", "documents", "spaces", "organizations"]
    );

    let target = Arc::new(MemoryStore::new());
    let report = service(target.clone(), &dir)
        .restore_bytes(&bytes, &RestoreOptions::default())
        .unwrap();

    let order: Vec<_> = report.entities.iter().map(|c| c.entity).collect();
    assert_eq!(
        order,
        vec![
            EntityType::Organizations,
            EntityType::Spaces,
            EntityType::Documents,
            EntityType::Pages
        ]
    );
    assert_eq!(target.count(EntityType::Pages), 2);
}

#[test]
fn dangling_required_reference_rejected() {
    let dir = TempDir::new().unwrap();
    let mut sets = base_sets();
    sets[3] = EntityRecordSet::new(
        EntityType::Pages,
        vec![page("p1", "acme", "d1", 1), page("p2", "acme", "d404", 2)],
    );
    let bytes = build(sets);

    let target = Arc::new(MemoryStore::new());
    let err = service(target.clone(), &dir)
        .restore_bytes(&bytes, &RestoreOptions::default())
        .unwrap_err();

    match err {
        FerryError::Constraint {
            entity,
            index,
            reason,
        } => {
            assert_eq!(entity, EntityType::Pages);
            assert_eq!(index, 1);
            assert!(reason.contains("document_id"));
        }
        other => panic!("expected constraint failure, got {}", other),
    }
    assert_eq!(target.commit_count(), 0);
}

#[test]
fn dangling_optional_reference_rejected() {
    let dir = TempDir::new().unwrap();
    let mut sets = base_sets();
    sets[1] = EntityRecordSet::new(
        EntityType::Spaces,
        vec![space("s1", "acme", Some("ghost"))],
    );
    let bytes = build(sets);

    let err = service(Arc::new(MemoryStore::new()), &dir)
        .restore_bytes(&bytes, &RestoreOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        FerryError::Constraint {
            entity: EntityType::Spaces,
            index: 0,
            ..
        }
    ));
}

#[test]
fn reference_to_other_tenant_rejected() {
    let dir = TempDir::new().unwrap();
    let mut sets = base_sets();
    sets[2] = EntityRecordSet::new(
        EntityType::Documents,
        vec![document("d1", "globex", "s1")],
    );
    let bytes = build(sets);

    let err = service(Arc::new(MemoryStore::new()), &dir)
        .restore_bytes(&bytes, &RestoreOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintFailure);
}

#[test]
fn duplicate_identifier_rejected() {
    let dir = TempDir::new().unwrap();
    let mut sets = base_sets();
    sets[3] = EntityRecordSet {
        entity: EntityType::Pages,
        schema_version: 1,
        records: vec![page("p1", "acme", "d1", 1), page("p1", "acme", "d1", 2)],
    };
    let bytes = build(sets);

    let err = service(Arc::new(MemoryStore::new()), &dir)
        .restore_bytes(&bytes, &RestoreOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        FerryError::Constraint {
            entity: EntityType::Pages,
            index: 1,
            ..
        }
    ));
}
