//! Reference scenario: one organization with 2 spaces, 3 documents and 5
//! pages, exported, inspected and restored with fresh identifiers.

use crate::common::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn scenario_export_and_replace_restore() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let source = scenario_store("acme");
    let svc = service(source.clone(), &dir);

    let info = svc
        .export(&ExportSpec::tenant(), &TenantId::new("acme"))
        .unwrap();
    assert!(info.filename.starts_with("ferry-tenant-acme-"));
    assert!(info.filename.ends_with(".zip"));

    // Manifest lists exactly the present types, in dependency order
    assert_eq!(
        info.manifest.entity_names(),
        vec!["organizations", "spaces", "documents", "pages"]
    );
    let counts: Vec<u64> = info.manifest.entities.iter().map(|e| e.records).collect();
    assert_eq!(counts, vec![1, 2, 3, 5]);
    assert_eq!(info.manifest.scope.tenants, vec![TenantId::new("acme")]);

    let indexer = Arc::new(RecordingIndexer::default());
    let target = Arc::new(MemoryStore::new());
    let restorer = FerryService::new(
        target.clone(),
        indexer.clone(),
        FerryConfig::with_archive_dir(dir.path()),
    );
    let report = restorer
        .restore_file(&info.path, &RestoreOptions::tenant(RestoreMode::Replace))
        .unwrap();

    assert_eq!(report.state, RestoreState::Committed);
    assert_eq!(report.total(), 11);
    assert!(report.reindexed);
    assert_eq!(*indexer.calls.lock(), vec![report.scope.clone()]);

    // Fresh identifiers throughout
    let new_org = target.records(EntityType::Organizations)[0].id.clone();
    assert_ne!(new_org.as_str(), "acme");
    assert_eq!(report.scope, TenantScope::tenant(new_org.as_str()));

    // Every page resolves to a restored document, every document to a space
    let documents: BTreeSet<_> = target
        .records(EntityType::Documents)
        .into_iter()
        .map(|d| d.id)
        .collect();
    let spaces: BTreeSet<_> = target
        .records(EntityType::Spaces)
        .into_iter()
        .map(|s| s.id)
        .collect();
    for page in target.records(EntityType::Pages) {
        assert!(documents.contains(page.reference("document_id").unwrap()));
        assert_eq!(page.org_ref(), Some(&new_org));
    }
    for doc in target.records(EntityType::Documents) {
        assert!(spaces.contains(doc.reference("space_id").unwrap()));
    }

    // Pages per document survive the remap: d1 has 2, d2 has 1, d3 has 2
    let mut per_document: Vec<usize> = documents
        .iter()
        .map(|d| {
            target
                .records(EntityType::Pages)
                .iter()
                .filter(|p| p.reference("document_id") == Some(d))
                .count()
        })
        .collect();
    per_document.sort_unstable();
    assert_eq!(per_document, vec![1, 2, 2]);
}

#[test]
fn scenario_archive_is_reproducible() {
    let dir = TempDir::new().unwrap();
    let svc = service(scenario_store("acme"), &dir);

    let a = ArchiveReader::from_bytes(&export_tenant(&svc, "acme")).unwrap();
    let b = ArchiveReader::from_bytes(&export_tenant(&svc, "acme")).unwrap();

    let checksums = |m: &ferry::ArchiveManifest| -> Vec<String> {
        m.entities.iter().map(|e| e.checksum.clone()).collect()
    };
    assert_eq!(checksums(&a.manifest), checksums(&b.manifest));
}

#[test]
fn include_filter_pulls_in_parents() {
    let dir = TempDir::new().unwrap();
    let svc = service(scenario_store("acme"), &dir);

    let info = svc
        .export(
            &ExportSpec::tenant().including(["documents"]),
            &TenantId::new("acme"),
        )
        .unwrap();
    assert_eq!(
        info.manifest.entity_names(),
        vec!["organizations", "spaces", "documents"]
    );
}

#[test]
fn export_of_unknown_tenant_is_empty() {
    let dir = TempDir::new().unwrap();
    let svc = service(scenario_store("acme"), &dir);
    let err = svc
        .export(&ExportSpec::tenant(), &TenantId::new("initech"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyExportFailure);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
