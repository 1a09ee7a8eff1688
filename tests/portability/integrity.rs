//! Version gating and archive integrity: bad archives never reach the store.

use crate::common::*;
use ferry_durability::archive::xxh3_hex;
use ferry_durability::{FORMAT_VERSION, MIN_SUPPORTED_FORMAT_VERSION};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tempfile::TempDir;

fn archive() -> (TempDir, Vec<u8>) {
    let dir = TempDir::new().unwrap();
    let bytes = export_tenant(&service(scenario_store("acme"), &dir), "acme");
    (dir, bytes)
}

fn restore(dir: &TempDir, bytes: &[u8]) -> (Arc<MemoryStore>, Result<ferry::RestoreReport, FerryError>) {
    let target = Arc::new(MemoryStore::new());
    let result = service(target.clone(), dir).restore_bytes(bytes, &RestoreOptions::default());
    (target, result)
}

fn manifest_entity<'a>(manifest: &'a mut JsonValue, name: &str) -> &'a mut JsonValue {
    manifest["entities"]
        .as_array_mut()
        .unwrap()
        .iter_mut()
        .find(|e| e["name"] == name)
        .unwrap()
}

// ============================================================================
// Version gating
// ============================================================================

#[test]
fn newer_format_version_rejected() {
    init_tracing();
    let (dir, bytes) = archive();
    let newer = edit_manifest(&bytes, |m| m["format_version"] = json!(FORMAT_VERSION + 1));

    let (target, result) = restore(&dir, &newer);
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VersionFailure);
    assert_eq!(target.total_rows(), 0);
}

#[test]
fn older_format_version_rejected() {
    let (dir, bytes) = archive();
    let older = edit_manifest(&bytes, |m| {
        m["format_version"] = json!(MIN_SUPPORTED_FORMAT_VERSION - 1)
    });
    let (_, result) = restore(&dir, &older);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::VersionFailure);
}

#[test]
fn newer_schema_version_rejected() {
    let (dir, bytes) = archive();
    let newer = edit_manifest(&bytes, |m| {
        manifest_entity(m, "pages")["schema_version"] = json!(99);
    });
    let (target, result) = restore(&dir, &newer);
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VersionFailure);
    assert!(err.to_string().contains("pages"));
    assert_eq!(target.total_rows(), 0);
}

// ============================================================================
// Integrity
// ============================================================================

#[test]
fn tampered_payload_rejected() {
    let (dir, bytes) = archive();
    let tampered = rewrite_archive(&bytes, |name, data| {
        if name != "ferry/records/documents.json" {
            return Some(data);
        }
        let mut set: JsonValue = serde_json::from_slice(&data).unwrap();
        set["records"][0]["fields"]["title"] = json!("forged");
        Some(serde_json::to_vec(&set).unwrap())
    });

    let (target, result) = restore(&dir, &tampered);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::IntegrityFailure);
    assert_eq!(target.total_rows(), 0);
}

#[test]
fn declared_payload_missing_rejected() {
    let (dir, bytes) = archive();
    let truncated = rewrite_archive(&bytes, |name, data| {
        (name != "ferry/records/pages.json").then_some(data)
    });
    let (_, result) = restore(&dir, &truncated);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::IntegrityFailure);
}

#[test]
fn undeclared_payload_rejected() {
    let (dir, bytes) = archive();
    let mut pages = None;
    rewrite_archive(&bytes, |name, data| {
        if name == "ferry/records/pages.json" {
            pages = Some(data.clone());
        }
        Some(data)
    });

    // A well-formed payload the manifest does not declare
    let extra = append_entry(&bytes, "ferry/records/users.json", &pages.unwrap());
    let (_, result) = restore(&dir, &extra);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::IntegrityFailure);
}

fn append_entry(bytes: &[u8], name: &str, data: &[u8]) -> Vec<u8> {
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new_append(Cursor::new(bytes.to_vec())).unwrap();
    writer.start_file(name, SimpleFileOptions::default()).unwrap();
    writer.write_all(data).unwrap();
    writer.finish().unwrap().into_inner()
}

#[test]
fn not_a_zip_rejected() {
    let dir = TempDir::new().unwrap();
    let (_, result) = restore(&dir, b"PK\x03\x04 definitely not an archive");
    assert_eq!(result.unwrap_err().kind(), ErrorKind::IntegrityFailure);
}

// ============================================================================
// Entity catalogue
// ============================================================================

fn with_unknown_entity(bytes: &[u8], required: bool) -> Vec<u8> {
    let payload = serde_json::to_vec(&json!({
        "entity": "widgets",
        "schema_version": 1,
        "records": [{"id": "w1", "fields": {"name": "gear"}}]
    }))
    .unwrap();
    let checksum = xxh3_hex(&payload);

    let edited = edit_manifest(bytes, |m| {
        m["entities"].as_array_mut().unwrap().push(json!({
            "name": "widgets",
            "schema_version": 1,
            "records": 1,
            "checksum": checksum,
            "required": required,
        }));
    });
    append_entry(&edited, "ferry/records/widgets.json", &payload)
}

#[test]
fn unknown_required_entity_rejected() {
    let (dir, bytes) = archive();
    let (target, result) = restore(&dir, &with_unknown_entity(&bytes, true));
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownEntityFailure);
    assert!(err.to_string().contains("widgets"));
    assert_eq!(target.total_rows(), 0);
}

#[test]
fn unknown_optional_entity_skipped() {
    let (dir, bytes) = archive();
    let (target, result) = restore(&dir, &with_unknown_entity(&bytes, false));
    let report = result.unwrap();
    assert_eq!(report.skipped, vec!["widgets".to_string()]);
    assert_eq!(target.count(EntityType::Pages), 5);
}

#[test]
fn missing_parent_entity_rejected() {
    let (dir, bytes) = archive();
    let without_documents = rewrite_archive(
        &edit_manifest(&bytes, |m| {
            m["entities"]
                .as_array_mut()
                .unwrap()
                .retain(|e| e["name"] != "documents");
        }),
        |name, data| (name != "ferry/records/documents.json").then_some(data),
    );

    let (target, result) = restore(&dir, &without_documents);
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingEntityFailure);
    assert!(err.to_string().contains("documents"));
    assert_eq!(target.total_rows(), 0);
}

#[test]
fn verify_reports_without_restoring() {
    let dir = TempDir::new().unwrap();
    let store = scenario_store("acme");
    let svc = service(store, &dir);
    let info = svc
        .export(&ExportSpec::tenant().retained(), &TenantId::new("acme"))
        .unwrap();

    let summary = svc.verify(&info.path).unwrap();
    assert_eq!(summary.format_version, FORMAT_VERSION);
    assert_eq!(
        summary.entities,
        vec![
            (EntityType::Organizations, 1),
            (EntityType::Spaces, 2),
            (EntityType::Documents, 3),
            (EntityType::Pages, 5),
        ]
    );
}
