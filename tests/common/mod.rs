//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Once};

use parking_lot::Mutex;
use serde_json::{json, Value as JsonValue};
use tempfile::TempDir;

pub use ferry::{
    ArchiveReader, EntityType, ErrorKind, ExportSpec, FerryConfig, FerryError, FerryService,
    MemoryStore, NoopIndexer, Record, RecordId, RequestContext, RestoreMode, RestoreOptions,
    RestoreState, ScopeLocks, SearchIndexer, Store, StoreTransaction, TenantId, TenantScope,
    TransferEndpoint,
};
use ferry::StoreError;

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Install a test-writer subscriber once per process.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing_subscriber::filter::LevelFilter::WARN)
            .try_init();
    });
}

// ============================================================================
// Records
// ============================================================================

pub fn org(id: &str) -> Record {
    Record::new(id)
        .with_field("title", json!(format!("Organization {}", id)))
        .with_field("domain", json!(format!("{}.example.com", id)))
}

pub fn user(id: &str, org: &str) -> Record {
    Record::new(id)
        .with_ref("org_id", org)
        .with_field("email", json!(format!("{}@example.com", id)))
        .with_field("firstname", json!(id))
}

pub fn space(id: &str, org: &str, owner: Option<&str>) -> Record {
    let record = Record::new(id)
        .with_ref("org_id", org)
        .with_field("name", json!(format!("Space {}", id)));
    match owner {
        Some(user) => record.with_ref("created_by", user),
        None => record,
    }
}

pub fn document(id: &str, org: &str, space: &str) -> Record {
    Record::new(id)
        .with_ref("org_id", org)
        .with_ref("space_id", space)
        .with_field("title", json!(format!("Document {}", id)))
        .with_field("tags", json!(["draft"]))
}

pub fn page(id: &str, org: &str, document: &str, sequence: u32) -> Record {
    Record::new(id)
        .with_ref("org_id", org)
        .with_ref("document_id", document)
        .with_field("title", json!(format!("Page {}", id)))
        .with_field("body", json!(format!("<p>content of {}</p>", id)))
        .with_field("sequence", json!(sequence))
}

// ============================================================================
// Datasets
// ============================================================================

/// One tenant: 1 organization, 2 spaces, 3 documents, 5 pages.
pub fn load_scenario(store: &MemoryStore, org_id: &str) {
    let id = |local: &str| format!("{}-{}", org_id, local);

    store.load(EntityType::Organizations, [org(org_id)]).unwrap();
    store
        .load(
            EntityType::Spaces,
            [
                space(&id("s1"), org_id, None),
                space(&id("s2"), org_id, None),
            ],
        )
        .unwrap();
    store
        .load(
            EntityType::Documents,
            [
                document(&id("d1"), org_id, &id("s1")),
                document(&id("d2"), org_id, &id("s1")),
                document(&id("d3"), org_id, &id("s2")),
            ],
        )
        .unwrap();
    store
        .load(
            EntityType::Pages,
            [
                page(&id("p1"), org_id, &id("d1"), 1),
                page(&id("p2"), org_id, &id("d1"), 2),
                page(&id("p3"), org_id, &id("d2"), 1),
                page(&id("p4"), org_id, &id("d3"), 1),
                page(&id("p5"), org_id, &id("d3"), 2),
            ],
        )
        .unwrap();
}

pub fn scenario_store(org_id: &str) -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    load_scenario(&store, org_id);
    Arc::new(store)
}

// ============================================================================
// Services
// ============================================================================

pub fn service(store: Arc<dyn Store>, dir: &TempDir) -> FerryService {
    FerryService::new(
        store,
        Arc::new(NoopIndexer),
        FerryConfig::with_archive_dir(dir.path()),
    )
}

/// Export `tenant` and return the archive bytes; the file is removed.
pub fn export_tenant(service: &FerryService, tenant: &str) -> Vec<u8> {
    let info = service
        .export(&ExportSpec::tenant(), &TenantId::new(tenant))
        .unwrap();
    let bytes = std::fs::read(&info.path).unwrap();
    std::fs::remove_file(&info.path).unwrap();
    bytes
}

// ============================================================================
// Canonical dataset form
// ============================================================================

/// Rows of a tenant with identifiers replaced by content.
///
/// Each record becomes its fields plus, for every reference, the canonical
/// form of the referenced parent. Two datasets that differ only in
/// identifiers have equal canonical forms.
pub type Canonical = BTreeMap<EntityType, Vec<String>>;

pub fn canonical(store: &dyn Store, scope: &TenantScope) -> Canonical {
    let mut rows: BTreeMap<EntityType, BTreeMap<RecordId, Record>> = BTreeMap::new();
    for entity in EntityType::ALL {
        let records = store.read_all(entity, scope).unwrap();
        rows.insert(entity, records.into_iter().map(|r| (r.id.clone(), r)).collect());
    }

    fn canon(
        rows: &BTreeMap<EntityType, BTreeMap<RecordId, Record>>,
        entity: EntityType,
        id: &RecordId,
    ) -> JsonValue {
        let Some(record) = rows.get(&entity).and_then(|t| t.get(id)) else {
            return json!({"dangling": id.as_str()});
        };
        let mut refs = serde_json::Map::new();
        for key in entity.foreign_keys() {
            if let Some(target) = record.reference(key.field) {
                refs.insert(key.field.to_string(), canon(rows, key.parent, target));
            }
        }
        json!({"fields": record.fields, "refs": refs})
    }

    rows.iter()
        .filter(|(_, table)| !table.is_empty())
        .map(|(&entity, table)| {
            let mut forms: Vec<String> = table
                .keys()
                .map(|id| canon(&rows, entity, id).to_string())
                .collect();
            forms.sort();
            (entity, forms)
        })
        .collect()
}

// ============================================================================
// Store and indexer doubles
// ============================================================================

/// Store whose first transaction waits at two barriers.
///
/// `begin_transaction` meets the test thread at `entered`, then blocks on
/// `release`, so the caller is parked while holding its scope lock.
pub struct GatedStore {
    inner: Arc<MemoryStore>,
    armed: AtomicBool,
    pub entered: Barrier,
    pub release: Barrier,
}

impl GatedStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(true),
            entered: Barrier::new(2),
            release: Barrier::new(2),
        }
    }
}

impl Store for GatedStore {
    fn read_all(
        &self,
        entity: EntityType,
        scope: &TenantScope,
    ) -> Result<Vec<Record>, StoreError> {
        self.inner.read_all(entity, scope)
    }

    fn begin_transaction(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.wait();
            self.release.wait();
        }
        self.inner.begin_transaction()
    }
}

/// Indexer that remembers every scope it was asked to reindex.
#[derive(Default)]
pub struct RecordingIndexer {
    pub calls: Mutex<Vec<TenantScope>>,
}

impl SearchIndexer for RecordingIndexer {
    fn reindex(&self, scope: &TenantScope) -> Result<(), String> {
        self.calls.lock().push(scope.clone());
        Ok(())
    }
}

// ============================================================================
// Archive surgery
// ============================================================================

/// Rebuild an archive, passing every entry through `edit`.
///
/// `edit` gets the entry name and contents; returning `None` drops the entry.
pub fn rewrite_archive<F>(bytes: &[u8], mut edit: F) -> Vec<u8>
where
    F: FnMut(&str, Vec<u8>) -> Option<Vec<u8>>,
{
    use std::io::{Cursor, Read, Write};
    use zip::write::SimpleFileOptions;

    let mut source = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut out = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..source.len() {
        let mut entry = source.by_index(i).unwrap();
        let name = entry.name().to_string();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        if let Some(data) = edit(&name, data) {
            out.start_file(name, SimpleFileOptions::default()).unwrap();
            out.write_all(&data).unwrap();
        }
    }
    out.finish().unwrap().into_inner()
}

/// Rewrite the manifest JSON of an archive.
pub fn edit_manifest<F>(bytes: &[u8], mut edit: F) -> Vec<u8>
where
    F: FnMut(&mut JsonValue),
{
    rewrite_archive(bytes, |name, data| {
        if name != "ferry/MANIFEST.json" {
            return Some(data);
        }
        let mut manifest: JsonValue = serde_json::from_slice(&data).unwrap();
        edit(&mut manifest);
        Some(serde_json::to_vec_pretty(&manifest).unwrap())
    })
}
