//! Export and restore engine for Ferry
//!
//! This crate orchestrates the lower layers:
//! - Dependency ordering of entity types (graph)
//! - Entity serialization and the export pipeline
//! - Restore orchestration: validation, ordering, one transaction, reindex
//! - Configuration via `ferry.toml`
//! - FerryService: scope-locked entry point for every request
//!
//! The engine is the only component that knows about:
//! - Per-entity-type behaviour (handlers)
//! - Identifier remapping on replace-mode restores
//! - The transaction boundary of a restore

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod export;
pub mod graph;
pub mod handlers;
pub mod remap;
pub mod restore;
pub mod serializer;
pub mod service;

pub use config::{ConfigError, ConfigResult, FerryConfig, CONFIG_FILE_NAME};
pub use export::{archive_filename, ExportPipeline, ExportSpec};
pub use graph::{dependency_order, include_closure, DependencyGraph, GraphError};
pub use handlers::{ArchiveIndex, EntityHandler};
pub use remap::IdMap;
pub use restore::{EntityCount, RestoreOptions, RestoreOrchestrator, RestoreReport, RestoreState};
pub use serializer::EntitySerializer;
pub use service::FerryService;
