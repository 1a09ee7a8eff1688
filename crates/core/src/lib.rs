//! Core types and traits for Ferry
//!
//! This crate defines the foundational types used throughout the system:
//! - EntityType: The closed catalogue of exportable entity types and their schemas
//! - Record: One row with explicit identifier, foreign keys and data fields
//! - TenantScope: Single tenant or whole deployment
//! - Error: FerryError taxonomy and StoreError
//! - Traits: Store, StoreTransaction, SearchIndexer

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entity;
pub mod error;
pub mod traits;
pub mod types;

pub use entity::{EntitySchema, EntityType, ForeignKey, ScopeLevel};
pub use error::{ErrorKind, FerryError, FerryResult, StoreError, StoreResult};
pub use traits::{NoopIndexer, SearchIndexer, Store, StoreTransaction};
pub use types::{Record, RecordId, RestoreMode, TenantId, TenantScope, ORG_REF};
