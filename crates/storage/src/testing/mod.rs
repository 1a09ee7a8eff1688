//! Testing utilities for failure injection
//!
//! Restore atomicity and export cleanup are only meaningful if the store can
//! be made to fail at a chosen point. [`FaultPoint`]s armed on a
//! [`MemoryStore`](crate::MemoryStore) fire once and are then disarmed.
//!
//! # Example
//!
//! ```ignore
//! use ferry_storage::{MemoryStore, testing::FaultPoint};
//!
//! let store = MemoryStore::new();
//! store.inject(FaultPoint::Upsert { entity: EntityType::Pages, index: 4 });
//! ```

mod faults;

pub use faults::{FaultPlan, FaultPoint};
