//! Integration tests for export and restore.
//!
//! Unit tests in each crate cover the archive format, ordering, handlers
//! and the orchestrator state machine in isolation. These tests cover the
//! end-to-end guarantees: export → archive bytes → restore into a store.

#[path = "../common/mod.rs"]
mod common;

mod atomicity;
mod exclusion;
mod integrity;
mod merge;
mod ordering;
mod scenario;
