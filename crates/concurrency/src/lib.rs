//! Concurrency layer for Ferry
//!
//! This crate implements the coordination primitives around backup/restore:
//! - ScopeLocks: Non-queuing exclusive locks per tenant (or global) scope
//! - Deadline: Wall-clock ceiling checked inside long transactions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod deadline;
pub mod scope_lock;

pub use deadline::Deadline;
pub use scope_lock::{ScopeGuard, ScopeLocks};
