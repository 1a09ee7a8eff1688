//! Storage layer for Ferry
//!
//! This crate implements the reference store backend:
//! - MemoryStore: BTreeMap-based relational store with RwLock
//! - Transactions with staged writes, commit and rollback
//! - Foreign-key, required-field and unique-field enforcement
//! - One-shot failure injection for restore and export testing

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod testing;

pub use memory::{MemoryStore, MemoryTransaction, StoreSnapshot};
