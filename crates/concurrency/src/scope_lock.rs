//! Per-scope exclusive locks for backup/restore jobs
//!
//! At most one export or restore runs per scope. Requests are never queued:
//! a second request for a held scope fails immediately so callers retry
//! later instead of piling up whole-dataset scans.
//!
//! ## Lock compatibility
//!
//! ```text
//!                 held: none   tenant A   tenant B   global
//! request A        grant       reject     grant      reject
//! request global   grant       reject     reject     reject
//! ```
//!
//! Global operations touch every tenant, so they exclude and are excluded by
//! every tenant job.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use ferry_core::{FerryError, FerryResult, TenantId, TenantScope};

#[derive(Debug, Default)]
struct LockTable {
    global: bool,
    tenants: HashSet<TenantId>,
}

impl LockTable {
    fn try_acquire(&mut self, scope: &TenantScope) -> bool {
        match scope {
            TenantScope::Global => {
                if self.global || !self.tenants.is_empty() {
                    return false;
                }
                self.global = true;
                true
            }
            TenantScope::Tenant(id) => {
                if self.global || self.tenants.contains(id) {
                    return false;
                }
                self.tenants.insert(id.clone());
                true
            }
        }
    }

    fn release(&mut self, scope: &TenantScope) {
        match scope {
            TenantScope::Global => self.global = false,
            TenantScope::Tenant(id) => {
                self.tenants.remove(id);
            }
        }
    }
}

/// Shared table of held scopes
///
/// Cloning yields another handle to the same table.
#[derive(Debug, Clone, Default)]
pub struct ScopeLocks {
    table: Arc<Mutex<LockTable>>,
}

impl ScopeLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire `scope` or fail with [`FerryError::Conflict`]
    ///
    /// The returned guard releases the scope when dropped.
    pub fn try_acquire(&self, scope: &TenantScope) -> FerryResult<ScopeGuard> {
        let granted = self.table.lock().try_acquire(scope);
        if !granted {
            debug!(target: "ferry::lock", scope = %scope, "Scope busy");
            return Err(FerryError::Conflict(scope.clone()));
        }
        debug!(target: "ferry::lock", scope = %scope, "Scope acquired");
        Ok(ScopeGuard {
            table: Arc::clone(&self.table),
            scope: scope.clone(),
        })
    }

    /// Whether `scope` is currently held (exactly, not via global)
    pub fn is_held(&self, scope: &TenantScope) -> bool {
        let table = self.table.lock();
        match scope {
            TenantScope::Global => table.global,
            TenantScope::Tenant(id) => table.tenants.contains(id),
        }
    }

    /// Number of scopes currently held
    pub fn held_count(&self) -> usize {
        let table = self.table.lock();
        table.tenants.len() + usize::from(table.global)
    }
}

/// Exclusive hold on one scope; released on drop
#[derive(Debug)]
pub struct ScopeGuard {
    table: Arc<Mutex<LockTable>>,
    scope: TenantScope,
}

impl ScopeGuard {
    /// Scope this guard holds
    pub fn scope(&self) -> &TenantScope {
        &self.scope
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.table.lock().release(&self.scope);
        debug!(target: "ferry::lock", scope = %self.scope, "Scope released");
    }
}
