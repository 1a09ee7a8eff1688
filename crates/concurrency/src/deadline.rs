//! Wall-clock ceiling for long-running transactions
//!
//! A restore transaction cannot be cancelled from outside, so it bounds
//! itself: the orchestrator checks the deadline between records and aborts
//! once it has passed, releasing the store and the scope lock.

use std::time::{Duration, Instant};

use ferry_core::{FerryError, FerryResult};

/// Point in time after which work must stop
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    /// Deadline `limit` from now
    pub fn after(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    /// Time since the deadline was created
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Configured ceiling
    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Whether the ceiling has been passed
    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.limit
    }

    /// Fail with [`FerryError::Timeout`] once expired
    pub fn check(&self) -> FerryResult<()> {
        if self.is_expired() {
            return Err(FerryError::Timeout {
                limit_ms: self.limit.as_millis() as u64,
            });
        }
        Ok(())
    }
}
