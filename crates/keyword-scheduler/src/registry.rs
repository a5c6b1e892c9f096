//! Status registry for the reconciliation loop.
//!
//! Passes record their lifecycle here; handles read cloned snapshots.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PassResult {
    /// Pass completed; individual records may still have failed
    Success,
    /// Pass failed and the checkpoint was not advanced
    Failed(String),
    /// Tick skipped because a pass was already running
    Skipped(String),
    /// Pass dropped by shutdown before it finished
    Cancelled,
}

/// Observable state of the reconciliation loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcilerStatus {
    /// When the last pass started (if ever)
    pub last_run: Option<DateTime<Utc>>,
    /// Duration of the last pass in milliseconds
    pub last_duration_ms: Option<u64>,
    /// Result of the last pass or skipped tick
    pub last_result: Option<PassResult>,
    /// Passes run, successful or not
    pub run_count: u64,
    /// Passes that failed
    pub error_count: u64,
    /// Ticks skipped by the run latch
    pub skip_count: u64,
    /// Passes dropped by shutdown before they finished
    pub cancel_count: u64,
    /// Records reconciled across all passes
    pub records_processed: u64,
    /// Records that failed in the last pass and will be retried
    pub retry_pending: usize,
    /// Lower bound of the next change window
    pub checkpoint: Option<DateTime<Utc>>,
    /// Whether a pass is executing
    pub is_running: bool,
}

/// Thread-safe holder of [`ReconcilerStatus`].
#[derive(Debug, Default)]
pub struct StatusRegistry {
    status: RwLock<ReconcilerStatus>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoned locks are recovered; every write is a plain field update.
    fn read(&self) -> RwLockReadGuard<'_, ReconcilerStatus> {
        self.status.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ReconcilerStatus> {
        self.status.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Record that a pass has started.
    pub fn record_start(&self) {
        let mut status = self.write();
        status.is_running = true;
        status.last_run = Some(Utc::now());
    }

    /// Record that a pass has finished.
    pub fn record_complete(
        &self,
        result: PassResult,
        duration_ms: u64,
        processed: u64,
        retry_pending: usize,
    ) {
        let mut status = self.write();
        status.is_running = false;
        status.last_duration_ms = Some(duration_ms);
        status.run_count += 1;
        status.records_processed += processed;
        if matches!(result, PassResult::Failed(_)) {
            status.error_count += 1;
        } else {
            status.retry_pending = retry_pending;
        }
        status.last_result = Some(result);
    }

    /// Record a pass dropped before it finished. The checkpoint is untouched.
    pub fn record_cancelled(&self, duration_ms: u64) {
        let mut status = self.write();
        status.is_running = false;
        status.last_duration_ms = Some(duration_ms);
        status.run_count += 1;
        status.cancel_count += 1;
        status.last_result = Some(PassResult::Cancelled);
    }

    /// Record a tick refused by the run latch.
    pub fn record_skip(&self, reason: &str) {
        let mut status = self.write();
        status.skip_count += 1;
        status.last_result = Some(PassResult::Skipped(reason.to_string()));
    }

    pub fn set_checkpoint(&self, checkpoint: DateTime<Utc>) {
        self.write().checkpoint = Some(checkpoint);
    }

    /// Snapshot of the current status.
    pub fn snapshot(&self) -> ReconcilerStatus {
        self.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.read().is_running
    }
}
