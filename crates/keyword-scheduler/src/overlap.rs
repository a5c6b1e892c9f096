//! Run latch for reconciliation passes.
//!
//! At most one pass runs at a time. A tick that arrives while a pass is in
//! flight is skipped and counted, never queued.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Latch tracking whether a pass is currently running.
///
/// Acquisition is lock-free. The returned [`RunGuard`] releases the latch
/// when dropped.
#[derive(Debug, Default)]
pub struct OverlapGuard {
    is_running: Arc<AtomicBool>,
    skipped: AtomicU64,
}

impl OverlapGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to acquire the latch.
    ///
    /// Returns `None`, and counts a skip, if a pass already holds it.
    pub fn try_acquire(&self) -> Option<RunGuard> {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Some(RunGuard {
                flag: self.is_running.clone(),
                started: Instant::now(),
            })
        } else {
            self.skipped.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Acquisitions refused since creation.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::SeqCst)
    }
}

/// RAII guard that releases the latch when dropped.
///
/// Dropping happens on every exit path of a pass, including errors, panics,
/// timeouts and cancellation.
#[derive(Debug)]
pub struct RunGuard {
    flag: Arc<AtomicBool>,
    started: Instant,
}

impl RunGuard {
    /// Time since the latch was acquired.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
