//! Reconciliation loop for the keyword engine.
//!
//! This crate drives [`keyword_indexing::KeywordEngine`] on a fixed
//! interval and owns everything mutable about the loop: the run latch, the
//! checkpoint and the set of records to retry.
//!
//! # Features
//!
//! - Fixed-interval timer via `tokio::time::interval`
//! - At most one pass at a time; overlapping ticks are skipped and counted
//! - Checkpoint advanced to the pass start only after the pass completes
//! - Per-record failures retried on the next pass
//! - Optional pass timeout
//! - Graceful shutdown via CancellationToken
//!
//! # Example
//!
//! ```ignore
//! use keyword_scheduler::{initialize, ReconcilerConfig};
//!
//! let handle = initialize(5000, store, schema, ReconcilerConfig::default()).await?;
//!
//! // Force a pass outside the timer
//! handle.trigger().await?;
//! println!("{:?}", handle.status());
//!
//! handle.shutdown().await?;
//! ```

mod config;
mod error;
mod overlap;
mod reconciler;
mod registry;

pub use config::ReconcilerConfig;
pub use error::SchedulerError;
pub use overlap::{OverlapGuard, RunGuard};
pub use reconciler::{initialize, Reconciler, ReconcilerHandle};
pub use registry::{PassResult, ReconcilerStatus, StatusRegistry};
