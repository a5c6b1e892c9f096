//! Keyword propagation engine.
//!
//! This crate maintains a denormalized keyword array on every record of a
//! set of connected collections. Local keyword fields contribute their raw
//! value; reference keyword fields contribute the display label of the
//! record they point at.
//!
//! ## Key Components
//!
//! - [`KeywordMap`]: keyword-bearing fields of each collection, by position
//! - [`ReferenceMatrix`]: for each collection, the slots that display its label
//! - [`find_changed`]: records modified after a point in time
//! - [`KeywordEngine`]: recompute, cascade, and a single reconciliation pass
//! - [`ReconcileCheckpoint`]: lower bound of the next change window
//! - [`PassReport`]: per-collection counters and failed records
//!
//! ## Example
//!
//! ```ignore
//! use keyword_indexing::{EngineConfig, KeywordEngine};
//!
//! let engine = KeywordEngine::new(store, schema, EngineConfig::default())?;
//! let report = engine.run_once(since).await?;
//! for failure in &report.failures {
//!     eprintln!("{}: {}", failure.record, failure.error);
//! }
//! ```

pub mod cascade;
pub mod changes;
pub mod checkpoint;
pub mod engine;
pub mod error;
pub mod fields;
pub mod matrix;
pub mod projection;
pub mod stats;

#[cfg(test)]
pub(crate) mod test_support;

pub use changes::{find_changed, ChangeSet, CollectionChanges};
pub use checkpoint::{ReconcileCheckpoint, CHECKPOINT_KEY};
pub use engine::{EngineConfig, KeywordEngine};
pub use error::IndexingError;
pub use fields::{keyword_fields, FieldKind, KeywordField, KeywordMap};
pub use matrix::{Reference, ReferenceMatrix};
pub use stats::{CascadeStats, CollectionStats, PassReport, RecordFailure, RecordRef};
