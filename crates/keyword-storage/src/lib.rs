//! Storage layer for keyword-sync.
//!
//! Provides the [`DocumentStore`] contract the keyword engine relies on,
//! plus two implementations:
//! - [`Storage`]: RocksDB-backed, one column family for records and one for
//!   checkpoints, records grouped by collection for prefix scans
//! - [`MemoryStore`]: in-memory, used by tests and demos
//!
//! Both honor silent saves (`SaveOptions::silent()`), which persist changes
//! without advancing the record's modification timestamp.

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;
pub mod memory;
pub mod store;

pub use db::Storage;
pub use error::StorageError;
pub use keys::{CheckpointKey, RecordKey};
pub use memory::MemoryStore;
pub use store::{DocumentStore, Filter, SaveOptions};
