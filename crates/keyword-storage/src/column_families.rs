//! Column family definitions for RocksDB.
//!
//! Each column family isolates data with different access patterns:
//! - records: Collection documents keyed by collection and id
//! - checkpoints: Reconciliation checkpoints (default compaction)

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for collection records
pub const CF_RECORDS: &str = "records";

/// Column family name for reconciliation checkpoints
pub const CF_CHECKPOINTS: &str = "checkpoints";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[CF_RECORDS, CF_CHECKPOINTS];

/// Create column family options for records (frequent rewrites, compressed)
fn records_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_RECORDS, records_options()),
        ColumnFamilyDescriptor::new(CF_CHECKPOINTS, Options::default()),
    ]
}
