//! Per-pass statistics and failure tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a record across collections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordRef {
    pub collection: String,
    pub id: String,
}

impl RecordRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for RecordRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A record that failed to reconcile during a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub record: RecordRef,
    pub error: String,
}

/// Outcome of cascading one record's label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeStats {
    /// Referencing records found
    pub matched: usize,
    /// Referencing records rewritten
    pub patched: usize,
    /// Referencing records whose slot already held the label
    pub unchanged: usize,
}

impl CascadeStats {
    pub fn merge(&mut self, other: CascadeStats) {
        self.matched += other.matched;
        self.patched += other.patched;
        self.unchanged += other.unchanged;
    }
}

/// Counters for one collection within a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub collection: String,
    /// Changed records reconciled successfully
    pub processed: usize,
    /// Changed records that failed
    pub errors: usize,
    /// Referencing records patched by cascades
    pub patched: usize,
    /// Referencing records already up to date
    pub unchanged: usize,
}

impl CollectionStats {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    pub fn record_success(&mut self, cascade: CascadeStats) {
        self.processed += 1;
        self.patched += cascade.patched;
        self.unchanged += cascade.unchanged;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }
}

/// Result of a single reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    /// Lower bound of the change window (exclusive)
    pub since: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Per-collection counters in processing order
    pub collections: Vec<CollectionStats>,
    pub failures: Vec<RecordFailure>,
}

impl PassReport {
    pub fn new(since: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            since,
            started_at: now,
            finished_at: now,
            collections: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Total records reconciled successfully.
    pub fn total_processed(&self) -> usize {
        self.collections.iter().map(|c| c.processed).sum()
    }

    /// Total referencing records patched.
    pub fn total_patched(&self) -> usize {
        self.collections.iter().map(|c| c.patched).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Whether the pass found anything to do.
    pub fn has_updates(&self) -> bool {
        !self.collections.is_empty()
    }

    /// Records to re-fetch and reprocess on the next pass.
    pub fn retry_set(&self) -> Vec<RecordRef> {
        let mut refs: Vec<RecordRef> = self.failures.iter().map(|f| f.record.clone()).collect();
        refs.sort();
        refs.dedup();
        refs
    }

    /// Counters for a collection, if it had changes.
    pub fn collection(&self, id: &str) -> Option<&CollectionStats> {
        self.collections.iter().find(|c| c.collection == id)
    }
}
