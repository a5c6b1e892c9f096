//! Checkpoint tracking for reconciliation passes.
//!
//! The checkpoint is the exclusive lower bound of the next change window.
//! It only moves forward, and only after a pass completes, so a crash or a
//! failed pass replays the same window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IndexingError;

/// Name of the checkpoint slot in the store.
pub const CHECKPOINT_KEY: &str = "keyword_reconciler";

/// Progress of the reconciliation loop.
///
/// Persisted to the store so a restarted process can resume its window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileCheckpoint {
    /// Records modified after this instant have not been processed yet
    pub last_processed_time: DateTime<Utc>,

    /// Completed passes since checkpoint creation
    pub pass_count: u64,

    /// Total records processed since checkpoint creation
    pub processed_count: u64,

    /// When this checkpoint was first created
    pub created_at: DateTime<Utc>,
}

impl ReconcileCheckpoint {
    /// Create a checkpoint whose window starts at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            last_processed_time: start,
            pass_count: 0,
            processed_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Record a completed pass that covered changes up to `to`.
    ///
    /// The timestamp never moves backward.
    pub fn advance(&mut self, to: DateTime<Utc>, processed: u64) {
        if to > self.last_processed_time {
            self.last_processed_time = to;
        }
        self.pass_count += 1;
        self.processed_count += processed;
    }

    /// Serialize to JSON bytes for storage
    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexingError> {
        serde_json::to_vec(self).map_err(IndexingError::from)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexingError> {
        serde_json::from_slice(bytes).map_err(IndexingError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_checkpoint_new() {
        let start = Utc::now();
        let checkpoint = ReconcileCheckpoint::new(start);
        assert_eq!(checkpoint.last_processed_time, start);
        assert_eq!(checkpoint.pass_count, 0);
        assert_eq!(checkpoint.processed_count, 0);
    }

    #[test]
    fn test_checkpoint_advance() {
        let start = Utc::now();
        let mut checkpoint = ReconcileCheckpoint::new(start);

        let first = start + Duration::seconds(5);
        checkpoint.advance(first, 10);
        assert_eq!(checkpoint.last_processed_time, first);
        assert_eq!(checkpoint.pass_count, 1);
        assert_eq!(checkpoint.processed_count, 10);

        checkpoint.advance(first + Duration::seconds(5), 5);
        assert_eq!(checkpoint.pass_count, 2);
        assert_eq!(checkpoint.processed_count, 15);
    }

    #[test]
    fn test_checkpoint_never_moves_backward() {
        let start = Utc::now();
        let mut checkpoint = ReconcileCheckpoint::new(start);
        checkpoint.advance(start - Duration::seconds(30), 0);
        assert_eq!(checkpoint.last_processed_time, start);
        assert_eq!(checkpoint.pass_count, 1);
    }

    #[test]
    fn test_checkpoint_serialization_roundtrip() {
        let mut checkpoint = ReconcileCheckpoint::new(Utc::now());
        checkpoint.advance(Utc::now() + Duration::milliseconds(1), 3);

        let bytes = checkpoint.to_bytes().unwrap();
        let decoded = ReconcileCheckpoint::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, checkpoint);
    }

    #[test]
    fn test_checkpoint_json_format() {
        let checkpoint = ReconcileCheckpoint::new(Utc::now());
        let json_str = String::from_utf8(checkpoint.to_bytes().unwrap()).unwrap();

        assert!(json_str.contains("\"pass_count\":0"));
        assert!(json_str.contains("\"processed_count\":0"));
        assert!(json_str.contains("\"last_processed_time\":"));
        assert!(json_str.contains("\"created_at\":"));
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(matches!(
            ReconcileCheckpoint::from_bytes(b"not json"),
            Err(IndexingError::Serialization(_))
        ));
    }
}
