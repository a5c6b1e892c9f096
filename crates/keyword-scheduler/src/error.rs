//! Error types for the scheduler crate.

use thiserror::Error;

use keyword_indexing::IndexingError;
use keyword_types::SchemaError;

/// Errors that can occur in the reconciliation loop.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A pass or checkpoint operation failed
    #[error("Indexing error: {0}")]
    Indexing(#[from] IndexingError),

    /// The schema cannot be reconciled
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Invalid reconciler configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A pass exceeded its time limit
    #[error("Pass timed out after {0}s")]
    Timeout(u64),

    /// The loop is already running
    #[error("Reconciler is already running")]
    AlreadyRunning,

    /// The loop has been shut down
    #[error("Reconciler is not running")]
    NotRunning,
}

impl SchedulerError {
    /// Map engine construction failures, surfacing schema problems directly.
    pub(crate) fn from_engine(err: IndexingError) -> Self {
        match err {
            IndexingError::Schema(schema) => SchedulerError::Schema(schema),
            other => SchedulerError::Indexing(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchedulerError::Timeout(300);
        assert_eq!(err.to_string(), "Pass timed out after 300s");

        let err = SchedulerError::InvalidConfig("interval_ms must be greater than 0".to_string());
        assert!(err.to_string().contains("Invalid configuration"));

        let err = SchedulerError::AlreadyRunning;
        assert!(err.to_string().contains("already running"));

        let err = SchedulerError::NotRunning;
        assert!(err.to_string().contains("not running"));
    }

    #[test]
    fn test_from_engine_surfaces_schema_errors() {
        let schema = SchemaError::DuplicateCollection("A".to_string());
        let err = SchedulerError::from_engine(IndexingError::Schema(schema.clone()));
        assert!(matches!(err, SchedulerError::Schema(e) if e == schema));

        let err = SchedulerError::from_engine(IndexingError::Checkpoint("x".to_string()));
        assert!(matches!(err, SchedulerError::Indexing(_)));
    }
}
