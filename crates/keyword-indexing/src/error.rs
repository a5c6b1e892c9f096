//! Error types for the keyword engine.

use keyword_storage::StorageError;
use keyword_types::SchemaError;
use thiserror::Error;

/// Errors that can occur while reconciling keywords
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Storage operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Schema is inconsistent
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A record names a collection the engine was not built for
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// Checkpoint load/save issues
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// JSON encoding/decoding errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for IndexingError {
    fn from(err: serde_json::Error) -> Self {
        IndexingError::Serialization(err.to_string())
    }
}
