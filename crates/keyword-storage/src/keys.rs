//! Key encoding and decoding for the RocksDB store.
//!
//! Key format: `rec:{collection}:{id}`
//! - collection: collection identifier (must not contain `:`)
//! - id: record identifier (ULID for records created by the store)
//!
//! Grouping by collection lets a collection be scanned with a single prefix
//! iteration.

use crate::error::StorageError;

/// Key for record storage
/// Format: rec:{collection}:{id}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKey {
    /// Owning collection id
    pub collection: String,
    /// Record id
    pub id: String,
}

impl RecordKey {
    /// Create a record key, rejecting collection ids that would break prefix scans.
    pub fn new(collection: &str, id: &str) -> Result<Self, StorageError> {
        validate_collection(collection)?;
        if id.is_empty() {
            return Err(StorageError::Key("Empty record id".to_string()));
        }
        Ok(Self {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }

    /// Encode key to bytes for storage
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("rec:{}:{}", self.collection, self.id).into_bytes()
    }

    /// Decode key from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;

        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("rec"), Some(collection), Some(id)) if !id.is_empty() => {
                Ok(Self::new(collection, id)?)
            }
            _ => Err(StorageError::Key(format!("Invalid record key format: {}", s))),
        }
    }

    /// Prefix covering every record of a collection
    pub fn collection_prefix(collection: &str) -> Result<Vec<u8>, StorageError> {
        validate_collection(collection)?;
        Ok(format!("rec:{}:", collection).into_bytes())
    }
}

fn validate_collection(collection: &str) -> Result<(), StorageError> {
    if collection.is_empty() || collection.contains(':') {
        return Err(StorageError::Key(format!(
            "Invalid collection id: {:?}",
            collection
        )));
    }
    Ok(())
}

/// Key for checkpoint entries
/// Format: checkpoint:{name}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointKey {
    /// Checkpoint owner (e.g., "keyword_reconciler")
    pub name: String,
}

impl CheckpointKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("checkpoint:{}", self.name).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key_roundtrip() {
        let key = RecordKey::new("ProjectModel", "01HQ3ZJ5T8W2").unwrap();
        let decoded = RecordKey::from_bytes(&key.to_bytes()).unwrap();
        assert_eq!(key, decoded);
    }

    #[test]
    fn test_record_key_within_collection_prefix() {
        let key = RecordKey::new("ProjectModel", "abc").unwrap();
        let prefix = RecordKey::collection_prefix("ProjectModel").unwrap();
        assert!(key.to_bytes().starts_with(&prefix));

        // A collection whose id extends another must not share its prefix
        let other = RecordKey::new("ProjectModelArchive", "abc").unwrap();
        assert!(!other.to_bytes().starts_with(&prefix));
    }

    #[test]
    fn test_invalid_keys() {
        assert!(RecordKey::new("Bad:Collection", "id").is_err());
        assert!(RecordKey::new("", "id").is_err());
        assert!(RecordKey::new("ProjectModel", "").is_err());
        assert!(RecordKey::from_bytes(b"evt:123:abc").is_err());
        assert!(RecordKey::from_bytes(b"rec:ProjectModel").is_err());
    }

    #[test]
    fn test_checkpoint_key() {
        let key = CheckpointKey::new("keyword_reconciler");
        assert_eq!(key.to_bytes(), b"checkpoint:keyword_reconciler".to_vec());
    }
}
