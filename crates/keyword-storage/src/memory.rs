//! In-memory document store for tests and demos.

use async_trait::async_trait;
use dashmap::DashMap;

use keyword_types::Record;

use crate::error::StorageError;
use crate::store::{prepare_save, DocumentStore, Filter, SaveOptions};

/// Document store backed by concurrent hash maps.
///
/// Applies the same merge and timestamp rules as the RocksDB store.
#[derive(Default)]
pub struct MemoryStore {
    /// Records keyed by (collection, id)
    records: DashMap<(String, String), Record>,
    checkpoints: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all collections.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove a record, returning it if present.
    pub fn remove(&self, collection: &str, id: &str) -> Option<Record> {
        self.records
            .remove(&(collection.to_string(), id.to_string()))
            .map(|(_, record)| record)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Record>, StorageError> {
        if let Filter::Id(id) = filter {
            let key = (collection.to_string(), id.clone());
            return Ok(self.records.get(&key).map(|r| r.value().clone()).into_iter().collect());
        }

        let mut matches: Vec<Record> = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == collection && filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches)
    }

    async fn save(&self, record: &mut Record, options: SaveOptions) -> Result<(), StorageError> {
        if record.collection.is_empty() {
            return Err(StorageError::Key("Record has no collection".to_string()));
        }

        if record.is_new() {
            if let Some(stored) = prepare_save(None, record, options) {
                self.records
                    .insert((stored.collection.clone(), stored.id.clone()), stored);
            }
            return Ok(());
        }

        // Hold the entry for the whole read-modify-write
        let key = (record.collection.clone(), record.id.clone());
        match self.records.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                if let Some(stored) = prepare_save(Some(entry.get().clone()), record, options) {
                    entry.insert(stored);
                }
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                if let Some(stored) = prepare_save(None, record, options) {
                    entry.insert(stored);
                }
            }
        }
        Ok(())
    }

    async fn get_checkpoint(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.checkpoints.get(name).map(|bytes| bytes.value().clone()))
    }

    async fn put_checkpoint(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.checkpoints.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
