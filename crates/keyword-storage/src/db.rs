//! RocksDB-backed document store.
//!
//! Provides:
//! - Database open/close with column family setup
//! - Per-collection prefix scans for `find`
//! - Point reads for id lookups
//! - Read-modify-write saves serialized behind a write lock
//! - Checkpoint slots for crash recovery

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rocksdb::{Direction, IteratorMode, Options, DB};
use tracing::{debug, info};

use keyword_types::Record;

use crate::column_families::{build_cf_descriptors, CF_CHECKPOINTS, CF_RECORDS};
use crate::error::StorageError;
use crate::keys::{CheckpointKey, RecordKey};
use crate::store::{prepare_save, DocumentStore, Filter, SaveOptions};

/// RocksDB document store
pub struct Storage {
    db: DB,
    /// Serializes read-modify-write cycles in `save`
    write_lock: Mutex<()>,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(4);

        let cf_descriptors = build_cf_descriptors();
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    /// Read a single record by id
    pub fn get_record(&self, collection: &str, id: &str) -> Result<Option<Record>, StorageError> {
        let cf = self.cf(CF_RECORDS)?;
        let key = RecordKey::new(collection, id)?;
        match self.db.get_cf(cf, key.to_bytes())? {
            Some(bytes) => Ok(Some(Record::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Scan every record of a collection, keeping those that match
    pub fn scan_collection(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Record>, StorageError> {
        let cf = self.cf(CF_RECORDS)?;
        let prefix = RecordKey::collection_prefix(collection)?;

        let mut results = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));

        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let record = Record::from_bytes(&value)?;
            if filter.matches(&record) {
                results.push(record);
            }
        }

        Ok(results)
    }

    /// Persist a record synchronously
    pub fn save_record(
        &self,
        record: &mut Record,
        options: SaveOptions,
    ) -> Result<(), StorageError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StorageError::Backend(format!("write lock poisoned: {}", e)))?;

        let existing = if record.is_new() {
            None
        } else {
            self.get_record(&record.collection, &record.id)?
        };

        let Some(stored) = prepare_save(existing, record, options) else {
            debug!(
                collection = %record.collection,
                id = %record.id,
                "Nothing modified, skipping write"
            );
            return Ok(());
        };

        let cf = self.cf(CF_RECORDS)?;
        let key = RecordKey::new(&stored.collection, &stored.id)?;
        self.db.put_cf(cf, key.to_bytes(), stored.to_bytes()?)?;
        debug!(
            collection = %stored.collection,
            id = %stored.id,
            silent = options.suppress_timestamp_update,
            "Stored record"
        );
        Ok(())
    }

    /// Delete a record
    pub fn delete_record(&self, collection: &str, id: &str) -> Result<(), StorageError> {
        let cf = self.cf(CF_RECORDS)?;
        let key = RecordKey::new(collection, id)?;
        self.db.delete_cf(cf, key.to_bytes())?;
        Ok(())
    }

    /// Store a checkpoint for crash recovery
    pub fn put_checkpoint_bytes(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf(CF_CHECKPOINTS)?;
        let key = CheckpointKey::new(name);
        self.db.put_cf(cf, key.to_bytes(), bytes)?;
        Ok(())
    }

    /// Get a checkpoint for crash recovery
    pub fn get_checkpoint_bytes(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let cf = self.cf(CF_CHECKPOINTS)?;
        let key = CheckpointKey::new(name);
        Ok(self.db.get_cf(cf, key.to_bytes())?)
    }

    /// Flush all memtables to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for Storage {
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Record>, StorageError> {
        match filter {
            Filter::Id(id) => Ok(self.get_record(collection, id)?.into_iter().collect()),
            _ => self.scan_collection(collection, filter),
        }
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Record>, StorageError> {
        match filter {
            Filter::Id(id) => self.get_record(collection, id),
            _ => Ok(self.scan_collection(collection, filter)?.into_iter().next()),
        }
    }

    async fn save(&self, record: &mut Record, options: SaveOptions) -> Result<(), StorageError> {
        self.save_record(record, options)
    }

    async fn get_checkpoint(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.get_checkpoint_bytes(name)
    }

    async fn put_checkpoint(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.put_checkpoint_bytes(name, bytes)
    }

    fn name(&self) -> &str {
        "rocksdb"
    }
}
