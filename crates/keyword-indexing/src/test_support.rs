//! Shared fixtures for engine tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use keyword_storage::{DocumentStore, Filter, MemoryStore, SaveOptions, StorageError};
use keyword_types::{CollectionDescriptor, FieldSpec, FieldType, Record, Schema};

use crate::engine::{EngineConfig, KeywordEngine};

/// Country <- Project <- ProjectContact, with Project mixing local and
/// reference keyword fields.
pub fn schema() -> Schema {
    Schema::new(vec![
        CollectionDescriptor::new("CountryModel", "Country")
            .with_field(FieldSpec::local("label", FieldType::String).keyword()),
        CollectionDescriptor::new("ProjectModel", "Project")
            .with_field(FieldSpec::local("name", FieldType::String).keyword())
            .with_field(FieldSpec::reference("country", "Country").keyword())
            .with_field(FieldSpec::local("ref", FieldType::String).keyword())
            .with_field(FieldSpec::local("budget", FieldType::Number)),
        CollectionDescriptor::new("ProjectContactModel", "ProjectContact")
            .with_field(FieldSpec::local("name", FieldType::String).keyword())
            .with_field(FieldSpec::reference("project", "Project").keyword())
            .with_field(FieldSpec::reference("country", "Country").keyword())
            .with_field(FieldSpec::reference("billing_country", "Country").keyword()),
    ])
    .expect("valid test schema")
}

pub fn engine(store: Arc<dyn DocumentStore>) -> KeywordEngine {
    KeywordEngine::new(store, Arc::new(schema()), EngineConfig::default())
        .expect("engine builds")
}

/// Insert a record through a normal (timestamped) save.
pub async fn insert(store: &MemoryStore, collection: &str, fields: &[(&str, Value)]) -> Record {
    let mut record = Record::new(collection);
    for (name, value) in fields {
        record.set(*name, value.clone());
    }
    store
        .save(&mut record, SaveOptions::default())
        .await
        .expect("insert");
    record
}

/// Update fields of an existing record through a normal save.
pub async fn update(store: &MemoryStore, record: &mut Record, fields: &[(&str, Value)]) {
    for (name, value) in fields {
        record.set(*name, value.clone());
    }
    store
        .save(record, SaveOptions::default())
        .await
        .expect("update");
}

/// Store wrapper that injects failures.
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    failing_saves: Mutex<HashSet<String>>,
    failing_finds: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            failing_saves: Mutex::new(HashSet::new()),
            failing_finds: AtomicBool::new(false),
        }
    }

    pub fn fail_saves_of(&self, id: &str) {
        self.failing_saves.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_finds(&self) {
        self.failing_finds.store(true, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.failing_saves.lock().unwrap().clear();
        self.failing_finds.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Record>, StorageError> {
        if self.failing_finds.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("find unavailable".to_string()));
        }
        self.inner.find(collection, filter).await
    }

    async fn save(&self, record: &mut Record, options: SaveOptions) -> Result<(), StorageError> {
        if self.failing_saves.lock().unwrap().contains(&record.id) {
            return Err(StorageError::Backend(format!("save rejected for {}", record.id)));
        }
        self.inner.save(record, options).await
    }

    async fn get_checkpoint(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.get_checkpoint(name).await
    }

    async fn put_checkpoint(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.inner.put_checkpoint(name, bytes).await
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

/// Store wrapper that yields to the scheduler before every call, so
/// concurrent cascades interleave their reads and writes.
pub struct YieldingStore {
    inner: Arc<MemoryStore>,
}

impl YieldingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl DocumentStore for YieldingStore {
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Record>, StorageError> {
        tokio::task::yield_now().await;
        let found = self.inner.find(collection, filter).await;
        tokio::task::yield_now().await;
        found
    }

    async fn save(&self, record: &mut Record, options: SaveOptions) -> Result<(), StorageError> {
        tokio::task::yield_now().await;
        self.inner.save(record, options).await
    }

    async fn get_checkpoint(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.get_checkpoint(name).await
    }

    async fn put_checkpoint(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.inner.put_checkpoint(name, bytes).await
    }

    fn name(&self) -> &str {
        "yielding"
    }
}
