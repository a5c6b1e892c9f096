//! End-to-end test infrastructure for keyword-sync.
//!
//! Provides a shared TestHarness and helper functions for E2E tests
//! covering change detection, projection, cascade and the reconciler loop
//! over a real RocksDB store.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use keyword_indexing::{EngineConfig, KeywordEngine};
use keyword_scheduler::{Reconciler, ReconcilerConfig};
use keyword_storage::{DocumentStore, SaveOptions, Storage};
use keyword_types::{CollectionDescriptor, FieldSpec, FieldType, LabelRule, Record, Schema};

pub const COUNTRY: &str = "CountryModel";
pub const PROJECT: &str = "ProjectModel";
pub const CONTACT: &str = "ProjectContactModel";

/// Country <- Project <- ProjectContact.
///
/// Project keywords are `[name, ref, summary, status, country]`, so a
/// country label lands in slot 4. Contact keywords are
/// `[full_name, email, project]`.
pub fn schema() -> Schema {
    Schema::new(vec![
        CollectionDescriptor::new(COUNTRY, "Country")
            .with_field(FieldSpec::local("label", FieldType::String).keyword())
            .with_field(FieldSpec::local("iso_code", FieldType::String)),
        CollectionDescriptor::new(PROJECT, "Project")
            .with_field(FieldSpec::local("name", FieldType::String).keyword())
            .with_field(FieldSpec::local("ref", FieldType::String).keyword())
            .with_field(FieldSpec::local("summary", FieldType::String).keyword())
            .with_field(FieldSpec::local("status", FieldType::String).keyword())
            .with_field(FieldSpec::reference("country", "Country").keyword())
            .with_field(FieldSpec::local("budget", FieldType::Number)),
        CollectionDescriptor::new(CONTACT, "ProjectContact")
            .with_field(FieldSpec::local("full_name", FieldType::String).keyword())
            .with_field(FieldSpec::local("email", FieldType::String).keyword())
            .with_field(FieldSpec::reference("project", "Project").keyword())
            .with_label_rule(LabelRule {
                attributes: vec!["full_name".to_string(), "email".to_string()],
            }),
    ])
    .expect("valid e2e schema")
}

/// Shared test harness for E2E tests.
///
/// Owns a temp directory holding a RocksDB store and the schema above.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Shared storage instance
    pub storage: Arc<Storage>,
    pub schema: Arc<Schema>,
}

impl TestHarness {
    /// Create a new test harness with temp directory and storage.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let storage =
            Arc::new(Storage::open(temp_dir.path()).expect("Failed to open test storage"));

        Self {
            _temp_dir: temp_dir,
            storage,
            schema: Arc::new(schema()),
        }
    }

    /// The storage as the engine sees it.
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.storage.clone()
    }

    pub fn engine(&self) -> Arc<KeywordEngine> {
        let engine = KeywordEngine::new(self.store(), self.schema.clone(), EngineConfig::default())
            .expect("Failed to build engine");
        Arc::new(engine)
    }

    /// A reconciler with no timer, driven by `tick`.
    pub async fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.engine(), ReconcilerConfig::default())
            .await
            .expect("Failed to build reconciler")
    }

    /// Insert a record through a normal (timestamped) save.
    pub async fn insert(&self, collection: &str, fields: &[(&str, Value)]) -> Record {
        let mut record = Record::new(collection);
        for (name, value) in fields {
            record.set(*name, value.clone());
        }
        self.storage
            .save(&mut record, SaveOptions::default())
            .await
            .expect("Failed to insert record");
        record
    }

    /// Update fields of a stored record through a normal save.
    pub async fn update(&self, record: &Record, fields: &[(&str, Value)]) -> Record {
        let mut record = self.reload(record);
        for (name, value) in fields {
            record.set(*name, value.clone());
        }
        self.storage
            .save(&mut record, SaveOptions::default())
            .await
            .expect("Failed to update record");
        record
    }

    /// Read the stored version of a record.
    pub fn reload(&self, record: &Record) -> Record {
        self.storage
            .get_record(&record.collection, &record.id)
            .expect("Failed to read record")
            .expect("Record disappeared")
    }

    /// Stored keyword array of a record.
    pub fn keywords(&self, record: &Record) -> Vec<Value> {
        self.reload(record).keywords
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Let the clock move past the last stored timestamp.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}
