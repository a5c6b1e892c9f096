//! run-once against a real RocksDB directory and schema file.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use keyword_daemon::{load_schema, read_checkpoint, run_once};
use keyword_storage::{DocumentStore, Filter, SaveOptions, Storage};
use keyword_types::{Record, Settings};

fn settings(dir: &Path) -> Settings {
    let schema_path = dir.join("schema.toml");
    fs::copy(
        Path::new(env!("CARGO_MANIFEST_DIR")).join("schema.example.toml"),
        &schema_path,
    )
    .unwrap();
    Settings {
        db_path: dir.join("db").to_string_lossy().to_string(),
        schema_path: schema_path.to_string_lossy().to_string(),
        ..Default::default()
    }
}

#[test]
fn test_example_schema_loads() {
    let dir = TempDir::new().unwrap();
    let schema = load_schema(&settings(dir.path())).unwrap();
    assert_eq!(schema.len(), 3);
    assert_eq!(
        schema.collection("ProjectContactModel").unwrap().label.attributes,
        vec!["full_name".to_string(), "email".to_string()]
    );
}

#[tokio::test]
async fn test_run_once_reconciles_existing_records() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());

    let (project_id, contact_id) = {
        let storage = Arc::new(Storage::open(&settings.expanded_db_path()).unwrap());

        let mut nz = Record::new("CountryModel").with("label", json!("New Zealand"));
        storage.save(&mut nz, SaveOptions::default()).await.unwrap();

        let mut project = Record::new("ProjectModel")
            .with("name", json!("Harbour Bridge"))
            .with("ref", json!("P-7"))
            .with("country", json!(nz.id));
        storage.save(&mut project, SaveOptions::default()).await.unwrap();

        let mut contact = Record::new("ProjectContactModel")
            .with("full_name", json!("Ann Smith"))
            .with("project", json!(project.id));
        storage.save(&mut contact, SaveOptions::default()).await.unwrap();

        (project.id, contact.id)
    };

    let report = run_once(&settings, None).await.unwrap();
    assert_eq!(report.total_processed(), 3);
    assert!(!report.has_failures());

    let storage = Storage::open(&settings.expanded_db_path()).unwrap();
    let project = storage
        .find_one("ProjectModel", &Filter::id(project_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        project.keywords,
        vec![
            json!("Harbour Bridge"),
            json!("P-7"),
            serde_json::Value::Null,
            serde_json::Value::Null,
            json!("New Zealand"),
        ]
    );

    let contact = storage
        .find_one("ProjectContactModel", &Filter::id(contact_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        contact.keywords,
        vec![json!("Ann Smith"), serde_json::Value::Null, json!("Harbour Bridge")]
    );
    drop(storage);

    assert!(read_checkpoint(&settings).unwrap().is_none());
}
