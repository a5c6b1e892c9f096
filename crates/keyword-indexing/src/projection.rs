//! Full recomputation of a record's own keyword array.
//!
//! Each keyword field writes its own slot: local fields copy the record's
//! value, reference fields resolve the referenced record's display label.
//! The whole array is replaced, so stale values from earlier shapes never
//! survive a recompute.

use futures::future::try_join_all;
use serde_json::Value;
use tracing::debug;

use keyword_storage::{Filter, SaveOptions};
use keyword_types::Record;

use crate::engine::KeywordEngine;
use crate::error::IndexingError;
use crate::fields::FieldKind;

impl KeywordEngine {
    /// Compute the keyword array a record should hold.
    ///
    /// Reference lookups run concurrently. Unset references and references
    /// to records that do not exist yield null.
    pub async fn compute_keywords(&self, record: &Record) -> Result<Vec<Value>, IndexingError> {
        let fields = self
            .keyword_map
            .fields(&record.collection)
            .ok_or_else(|| IndexingError::UnknownCollection(record.collection.clone()))?;

        let mut keywords = vec![Value::Null; fields.len()];
        let mut lookups = Vec::new();

        for field in fields {
            match &field.kind {
                FieldKind::Local => {
                    keywords[field.position] =
                        record.get(&field.name).cloned().unwrap_or(Value::Null);
                }
                FieldKind::Reference { target } => {
                    let value = record.get(&field.name);
                    lookups.push(async move {
                        let label = self.resolve_label(target, value).await?;
                        Ok::<_, IndexingError>((field.position, label))
                    });
                }
            }
        }

        for (position, label) in try_join_all(lookups).await? {
            keywords[position] = label;
        }

        Ok(keywords)
    }

    /// Display label of the record `value` points at in the `target` model.
    async fn resolve_label(
        &self,
        target: &str,
        value: Option<&Value>,
    ) -> Result<Value, IndexingError> {
        let id = match value {
            Some(Value::String(id)) if !id.is_empty() => id,
            _ => return Ok(Value::Null),
        };
        let Some(collection) = self.schema.collection_by_model(target) else {
            return Ok(Value::Null);
        };

        let referenced = self
            .store
            .find_one(&collection.id, &Filter::id(id.clone()))
            .await?;

        Ok(referenced
            .map(|r| collection.display_label(&r))
            .unwrap_or(Value::Null))
    }

    /// Recompute a record's keyword array and persist it silently.
    ///
    /// Returns whether the stored array changed.
    pub async fn recompute_local(&self, record: &mut Record) -> Result<bool, IndexingError> {
        let keywords = self.compute_keywords(record).await?;
        if record.keywords == keywords {
            return Ok(false);
        }

        record.set_keywords(keywords);
        self.store.save(record, SaveOptions::silent()).await?;

        debug!(
            collection = %record.collection,
            record_id = %record.id,
            width = record.keywords.len(),
            "Recomputed keywords"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{engine, insert, update};
    use keyword_storage::{DocumentStore, Filter, MemoryStore};
    use keyword_types::Record;
    use serde_json::{json, Value};
    use std::sync::Arc;

    use crate::error::IndexingError;

    async fn reload(store: &MemoryStore, record: &Record) -> Record {
        store
            .find_one(&record.collection, &Filter::id(record.id.clone()))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_slots_follow_declaration_order() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        let nz = insert(&store, "CountryModel", &[("label", json!("New Zealand"))]).await;
        let mut project = insert(
            &store,
            "ProjectModel",
            &[
                ("name", json!("Harbour")),
                ("country", json!(nz.id)),
                ("ref", json!("P-1")),
                ("budget", json!(100)),
            ],
        )
        .await;

        assert!(engine.recompute_local(&mut project).await.unwrap());
        assert_eq!(
            reload(&store, &project).await.keywords,
            vec![json!("Harbour"), json!("New Zealand"), json!("P-1")]
        );
    }

    #[tokio::test]
    async fn test_missing_values_yield_null() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        let mut unset = insert(&store, "ProjectModel", &[("ref", json!("P-2"))]).await;
        engine.recompute_local(&mut unset).await.unwrap();
        assert_eq!(
            reload(&store, &unset).await.keywords,
            vec![Value::Null, Value::Null, json!("P-2")]
        );

        let mut dangling = insert(
            &store,
            "ProjectModel",
            &[("name", json!("Lost")), ("country", json!("01DELETED"))],
        )
        .await;
        engine.recompute_local(&mut dangling).await.unwrap();
        assert_eq!(
            reload(&store, &dangling).await.keywords,
            vec![json!("Lost"), Value::Null, Value::Null]
        );

        let mut explicit_null = insert(
            &store,
            "ProjectModel",
            &[("name", json!("Null")), ("country", Value::Null)],
        )
        .await;
        engine.recompute_local(&mut explicit_null).await.unwrap();
        assert_eq!(reload(&store, &explicit_null).await.keywords[1], Value::Null);
    }

    #[tokio::test]
    async fn test_recompute_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        let nz = insert(&store, "CountryModel", &[("label", json!("NZ"))]).await;
        let mut project = insert(
            &store,
            "ProjectModel",
            &[("name", json!("Harbour")), ("country", json!(nz.id))],
        )
        .await;

        assert!(engine.recompute_local(&mut project).await.unwrap());
        let first = reload(&store, &project).await;

        let mut again = first.clone();
        assert!(!engine.recompute_local(&mut again).await.unwrap());
        assert_eq!(reload(&store, &project).await, first);
    }

    #[tokio::test]
    async fn test_recompute_is_silent() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        let mut project = insert(&store, "ProjectModel", &[("name", json!("Harbour"))]).await;
        let stamped = project.updated_at;

        engine.recompute_local(&mut project).await.unwrap();
        assert_eq!(reload(&store, &project).await.updated_at, stamped);
    }

    #[tokio::test]
    async fn test_recompute_overwrites_stale_array() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        let mut project = insert(&store, "ProjectModel", &[("name", json!("Old"))]).await;
        project.set_keywords(vec![json!("x"), json!("y"), json!("z"), json!("extra")]);
        update(&store, &mut project, &[("name", json!("New"))]).await;

        engine.recompute_local(&mut project).await.unwrap();
        assert_eq!(
            reload(&store, &project).await.keywords,
            vec![json!("New"), Value::Null, Value::Null]
        );
    }

    #[tokio::test]
    async fn test_label_falls_back_to_name() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        let project = insert(&store, "ProjectModel", &[("name", json!("Harbour"))]).await;
        let mut contact = insert(
            &store,
            "ProjectContactModel",
            &[("name", json!("Ann")), ("project", json!(project.id))],
        )
        .await;

        let keywords = engine.compute_keywords(&contact).await.unwrap();
        assert_eq!(keywords, vec![json!("Ann"), json!("Harbour"), Value::Null, Value::Null]);
        assert!(engine.recompute_local(&mut contact).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_collection_rejected() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store);
        let record = Record::new("GhostModel");
        assert!(matches!(
            engine.compute_keywords(&record).await,
            Err(IndexingError::UnknownCollection(_))
        ));
    }
}
