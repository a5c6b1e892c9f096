//! Change detection by modification timestamp.
//!
//! The store offers no change feed, so each pass polls every collection for
//! records whose `updated_at` is strictly after the checkpoint.

use futures::future::try_join_all;
use tracing::debug;

use chrono::{DateTime, Utc};
use keyword_storage::{DocumentStore, Filter};
use keyword_types::{Record, Schema};

use crate::error::IndexingError;

/// Changed records of one collection.
#[derive(Debug, Clone)]
pub struct CollectionChanges {
    pub collection: String,
    pub records: Vec<Record>,
}

/// Changed records grouped by collection, in schema declaration order.
///
/// Collections without changes are absent.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    entries: Vec<CollectionChanges>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collections with at least one change.
    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.collection.as_str())
    }

    /// Changed records of a collection.
    pub fn records(&self, collection: &str) -> Option<&[Record]> {
        self.entries
            .iter()
            .find(|e| e.collection == collection)
            .map(|e| e.records.as_slice())
    }

    pub fn contains(&self, collection: &str, id: &str) -> bool {
        self.records(collection)
            .is_some_and(|records| records.iter().any(|r| r.id == id))
    }

    /// Add a record, keeping collections in schema order.
    ///
    /// Returns false if the record was already present.
    pub fn add(&mut self, schema: &Schema, record: Record) -> bool {
        if self.contains(&record.collection, &record.id) {
            return false;
        }
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.collection == record.collection)
        {
            entry.records.push(record);
            return true;
        }

        let rank = |id: &str| schema.position(id).unwrap_or(usize::MAX);
        let new_rank = rank(&record.collection);
        let index = self
            .entries
            .iter()
            .position(|e| rank(&e.collection) > new_rank)
            .unwrap_or(self.entries.len());
        self.entries.insert(
            index,
            CollectionChanges {
                collection: record.collection.clone(),
                records: vec![record],
            },
        );
        true
    }

    /// Total number of changed records.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for ChangeSet {
    type Item = CollectionChanges;
    type IntoIter = std::vec::IntoIter<CollectionChanges>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Find every record modified strictly after `since`.
///
/// One query per collection, all issued concurrently. Any failing query
/// fails the whole detection.
pub async fn find_changed(
    store: &dyn DocumentStore,
    schema: &Schema,
    since: DateTime<Utc>,
) -> Result<ChangeSet, IndexingError> {
    let filter = Filter::updated_after(since);

    let queries = schema.collections().iter().map(|collection| {
        let filter = &filter;
        async move {
            let records = store.find(&collection.id, filter).await?;
            Ok::<_, IndexingError>(CollectionChanges {
                collection: collection.id.clone(),
                records,
            })
        }
    });

    let entries: Vec<CollectionChanges> = try_join_all(queries)
        .await?
        .into_iter()
        .filter(|changes| !changes.records.is_empty())
        .collect();

    for changes in &entries {
        debug!(
            collection = %changes.collection,
            count = changes.records.len(),
            since = %since,
            "Found changed records"
        );
    }

    Ok(ChangeSet { entries })
}
