//! Storage collaborator contract consumed by the keyword engine.
//!
//! The engine never talks to a backend directly: it queries and persists
//! records through [`DocumentStore`]. Two properties of the contract matter
//! for reconciliation:
//!
//! - `save` persists only the paths a record marks as modified, so a sparse
//!   keyword patch does not clobber fields or slots written concurrently by
//!   others. A single slot is tracked as `keywords.{position}`.
//! - `SaveOptions::silent()` leaves `updated_at` untouched. Engine writes
//!   must be silent or they would show up as changes on the next pass.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use ulid::Ulid;

use keyword_types::{keyword_slot, Record, KEYWORDS_PATH};

use crate::error::StorageError;

/// Query predicate evaluated against records of one collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every record
    All,
    /// The record with this id
    Id(String),
    /// Records whose field equals the value
    FieldEquals { field: String, value: Value },
    /// Records modified strictly after the instant
    UpdatedAfter(DateTime<Utc>),
}

impl Filter {
    pub fn id(id: impl Into<String>) -> Self {
        Filter::Id(id.into())
    }

    pub fn field_equals(field: impl Into<String>, value: Value) -> Self {
        Filter::FieldEquals {
            field: field.into(),
            value,
        }
    }

    pub fn updated_after(since: DateTime<Utc>) -> Self {
        Filter::UpdatedAfter(since)
    }

    /// Evaluate the predicate.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::All => true,
            Filter::Id(id) => record.id == *id,
            Filter::FieldEquals { field, value } => record.get(field) == Some(value),
            Filter::UpdatedAfter(since) => record.updated_at.is_some_and(|ts| ts > *since),
        }
    }
}

/// Options for [`DocumentStore::save`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Leave the record's modification timestamp unchanged
    pub suppress_timestamp_update: bool,
}

impl SaveOptions {
    /// A write that does not count as a change.
    pub fn silent() -> Self {
        Self {
            suppress_timestamp_update: true,
        }
    }
}

/// Document storage used by the keyword engine.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All records of `collection` matching `filter`, ordered by id.
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Record>, StorageError>;

    /// The first record of `collection` matching `filter`.
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Record>, StorageError> {
        Ok(self.find(collection, filter).await?.into_iter().next())
    }

    /// Persist a record.
    ///
    /// New records are written whole and receive an id. Existing records get
    /// only their modified paths applied. A record with nothing modified is
    /// not written. On return the record's modifications are cleared and its
    /// `updated_at` reflects what was stored.
    async fn save(&self, record: &mut Record, options: SaveOptions) -> Result<(), StorageError>;

    /// Read an opaque checkpoint blob.
    async fn get_checkpoint(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Write an opaque checkpoint blob.
    async fn put_checkpoint(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Name of this store for logging.
    fn name(&self) -> &str;
}

/// Compute the record to persist for a save.
///
/// Returns `None` when there is nothing to write. Shared by the stores so
/// they apply identical timestamp and merge semantics.
pub(crate) fn prepare_save(
    existing: Option<Record>,
    record: &mut Record,
    options: SaveOptions,
) -> Option<Record> {
    let now = Utc::now();

    let merged = match existing {
        None => {
            if record.id.is_empty() {
                record.id = Ulid::new().to_string();
            }
            if !options.suppress_timestamp_update || record.updated_at.is_none() {
                record.updated_at = Some(now);
            }
            let mut stored = record.clone();
            stored.clear_modified();
            stored
        }
        Some(mut stored) => {
            if !record.is_modified() {
                return None;
            }
            for path in record.modified_paths() {
                if path == KEYWORDS_PATH {
                    stored.keywords = record.keywords.clone();
                } else if let Some(position) = keyword_slot(path) {
                    // Patch the slot onto the stored array, not the caller's copy
                    let len = record.keywords.len().max(position + 1);
                    if stored.keywords.len() < len {
                        stored.keywords.resize(len, Value::Null);
                    }
                    stored.keywords[position] =
                        record.keywords.get(position).cloned().unwrap_or(Value::Null);
                } else {
                    match record.fields.get(path) {
                        Some(value) => {
                            stored.fields.insert(path.to_string(), value.clone());
                        }
                        None => {
                            stored.fields.remove(path);
                        }
                    }
                }
            }
            if !options.suppress_timestamp_update {
                stored.updated_at = Some(now);
            }
            stored
        }
    };

    record.updated_at = merged.updated_at;
    record.clear_modified();
    Some(merged)
}
