//! Record type shared by the storage layer and the keyword engine.
//!
//! A record belongs to exactly one collection. Its `keywords` array is a
//! derived projection: the engine rebuilds it from the record's own fields
//! and the labels of the records it references. The store, not the engine,
//! owns `updated_at`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Path under which the keyword projection is tracked for modification.
pub const KEYWORDS_PATH: &str = "keywords";

/// Modification path of a single keyword slot (`keywords.{position}`).
pub fn keyword_slot_path(position: usize) -> String {
    format!("{}.{}", KEYWORDS_PATH, position)
}

/// Slot position named by a modification path, if it names one.
pub fn keyword_slot(path: &str) -> Option<usize> {
    path.strip_prefix(KEYWORDS_PATH)?
        .strip_prefix('.')?
        .parse()
        .ok()
}

/// A single document in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record identifier; empty until first saved
    #[serde(default)]
    pub id: String,

    /// Owning collection id
    pub collection: String,

    /// Declared field values
    #[serde(default)]
    pub fields: Map<String, Value>,

    /// Derived keyword projection, one slot per keyword field
    #[serde(default)]
    pub keywords: Vec<Value>,

    /// Last modification time, maintained by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Paths changed since the record was loaded or last saved
    #[serde(skip)]
    modified: BTreeSet<String>,
}

impl Record {
    /// Create an empty, unsaved record.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            collection: collection.into(),
            fields: Map::new(),
            keywords: Vec::new(),
            updated_at: None,
            modified: BTreeSet::new(),
        }
    }

    /// Builder-style field assignment.
    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.set(field, value);
        self
    }

    /// Whether the record has never been persisted.
    pub fn is_new(&self) -> bool {
        self.id.is_empty()
    }

    /// Read a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Assign a field value and mark it modified.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        self.modified.insert(field.clone());
        self.fields.insert(field, value);
    }

    /// Remove a field and mark it modified.
    pub fn unset(&mut self, field: &str) {
        self.fields.remove(field);
        self.modified.insert(field.to_string());
    }

    /// Replace the whole keyword projection.
    pub fn set_keywords(&mut self, keywords: Vec<Value>) {
        self.keywords = keywords;
        self.mark_modified(KEYWORDS_PATH);
    }

    /// Overwrite a single keyword slot.
    ///
    /// The array is padded with nulls up to `len` (and at least `position + 1`)
    /// so records that were never projected still end up with the full shape.
    /// Only the slot is marked modified, so concurrent patches of other slots
    /// of the same record are kept by the store. Returns false if the slot
    /// already held `value`.
    pub fn set_keyword_slot(&mut self, position: usize, value: Value, len: usize) -> bool {
        let target_len = len.max(position + 1);
        let padded = self.keywords.len() < target_len;
        if padded {
            self.keywords.resize(target_len, Value::Null);
        }
        if !padded && self.keywords[position] == value {
            return false;
        }
        self.keywords[position] = value;
        self.mark_modified(keyword_slot_path(position));
        true
    }

    /// Tell the store that `path` changed shape and must be persisted.
    pub fn mark_modified(&mut self, path: impl Into<String>) {
        self.modified.insert(path.into());
    }

    pub fn is_modified(&self) -> bool {
        !self.modified.is_empty()
    }

    /// Paths changed since load or last save, in sorted order.
    pub fn modified_paths(&self) -> impl Iterator<Item = &str> {
        self.modified.iter().map(String::as_str)
    }

    /// Forget pending modifications. Stores call this after persisting.
    pub fn clear_modified(&mut self) {
        self.modified.clear();
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
