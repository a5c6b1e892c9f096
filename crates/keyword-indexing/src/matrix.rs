//! Reverse reference index.
//!
//! References are one-directional: a project knows its country, a country
//! does not know its projects. The reference matrix is the transpose of the
//! keyword map's reference fields, so a changed record can find every slot
//! that displays its label.

use std::collections::HashMap;

use serde::Serialize;

use keyword_types::{Schema, SchemaError};

use crate::fields::KeywordMap;

/// A keyword slot in another collection that displays a referenced label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// Collection holding the reference field
    pub collection: String,
    /// Reference field name
    pub field: String,
    /// Keyword slot the field occupies
    pub position: usize,
}

/// Map from a collection id to every reference pointing at it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReferenceMatrix {
    #[serde(flatten)]
    by_target: HashMap<String, Vec<Reference>>,
}

impl ReferenceMatrix {
    /// Build the matrix from a schema and its keyword map.
    ///
    /// Every collection gets an entry, empty when nothing references it.
    /// Self-references are included. Fails if any reference field targets a
    /// model that is not part of the schema.
    pub fn build(schema: &Schema, keyword_map: &KeywordMap) -> Result<Self, SchemaError> {
        let mut by_target: HashMap<String, Vec<Reference>> = schema
            .collections()
            .iter()
            .map(|c| (c.id.clone(), Vec::new()))
            .collect();

        // Visit referencing collections in declaration order so entries are stable
        for referencing in schema.collections() {
            let fields = keyword_map.fields(&referencing.id).unwrap_or_default();
            for field in fields {
                let Some(target) = field.target() else {
                    continue;
                };
                let target_collection =
                    schema
                        .collection_by_model(target)
                        .ok_or_else(|| SchemaError::UnknownTarget {
                            collection: referencing.id.clone(),
                            field: field.name.clone(),
                            target: target.to_string(),
                        })?;

                by_target
                    .entry(target_collection.id.clone())
                    .or_default()
                    .push(Reference {
                        collection: referencing.id.clone(),
                        field: field.name.clone(),
                        position: field.position,
                    });
            }
        }

        Ok(Self { by_target })
    }

    /// References pointing at `collection`; empty for unknown collections.
    pub fn referencing(&self, collection: &str) -> &[Reference] {
        self.by_target
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Reference])> {
        self.by_target
            .iter()
            .map(|(id, refs)| (id.as_str(), refs.as_slice()))
    }

    /// Total number of reference entries.
    pub fn reference_count(&self) -> usize {
        self.by_target.values().map(Vec::len).sum()
    }
}
