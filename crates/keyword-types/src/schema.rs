//! Collection schema declarations.
//!
//! A collection declares its fields in order. Fields flagged `keyword`
//! contribute to the derived keyword projection; an `object_id` field with a
//! `ref` points at a record in the collection whose model name matches.
//!
//! Schemas are static for the process lifetime. They are typically loaded
//! from a TOML file:
//!
//! ```toml
//! [[collections]]
//! id = "CountryModel"
//! model_name = "Country"
//!
//! [[collections.fields]]
//! name = "label"
//! keyword = true
//!
//! [[collections]]
//! id = "ProjectModel"
//! model_name = "Project"
//!
//! [[collections.fields]]
//! name = "country"
//! type = "object_id"
//! ref = "Country"
//! keyword = true
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{KeywordError, SchemaError};
use crate::record::Record;

/// Declared storage type of a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Boolean,
    Date,
    Mixed,
    /// Identifier of a record in another collection
    ObjectId,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "string"),
            FieldType::Number => write!(f, "number"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Date => write!(f, "date"),
            FieldType::Mixed => write!(f, "mixed"),
            FieldType::ObjectId => write!(f, "object_id"),
        }
    }
}

/// A single field declaration, in the shape the storage layer exposes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field identifier
    pub name: String,

    /// Declared storage type
    #[serde(rename = "type", default)]
    pub field_type: FieldType,

    /// Whether the field contributes to the keyword projection
    #[serde(default)]
    pub keyword: bool,

    /// Target model name for object id fields
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl FieldSpec {
    /// A scalar field.
    pub fn local(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            keyword: false,
            reference: None,
        }
    }

    /// An object id field pointing at `target` (a model name).
    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::ObjectId,
            keyword: false,
            reference: Some(target.into()),
        }
    }

    /// Flag the field as keyword-bearing.
    pub fn keyword(mut self) -> Self {
        self.keyword = true;
        self
    }
}

/// Rule used to turn a record into human-readable text.
///
/// Attributes are tried in order; the first one holding a non-null,
/// non-empty value wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRule {
    #[serde(default = "default_label_attributes")]
    pub attributes: Vec<String>,
}

fn default_label_attributes() -> Vec<String> {
    vec!["label".to_string(), "name".to_string()]
}

impl Default for LabelRule {
    fn default() -> Self {
        Self {
            attributes: default_label_attributes(),
        }
    }
}

impl LabelRule {
    /// Resolve the display label of a record. Null when no attribute is set.
    pub fn resolve(&self, record: &Record) -> Value {
        self.attributes
            .iter()
            .filter_map(|attr| record.get(attr))
            .find(|value| match value {
                Value::Null => false,
                Value::String(s) => !s.is_empty(),
                _ => true,
            })
            .cloned()
            .unwrap_or(Value::Null)
    }
}

/// Static description of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    /// Collection identifier (e.g. `ProjectModel`)
    pub id: String,

    /// Name that reference declarations use to target this collection
    pub model_name: String,

    /// Field declarations in declaration order
    #[serde(default)]
    pub fields: Vec<FieldSpec>,

    /// Display label rule
    #[serde(default)]
    pub label: LabelRule,
}

impl CollectionDescriptor {
    pub fn new(id: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model_name: model_name.into(),
            fields: Vec::new(),
            label: LabelRule::default(),
        }
    }

    /// Append a field declaration.
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Replace the display label rule.
    pub fn with_label_rule(mut self, label: LabelRule) -> Self {
        self.label = label;
        self
    }

    /// Display label of a record of this collection.
    pub fn display_label(&self, record: &Record) -> Value {
        self.label.resolve(record)
    }
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    collections: Vec<CollectionDescriptor>,
}

/// The validated set of connected collections.
#[derive(Debug, Clone)]
pub struct Schema {
    collections: Vec<CollectionDescriptor>,
    by_id: HashMap<String, usize>,
    by_model: HashMap<String, usize>,
}

impl Schema {
    /// Validate and index a set of collection descriptors.
    ///
    /// Declaration order of the collections is preserved and is the order in
    /// which reconciliation passes visit them.
    pub fn new(collections: Vec<CollectionDescriptor>) -> Result<Self, SchemaError> {
        let mut by_id = HashMap::with_capacity(collections.len());
        let mut by_model = HashMap::with_capacity(collections.len());

        for (idx, collection) in collections.iter().enumerate() {
            if by_id.insert(collection.id.clone(), idx).is_some() {
                return Err(SchemaError::DuplicateCollection(collection.id.clone()));
            }
            if by_model.insert(collection.model_name.clone(), idx).is_some() {
                return Err(SchemaError::DuplicateModelName(
                    collection.model_name.clone(),
                ));
            }
            for field in &collection.fields {
                if field.field_type == FieldType::ObjectId && field.reference.is_none() {
                    return Err(SchemaError::MissingRef {
                        collection: collection.id.clone(),
                        field: field.name.clone(),
                    });
                }
            }
        }

        Ok(Self {
            collections,
            by_id,
            by_model,
        })
    }

    /// Parse a schema from TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self, KeywordError> {
        let file: SchemaFile = toml::from_str(s)?;
        Ok(Self::new(file.collections)?)
    }

    /// Load a schema from a TOML file.
    pub fn load(path: &Path) -> Result<Self, KeywordError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// All collections in declaration order.
    pub fn collections(&self) -> &[CollectionDescriptor] {
        &self.collections
    }

    /// Look up a collection by its identifier.
    pub fn collection(&self, id: &str) -> Option<&CollectionDescriptor> {
        self.by_id.get(id).map(|&idx| &self.collections[idx])
    }

    /// Look up a collection by the model name references use.
    pub fn collection_by_model(&self, model_name: &str) -> Option<&CollectionDescriptor> {
        self.by_model.get(model_name).map(|&idx| &self.collections[idx])
    }

    /// Declaration index of a collection.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCHEMA: &str = r#"
[[collections]]
id = "CountryModel"
model_name = "Country"

[[collections.fields]]
name = "label"
keyword = true

[[collections]]
id = "ProjectModel"
model_name = "Project"

[[collections.fields]]
name = "name"
keyword = true

[[collections.fields]]
name = "budget"
type = "number"

[[collections.fields]]
name = "country"
type = "object_id"
ref = "Country"
keyword = true
"#;

    #[test]
    fn test_parse_schema_toml() {
        let schema = Schema::from_toml_str(SCHEMA).unwrap();
        assert_eq!(schema.len(), 2);

        let project = schema.collection("ProjectModel").unwrap();
        assert_eq!(project.model_name, "Project");
        assert_eq!(project.fields.len(), 3);
        assert_eq!(project.fields[1].field_type, FieldType::Number);
        assert!(!project.fields[1].keyword);
        assert_eq!(project.fields[2].reference.as_deref(), Some("Country"));
        assert_eq!(project.label, LabelRule::default());

        let country = schema.collection_by_model("Country").unwrap();
        assert_eq!(country.id, "CountryModel");
    }

    #[test]
    fn test_collections_keep_declaration_order() {
        let schema = Schema::from_toml_str(SCHEMA).unwrap();
        let ids: Vec<&str> = schema.collections().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["CountryModel", "ProjectModel"]);
    }

    #[test]
    fn test_duplicate_collection_rejected() {
        let result = Schema::new(vec![
            CollectionDescriptor::new("A", "A"),
            CollectionDescriptor::new("A", "B"),
        ]);
        assert_eq!(
            result.unwrap_err(),
            SchemaError::DuplicateCollection("A".to_string())
        );
    }

    #[test]
    fn test_duplicate_model_name_rejected() {
        let result = Schema::new(vec![
            CollectionDescriptor::new("A", "Same"),
            CollectionDescriptor::new("B", "Same"),
        ]);
        assert!(matches!(result, Err(SchemaError::DuplicateModelName(_))));
    }

    #[test]
    fn test_object_id_without_ref_rejected() {
        let mut field = FieldSpec::local("owner", FieldType::ObjectId);
        field.keyword = true;
        let result = Schema::new(vec![CollectionDescriptor::new("A", "A").with_field(field)]);
        assert_eq!(
            result.unwrap_err(),
            SchemaError::MissingRef {
                collection: "A".to_string(),
                field: "owner".to_string(),
            }
        );
    }

    #[test]
    fn test_label_rule_prefers_label() {
        let rule = LabelRule::default();
        let record = Record::new("CountryModel")
            .with("label", json!("New Zealand"))
            .with("name", json!("nz"));
        assert_eq!(rule.resolve(&record), json!("New Zealand"));
    }

    #[test]
    fn test_label_rule_falls_back_to_name() {
        let rule = LabelRule::default();
        let record = Record::new("CountryModel")
            .with("label", json!(""))
            .with("name", json!("nz"));
        assert_eq!(rule.resolve(&record), json!("nz"));

        let record = Record::new("CountryModel").with("name", json!("nz"));
        assert_eq!(rule.resolve(&record), json!("nz"));
    }

    #[test]
    fn test_label_rule_null_when_unset() {
        let rule = LabelRule::default();
        let record = Record::new("CountryModel").with("label", Value::Null);
        assert_eq!(rule.resolve(&record), Value::Null);
    }

    #[test]
    fn test_field_type_serialization() {
        assert_eq!(
            serde_json::to_string(&FieldType::ObjectId).unwrap(),
            "\"object_id\""
        );
        let parsed: FieldType = serde_json::from_str("\"boolean\"").unwrap();
        assert_eq!(parsed, FieldType::Boolean);
        assert_eq!(FieldType::Date.to_string(), "date");
    }
}
