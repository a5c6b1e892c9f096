//! Keyword field extraction.
//!
//! Each collection's keyword-bearing fields, in declaration order, define
//! the shape of its records' keyword arrays: the field at position `i`
//! always fills slot `i`. Reordering declarations reshapes every record.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use keyword_types::{CollectionDescriptor, FieldType, Schema};

/// How a keyword field contributes to the projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FieldKind {
    /// Scalar value used as-is
    Local,
    /// Identifier resolved to the display label of a record in `target`
    Reference { target: String },
}

/// A keyword-bearing field and its slot in the keyword array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordField {
    pub name: String,
    pub position: usize,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl KeywordField {
    pub fn is_reference(&self) -> bool {
        matches!(self.kind, FieldKind::Reference { .. })
    }

    /// Target model name for reference fields.
    pub fn target(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Reference { target } => Some(target),
            FieldKind::Local => None,
        }
    }
}

/// Extract the keyword fields of a collection in declaration order.
pub fn keyword_fields(collection: &CollectionDescriptor) -> Vec<KeywordField> {
    collection
        .fields
        .iter()
        .filter(|field| field.keyword)
        .enumerate()
        .map(|(position, field)| {
            let kind = match (&field.field_type, &field.reference) {
                (FieldType::ObjectId, Some(target)) => FieldKind::Reference {
                    target: target.clone(),
                },
                _ => FieldKind::Local,
            };
            KeywordField {
                name: field.name.clone(),
                position,
                kind,
            }
        })
        .collect()
}

/// Keyword fields of every collection, keyed by collection id.
///
/// Built once per process; read-only afterward.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KeywordMap {
    #[serde(flatten)]
    fields: HashMap<String, Vec<KeywordField>>,
}

impl KeywordMap {
    pub fn build(schema: &Schema) -> Self {
        let fields = schema
            .collections()
            .iter()
            .map(|collection| (collection.id.clone(), keyword_fields(collection)))
            .collect();
        Self { fields }
    }

    /// Keyword fields of a collection; `None` if the collection is unknown.
    pub fn fields(&self, collection: &str) -> Option<&[KeywordField]> {
        self.fields.get(collection).map(Vec::as_slice)
    }

    /// Length of a collection's keyword array (0 for unknown collections).
    pub fn width(&self, collection: &str) -> usize {
        self.fields.get(collection).map_or(0, Vec::len)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[KeywordField])> {
        self.fields
            .iter()
            .map(|(id, fields)| (id.as_str(), fields.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyword_types::FieldSpec;

    fn project() -> CollectionDescriptor {
        CollectionDescriptor::new("ProjectModel", "Project")
            .with_field(FieldSpec::local("name", FieldType::String).keyword())
            .with_field(FieldSpec::local("budget", FieldType::Number))
            .with_field(FieldSpec::reference("country", "Country").keyword())
            .with_field(FieldSpec::local("ref", FieldType::String).keyword())
            .with_field(FieldSpec::reference("owner", "User"))
    }

    #[test]
    fn test_keyword_fields_in_declaration_order() {
        let fields = keyword_fields(&project());
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["name", "country", "ref"]);

        let positions: Vec<usize> = fields.iter().map(|f| f.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_keyword_field_kinds() {
        let fields = keyword_fields(&project());
        assert_eq!(fields[0].kind, FieldKind::Local);
        assert_eq!(fields[1].target(), Some("Country"));
        assert!(fields[1].is_reference());
        assert!(!fields[2].is_reference());
    }

    #[test]
    fn test_keyword_fields_deterministic() {
        assert_eq!(keyword_fields(&project()), keyword_fields(&project()));
    }

    #[test]
    fn test_collection_without_keywords() {
        let collection = CollectionDescriptor::new("LogModel", "Log")
            .with_field(FieldSpec::local("message", FieldType::String));
        assert!(keyword_fields(&collection).is_empty());
    }

    #[test]
    fn test_keyword_map_build() {
        let schema = Schema::new(vec![
            project(),
            CollectionDescriptor::new("CountryModel", "Country")
                .with_field(FieldSpec::local("label", FieldType::String).keyword()),
            CollectionDescriptor::new("UserModel", "User"),
        ])
        .unwrap();

        let map = KeywordMap::build(&schema);
        assert_eq!(map.width("ProjectModel"), 3);
        assert_eq!(map.width("CountryModel"), 1);
        assert_eq!(map.fields("UserModel"), Some(&[][..]));
        assert!(map.fields("GhostModel").is_none());
        assert_eq!(map.iter().count(), 3);
    }

    #[test]
    fn test_keyword_field_json_shape() {
        let fields = keyword_fields(&project());
        let json = serde_json::to_value(&fields[1]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "country",
                "position": 1,
                "kind": "reference",
                "target": "Country"
            })
        );
    }
}
