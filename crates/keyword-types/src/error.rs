//! Error types for the keyword-sync system.

use thiserror::Error;

/// Unified error type for shared keyword-sync operations.
#[derive(Debug, Error)]
pub enum KeywordError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Schema file could not be parsed
    #[error("Schema parse error: {0}")]
    SchemaParse(#[from] toml::de::Error),

    /// Schema failed validation
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// I/O error while reading a schema or config file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Inconsistencies detected while validating collection declarations.
///
/// These are fatal at startup: the keyword map and reference matrix are
/// only built from a schema that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Two collections share the same identifier
    #[error("Duplicate collection id: {0}")]
    DuplicateCollection(String),

    /// Two collections share the same model name
    #[error("Duplicate model name: {0}")]
    DuplicateModelName(String),

    /// An object id field was declared without a `ref` target
    #[error("Field {collection}.{field} is an object id without a ref target")]
    MissingRef { collection: String, field: String },

    /// A reference field names a model that is not among the connected collections
    #[error("Field {collection}.{field} references unknown model {target}")]
    UnknownTarget {
        collection: String,
        field: String,
        target: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display() {
        let err = SchemaError::UnknownTarget {
            collection: "ProjectModel".to_string(),
            field: "country".to_string(),
            target: "Nation".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Field ProjectModel.country references unknown model Nation"
        );

        let err = SchemaError::DuplicateCollection("CountryModel".to_string());
        assert_eq!(err.to_string(), "Duplicate collection id: CountryModel");
    }

    #[test]
    fn test_schema_error_is_transparent() {
        let err: KeywordError = SchemaError::DuplicateModelName("Country".to_string()).into();
        assert_eq!(err.to_string(), "Duplicate model name: Country");
    }
}
