//! # keyword-types
//!
//! Shared domain types for the keyword-sync system.
//!
//! This crate defines the core data structures used throughout the system:
//! - Schema: collection and field declarations, display label rules
//! - Record: documents carrying a derived keyword projection
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use keyword_types::{CollectionDescriptor, FieldSpec, FieldType, Schema};
//!
//! let schema = Schema::new(vec![
//!     CollectionDescriptor::new("CountryModel", "Country")
//!         .with_field(FieldSpec::local("label", FieldType::String).keyword()),
//! ])
//! .unwrap();
//! assert_eq!(schema.len(), 1);
//! ```

pub mod config;
pub mod error;
pub mod record;
pub mod schema;

pub use config::Settings;
pub use error::{KeywordError, SchemaError};
pub use record::{keyword_slot, keyword_slot_path, Record, KEYWORDS_PATH};
pub use schema::{CollectionDescriptor, FieldSpec, FieldType, LabelRule, Schema};
