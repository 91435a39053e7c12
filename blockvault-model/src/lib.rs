//! Block type and document model for BlockVault.
//!
//! Defines the types every other BlockVault crate builds on:
//! - [`SchemaType`] / [`FieldDefinition`] / [`FieldType`]: a block type's typed fields
//! - [`FieldValue`]: a document field value, including secrets and references
//! - [`Document`]: a named, versioned instance of a block type
//! - [`validate_values`]: schema validation and coercion of a value set
//! - [`BlockHandler`]: optional hook for type-specific validation

mod document;
mod error;
mod handler;
mod schema;
mod validate;
mod value;

pub use document::{Document, DocumentSummary};
pub use error::{ModelError, ModelResult};
pub use handler::BlockHandler;
pub use schema::{FieldDefinition, FieldType, SchemaType};
pub use validate::{coerce_field, validate_values};
pub use value::{escape_pointer, values, FieldValue, REF_KEY};
