//! Typed, secret-aware configuration blocks.
//!
//! A block type ([`SchemaType`]) declares typed fields, some of them secret.
//! Documents of a type are validated on save, their secret fields sealed
//! with envelope encryption, and references between documents resolved on
//! load.
//!
//! - [`SchemaRegistry`]: block types with a read-through cache
//! - [`DocumentStore`]: validation, sealing and conditional writes
//! - [`ReferenceResolver`]: depth-first hydration with cycle detection
//! - [`Blocks`]: the synchronous façade over all three

mod blocks;
pub mod catalog;
mod error;
mod registry;
mod resolver;
mod store;

pub use blocks::Blocks;
pub use error::{BlockError, BlockResult};
pub use registry::SchemaRegistry;
pub use resolver::{
    HydratedDocument, ReferenceResolver, MAX_HYDRATED_DOCUMENTS, MAX_REFERENCE_DEPTH,
};
pub use store::{DocumentStore, SaveOptions};

pub use blockvault_model::{
    values, BlockHandler, Document, DocumentSummary, FieldDefinition, FieldType, FieldValue,
    SchemaType,
};
pub use blockvault_types::{BlockKey, DocumentId, SecretValue, SECRET_MASK};
