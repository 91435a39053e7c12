//! Error types for schema and value validation.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while validating schemas or document values.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A value names a field the schema does not declare.
    #[error("unknown field '{field}'")]
    UnknownField { field: String },

    /// A required field without default was omitted.
    #[error("missing required field '{field}'")]
    MissingField { field: String },

    /// The value's type does not match the field's type.
    #[error("field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    /// The value has the right type but is otherwise unacceptable.
    #[error("field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// The schema definition itself is malformed.
    #[error("invalid schema '{slug}': {reason}")]
    InvalidSchema { slug: String, reason: String },

    /// Identifier parse failure (slug, key, id).
    #[error(transparent)]
    Type(#[from] blockvault_types::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ModelError {
    /// The offending field, when the error is about one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::UnknownField { field }
            | Self::MissingField { field }
            | Self::TypeMismatch { field, .. }
            | Self::InvalidValue { field, .. } => Some(field),
            _ => None,
        }
    }
}
