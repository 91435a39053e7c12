//! Core type definitions for BlockVault.
//!
//! This crate defines the fundamental types used throughout the registry:
//! - Document identifiers (UUID v7) and `type_slug/name` block keys
//! - The [`SecretValue`] wrapper and its fixed display mask
//!
//! Schema and document structure live in `blockvault-model`.

mod ids;
mod secret;

pub use ids::{validate_slug, BlockKey, DocumentId, MAX_SLUG_LEN};
pub use secret::{SecretValue, SECRET_MASK};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid slug {value:?}: {reason}")]
    InvalidSlug { value: String, reason: String },

    #[error("invalid block key {value:?}: {reason}")]
    InvalidKey { value: String, reason: String },
}
