//! Error taxonomy for block operations.

use blockvault_model::ModelError;
use blockvault_storage::StorageError;
use blockvault_types::BlockKey;
use thiserror::Error;

/// Result type for block operations.
pub type BlockResult<T> = Result<T, BlockError>;

/// Errors surfaced by the registry, the document store and the resolver.
#[derive(Debug, Error)]
pub enum BlockError {
    /// Values (or a schema definition) failed validation. `name` is empty
    /// when the error concerns a block type rather than a document.
    #[error("validation failed for {}: {reason}", target(.type_slug, .name, .field.as_deref()))]
    Validation {
        type_slug: String,
        name: String,
        field: Option<String>,
        reason: String,
    },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("block document '{key}' already exists")]
    AlreadyExists { key: String },

    /// A different schema is already registered under the slug.
    #[error("block type '{slug}' already registered with checksum {existing} (got {incoming})")]
    SchemaConflict {
        slug: String,
        existing: String,
        incoming: String,
    },

    #[error("cyclic reference: {}", join_path(.path))]
    CyclicReference { path: Vec<BlockKey> },

    /// Optimistic concurrency check failed.
    #[error("version conflict on '{key}': expected {expected}, found {actual}")]
    Conflict {
        key: String,
        expected: u64,
        actual: u64,
    },

    /// Timed out or the backend was busy; the operation may be retried.
    #[error("{operation} failed transiently: {reason}")]
    Transient { operation: String, reason: String },

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("crypto error: {0}")]
    Crypto(String),
}

impl BlockError {
    /// Whether the caller may retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub(crate) fn invalid_type(slug: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            type_slug: slug.to_string(),
            name: String::new(),
            field: None,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_document(
        type_slug: &str,
        name: &str,
        field: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Validation {
            type_slug: type_slug.to_string(),
            name: name.to_string(),
            field: field.map(str::to_string),
            reason: reason.into(),
        }
    }

    /// Wraps a model error raised while validating `type_slug/name`.
    pub(crate) fn from_model(type_slug: &str, name: &str, err: ModelError) -> Self {
        Self::invalid_document(type_slug, name, err.field(), err.to_string())
    }
}

fn target(type_slug: &str, name: &str, field: Option<&str>) -> String {
    let base = if type_slug.is_empty() {
        "input".to_string()
    } else if name.is_empty() {
        format!("block type '{type_slug}'")
    } else {
        format!("'{type_slug}/{name}'")
    };
    match field {
        Some(field) => format!("{base} field '{field}'"),
        None => base,
    }
}

fn join_path(path: &[BlockKey]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl From<StorageError> for BlockError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => Self::NotFound { what },
            StorageError::AlreadyExists(key) => Self::AlreadyExists { key },
            StorageError::Conflict {
                key,
                expected,
                actual,
            } => Self::Conflict {
                key,
                expected,
                actual,
            },
            StorageError::Busy(reason) => Self::Transient {
                operation: "storage".into(),
                reason,
            },
            StorageError::InUse { ref slug, .. } => Self::invalid_type(slug, err.to_string()),
            StorageError::InvalidMasterKey
            | StorageError::StaleKey
            | StorageError::Encryption(_) => Self::Crypto(err.to_string()),
            other => Self::Storage(other),
        }
    }
}

impl From<blockvault_types::Error> for BlockError {
    fn from(err: blockvault_types::Error) -> Self {
        use blockvault_types::Error;
        match &err {
            Error::InvalidSlug { value, .. } => Self::invalid_type(value, err.to_string()),
            _ => Self::invalid_document("", "", None, err.to_string()),
        }
    }
}

impl From<blockvault_crypto::CryptoError> for BlockError {
    fn from(err: blockvault_crypto::CryptoError) -> Self {
        Self::Crypto(err.to_string())
    }
}
