//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(rusqlite::Error),

    /// The database is busy or locked by another connection.
    #[error("database busy: {0}")]
    Busy(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A create-only write hit an existing record.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A versioned write found a different stored version.
    #[error("version conflict on {key}: expected {expected}, found {actual}")]
    Conflict {
        key: String,
        expected: u64,
        actual: u64,
    },

    /// A block type still has documents.
    #[error("block type '{slug}' still has {documents} document(s)")]
    InUse { slug: String, documents: usize },

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid stored data.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The passphrase or raw key does not match the one the store was
    /// initialized with.
    #[error("invalid master key: key check failed")]
    InvalidMasterKey,

    /// The write was sealed under a master key the store has since rotated
    /// away from.
    #[error("master key was rotated after this handle unlocked it")]
    StaleKey,

    /// Encryption/decryption error.
    #[error("encryption error: {0}")]
    Encryption(String),
}

impl StorageError {
    /// Whether retrying the same operation may succeed.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Self::Busy(err.to_string()),
            _ => Self::Database(err),
        }
    }
}

impl From<blockvault_crypto::EncryptorError> for StorageError {
    fn from(err: blockvault_crypto::EncryptorError) -> Self {
        Self::Encryption(err.to_string())
    }
}

impl From<blockvault_crypto::CryptoError> for StorageError {
    fn from(err: blockvault_crypto::CryptoError) -> Self {
        Self::Encryption(err.to_string())
    }
}

impl From<blockvault_model::ModelError> for StorageError {
    fn from(err: blockvault_model::ModelError) -> Self {
        Self::InvalidData(err.to_string())
    }
}
