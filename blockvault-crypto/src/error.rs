//! Failures while deriving keys or sealing and opening secret envelopes.

use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Argon2 rejected the parameters, or the stored salt is unusable.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("could not seal secret: {0}")]
    Seal(String),

    /// Authentication failed: wrong master key, wrong context, or tampered bytes.
    #[error("could not open secret: {0}")]
    Open(String),

    /// Bytes that cannot be an envelope or key at all.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u8),
}
