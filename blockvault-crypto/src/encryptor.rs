//! Abstract encryption interface for sealing secret field values.
//!
//! Stores depend on `Arc<dyn DataEncryptor>` and never see raw keys.
//! [`MasterKeyEncryptor`] is the real implementation; tests use
//! [`PassthroughEncryptor`] to skip key derivation.

use crate::envelope::{self, Envelope};
use crate::key::{derive_key, DerivedKey, KdfParams, Salt};
use crate::error::CryptoResult;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Errors from the encryption layer.
#[derive(Debug, Error)]
pub enum EncryptorError {
    /// No master key is loaded.
    #[error("encryptor unavailable (no master key loaded)")]
    Unavailable,
    /// Underlying crypto failure.
    #[error("crypto error: {0}")]
    Crypto(String),
    /// Serialization round-trip failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<crate::CryptoError> for EncryptorError {
    fn from(err: crate::CryptoError) -> Self {
        Self::Crypto(err.to_string())
    }
}

pub type EncryptorResult<T> = Result<T, EncryptorError>;

/// Encrypts and decrypts opaque byte slices bound to a context string
/// (the `type_slug/name#field` the secret belongs to).
///
/// Implementations own the key material. Callers never see raw keys.
pub trait DataEncryptor: Send + Sync {
    /// Encrypt `data` for `context`, returning an opaque blob.
    fn encrypt_bytes(&self, context: &str, data: &[u8]) -> EncryptorResult<Vec<u8>>;

    /// Decrypt a blob previously produced by `encrypt_bytes` for `context`.
    fn decrypt_bytes(&self, context: &str, data: &[u8]) -> EncryptorResult<Vec<u8>>;

    /// Re-wrap the blob's data key from `old_key` to `new_key` without
    /// touching content. Used when rotating the master key.
    fn reencrypt_bytes(
        &self,
        context: &str,
        data: &[u8],
        old_key: &DerivedKey,
        new_key: &DerivedKey,
    ) -> EncryptorResult<Vec<u8>>;

    /// Whether the encryptor has key material loaded.
    fn is_available(&self) -> bool;
}

/// No-op encryptor for tests. Data passes through unchanged.
pub struct PassthroughEncryptor;

impl DataEncryptor for PassthroughEncryptor {
    fn encrypt_bytes(&self, _context: &str, data: &[u8]) -> EncryptorResult<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decrypt_bytes(&self, _context: &str, data: &[u8]) -> EncryptorResult<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn reencrypt_bytes(
        &self,
        _context: &str,
        data: &[u8],
        _old_key: &DerivedKey,
        _new_key: &DerivedKey,
    ) -> EncryptorResult<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Envelope encryptor holding the master key in memory.
pub struct MasterKeyEncryptor {
    key: RwLock<Option<DerivedKey>>,
}

impl MasterKeyEncryptor {
    /// An encryptor with `key` loaded.
    pub fn new(key: DerivedKey) -> Self {
        Self {
            key: RwLock::new(Some(key)),
        }
    }

    /// An encryptor with no key; every operation fails with `Unavailable`
    /// until [`MasterKeyEncryptor::unlock`] is called.
    pub fn locked() -> Self {
        Self {
            key: RwLock::new(None),
        }
    }

    /// Derives the master key from a passphrase.
    pub fn from_passphrase(passphrase: &str, salt: &Salt, params: &KdfParams) -> CryptoResult<Self> {
        Ok(Self::new(derive_key(passphrase, salt, params)?))
    }

    /// Loads (or replaces) the master key.
    pub fn unlock(&self, key: DerivedKey) {
        *self.key.write().unwrap_or_else(PoisonError::into_inner) = Some(key);
    }

    /// Drops the master key from memory.
    pub fn lock(&self) {
        *self.key.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn with_key<T>(&self, f: impl FnOnce(&DerivedKey) -> EncryptorResult<T>) -> EncryptorResult<T> {
        let guard = self.key.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(key) => f(key),
            None => Err(EncryptorError::Unavailable),
        }
    }
}

impl DataEncryptor for MasterKeyEncryptor {
    fn encrypt_bytes(&self, context: &str, data: &[u8]) -> EncryptorResult<Vec<u8>> {
        self.with_key(|key| Ok(envelope::seal(context, data, key)?.to_bytes()))
    }

    fn decrypt_bytes(&self, context: &str, data: &[u8]) -> EncryptorResult<Vec<u8>> {
        self.with_key(|key| {
            let sealed = Envelope::from_bytes(data)?;
            Ok(envelope::open(context, &sealed, key)?)
        })
    }

    fn reencrypt_bytes(
        &self,
        context: &str,
        data: &[u8],
        old_key: &DerivedKey,
        new_key: &DerivedKey,
    ) -> EncryptorResult<Vec<u8>> {
        let sealed = Envelope::from_bytes(data)?;
        Ok(envelope::rewrap(context, &sealed, old_key, new_key)?.to_bytes())
    }

    fn is_available(&self) -> bool {
        self.key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
