//! Encryption layer for BlockVault secret fields.
//!
//! - [`cipher`]: ChaCha20-Poly1305 with context-bound associated data
//! - [`key`]: Argon2id master key derivation, random data keys
//! - [`envelope`]: per-secret data keys wrapped by the master key
//! - [`DataEncryptor`]: the seam storage backends seal through

pub mod cipher;
pub mod envelope;
mod encryptor;
mod error;
pub mod key;

pub use cipher::{decrypt, encrypt, EncryptedData, NONCE_SIZE, TAG_SIZE};
pub use encryptor::{
    DataEncryptor, EncryptorError, EncryptorResult, MasterKeyEncryptor, PassthroughEncryptor,
};
pub use envelope::{key_check, open, rewrap, seal, verify_key_check, Envelope};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_key, generate_random_key, DerivedKey, KdfParams, Salt, KEY_SIZE, SALT_SIZE};
