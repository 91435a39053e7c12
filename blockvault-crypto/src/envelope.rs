//! Per-secret envelope encryption.
//!
//! Two-tier key architecture:
//!
//! 1. Master key: derived from the operator passphrase (or supplied raw)
//! 2. Data key: random per sealed value, wrapped with the master key
//!
//! Rotating the master passphrase only rewraps data keys; secret content is
//! never re-encrypted.

use crate::cipher::{self, EncryptedData, NONCE_SIZE, TAG_SIZE};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{generate_random_key, DerivedKey, KEY_SIZE};

/// Length of a wrapped data key: nonce, key, tag.
const WRAPPED_KEY_LEN: usize = NONCE_SIZE + KEY_SIZE + TAG_SIZE;

/// A sealed secret with everything needed to open it except the master key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// The data key, encrypted with the master key.
    pub wrapped_key: EncryptedData,
    /// The value, encrypted with the data key.
    pub content: EncryptedData,
    /// Version of the envelope format.
    pub version: u8,
}

impl Envelope {
    /// Current envelope format version.
    pub const CURRENT_VERSION: u8 = 1;

    /// Binary layout: `version || wrapped_key || content`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.wrapped_key.len() + self.content.len());
        out.push(self.version);
        out.extend_from_slice(&self.wrapped_key.to_bytes());
        out.extend_from_slice(&self.content.to_bytes());
        out
    }

    /// Parses the binary layout produced by [`Envelope::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let (&version, rest) = bytes
            .split_first()
            .ok_or_else(|| CryptoError::Malformed("empty envelope".into()))?;
        if version != Self::CURRENT_VERSION {
            return Err(CryptoError::UnsupportedVersion(version));
        }
        if rest.len() < WRAPPED_KEY_LEN {
            return Err(CryptoError::Malformed("envelope too short".into()));
        }
        let (key_part, content_part) = rest.split_at(WRAPPED_KEY_LEN);
        Ok(Self {
            wrapped_key: EncryptedData::from_bytes(key_part)?,
            content: EncryptedData::from_bytes(content_part)?,
            version,
        })
    }
}

/// Seals `data` under a fresh data key, bound to `context`.
///
/// # Process
/// 1. Generate a random data key
/// 2. Encrypt the data with the data key
/// 3. Encrypt the data key with the master key
pub fn seal(context: &str, data: &[u8], master_key: &DerivedKey) -> CryptoResult<Envelope> {
    let data_key = generate_random_key();

    let content = cipher::encrypt(&data_key, data, context.as_bytes())?;
    let wrapped_key = cipher::encrypt(master_key, data_key.as_bytes(), context.as_bytes())?;

    Ok(Envelope {
        wrapped_key,
        content,
        version: Envelope::CURRENT_VERSION,
    })
}

/// Opens an envelope sealed with the same master key and context.
pub fn open(context: &str, envelope: &Envelope, master_key: &DerivedKey) -> CryptoResult<Vec<u8>> {
    let data_key = unwrap_data_key(context, envelope, master_key)?;
    cipher::decrypt(&data_key, &envelope.content, context.as_bytes())
}

/// Rewraps the data key from `old_key` to `new_key`.
///
/// The content is not re-encrypted; only the key wrapper is replaced.
pub fn rewrap(
    context: &str,
    envelope: &Envelope,
    old_key: &DerivedKey,
    new_key: &DerivedKey,
) -> CryptoResult<Envelope> {
    let data_key = unwrap_data_key(context, envelope, old_key)?;
    let wrapped_key = cipher::encrypt(new_key, data_key.as_bytes(), context.as_bytes())?;

    Ok(Envelope {
        wrapped_key,
        content: envelope.content.clone(),
        version: envelope.version,
    })
}

fn unwrap_data_key(
    context: &str,
    envelope: &Envelope,
    master_key: &DerivedKey,
) -> CryptoResult<DerivedKey> {
    let mut key_bytes = cipher::decrypt(master_key, &envelope.wrapped_key, context.as_bytes())?;
    let key = DerivedKey::from_slice(&key_bytes);
    zeroize::Zeroize::zeroize(&mut key_bytes);
    key
}

const KEY_CHECK_CONTEXT: &str = "blockvault:key-check";
const KEY_CHECK_PLAINTEXT: &[u8] = b"blockvault master key check v1";

/// Produces a token that proves knowledge of `master_key` without storing it.
///
/// Stored alongside the salt; a wrong passphrase fails [`verify_key_check`].
pub fn key_check(master_key: &DerivedKey) -> CryptoResult<String> {
    use base64::{engine::general_purpose::STANDARD, Engine};
    let envelope = seal(KEY_CHECK_CONTEXT, KEY_CHECK_PLAINTEXT, master_key)?;
    Ok(STANDARD.encode(envelope.to_bytes()))
}

/// Whether `token` was produced by [`key_check`] with this key.
pub fn verify_key_check(master_key: &DerivedKey, token: &str) -> bool {
    use base64::{engine::general_purpose::STANDARD, Engine};
    let Ok(bytes) = STANDARD.decode(token) else {
        return false;
    };
    let Ok(envelope) = Envelope::from_bytes(&bytes) else {
        return false;
    };
    matches!(open(KEY_CHECK_CONTEXT, &envelope, master_key), Ok(plain) if plain == KEY_CHECK_PLAINTEXT)
}
