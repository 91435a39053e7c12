//! Master key bootstrap, verification and rotation.
//!
//! The store keeps its KDF salt, KDF parameters and a key-check token in the
//! backend's metadata. The first unlock initializes them; later unlocks
//! derive with the persisted salt and parameters and must pass the check.

use crate::backend::StorageBackend;
use crate::codec::DocumentCodec;
use crate::error::{StorageError, StorageResult};
use blockvault_crypto::{derive_key, key_check, verify_key_check, DerivedKey, KdfParams, Salt};
use tracing::info;

pub const SALT_KEY: &str = "kdf.salt";
pub const PARAMS_KEY: &str = "kdf.params";
pub const KEY_CHECK_KEY: &str = "kdf.key_check";

/// A master key and the key-check token it was verified against. Writes
/// sealed under `key` carry `key_check` so a rotation by another handle
/// is detected at write time.
#[derive(Debug)]
pub struct VerifiedKey {
    pub key: DerivedKey,
    pub key_check: String,
}

/// Outcome of a master key rotation.
#[derive(Debug)]
pub struct Rotation {
    pub key: VerifiedKey,
    /// Documents whose sealed secrets were rewrapped.
    pub rewritten: usize,
}

/// Whether a master key has ever been set for this store.
pub fn is_initialized(backend: &dyn StorageBackend) -> StorageResult<bool> {
    Ok(backend.metadata(KEY_CHECK_KEY)?.is_some())
}

/// Derives the master key from `passphrase`, initializing the store on
/// first use. `params` only apply to a fresh store.
pub fn unlock_with_passphrase(
    backend: &dyn StorageBackend,
    passphrase: &str,
    params: &KdfParams,
) -> StorageResult<VerifiedKey> {
    let Some(encoded_salt) = backend.metadata(SALT_KEY)? else {
        if is_initialized(backend)? {
            return Err(StorageError::InvalidData(
                "store was initialized with a raw master key".into(),
            ));
        }
        let salt = Salt::random();
        let key = derive_key(passphrase, &salt, params)?;
        let token = key_check(&key)?;
        backend.put_metadata(&passphrase_metadata(&salt, params, token.clone())?)?;
        info!("initialized master key");
        return Ok(VerifiedKey {
            key,
            key_check: token,
        });
    };

    let salt = Salt::from_base64(&encoded_salt)?;
    let params = stored_params(backend)?.unwrap_or_else(|| params.clone());
    let key = derive_key(passphrase, &salt, &params)?;
    let key_check = verify(backend, &key)?;
    Ok(VerifiedKey { key, key_check })
}

/// Accepts a raw master key, recording its key check on first use.
/// Returns the key-check token the key matches.
pub fn unlock_with_key(backend: &dyn StorageBackend, key: &DerivedKey) -> StorageResult<String> {
    if is_initialized(backend)? {
        return verify(backend, key);
    }
    let token = key_check(key)?;
    backend.put_metadata(&[(KEY_CHECK_KEY, token.clone())])?;
    info!("initialized raw master key");
    Ok(token)
}

/// Re-wraps every sealed secret from the key derived from `old_passphrase`
/// to one derived from `new_passphrase` under a fresh salt.
pub fn rotate_passphrase(
    backend: &dyn StorageBackend,
    codec: &DocumentCodec,
    old_passphrase: &str,
    new_passphrase: &str,
    params: &KdfParams,
) -> StorageResult<Rotation> {
    let old = unlock_with_passphrase(backend, old_passphrase, params)?;
    let salt = Salt::random();
    let new_key = derive_key(new_passphrase, &salt, params)?;
    let token = key_check(&new_key)?;
    let rewritten = backend.rewrite_bodies(
        &mut |doc| codec.rewrap(doc, &old.key, &new_key),
        &passphrase_metadata(&salt, params, token.clone())?,
    )?;
    info!(documents = rewritten, "rotated master passphrase");
    Ok(Rotation {
        key: VerifiedKey {
            key: new_key,
            key_check: token,
        },
        rewritten,
    })
}

/// Re-wraps every sealed secret from `old_key` to `new_key`.
pub fn rotate_key(
    backend: &dyn StorageBackend,
    codec: &DocumentCodec,
    old_key: &DerivedKey,
    new_key: DerivedKey,
) -> StorageResult<Rotation> {
    verify(backend, old_key)?;
    let token = key_check(&new_key)?;
    let rewritten = backend.rewrite_bodies(
        &mut |doc| codec.rewrap(doc, old_key, &new_key),
        &[(KEY_CHECK_KEY, token.clone())],
    )?;
    info!(documents = rewritten, "rotated raw master key");
    Ok(Rotation {
        key: VerifiedKey {
            key: new_key,
            key_check: token,
        },
        rewritten,
    })
}

/// Checks `key` against the stored token and returns that token.
fn verify(backend: &dyn StorageBackend, key: &DerivedKey) -> StorageResult<String> {
    match backend.metadata(KEY_CHECK_KEY)? {
        Some(token) if verify_key_check(key, &token) => Ok(token),
        Some(_) => Err(StorageError::InvalidMasterKey),
        None => Err(StorageError::InvalidData("store has no master key".into())),
    }
}

fn stored_params(backend: &dyn StorageBackend) -> StorageResult<Option<KdfParams>> {
    backend
        .metadata(PARAMS_KEY)?
        .map(|raw| serde_json::from_str(&raw).map_err(StorageError::from))
        .transpose()
}

fn passphrase_metadata(
    salt: &Salt,
    params: &KdfParams,
    key_check: String,
) -> StorageResult<Vec<(&'static str, String)>> {
    Ok(vec![
        (SALT_KEY, salt.to_base64()),
        (PARAMS_KEY, serde_json::to_string(params)?),
        (KEY_CHECK_KEY, key_check),
    ])
}

