use blockvault_crypto::{generate_random_key, KdfParams, MasterKeyEncryptor};
use blockvault_model::{Document, FieldValue};
use blockvault_storage::keyring::{self, KEY_CHECK_KEY, PARAMS_KEY, SALT_KEY};
use blockvault_storage::{
    DocumentCodec, MemoryBackend, StorageBackend, StorageError, WriteCondition,
};
use blockvault_types::DocumentId;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

fn params() -> KdfParams {
    KdfParams::minimal()
}

fn secret_doc(name: &str) -> Document {
    let now = Utc::now();
    let mut values = BTreeMap::new();
    values.insert("value".into(), FieldValue::secret("hunter2"));
    Document {
        id: DocumentId::new(),
        type_slug: "secret".into(),
        schema_version: 1,
        name: name.into(),
        values,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

// ── Passphrase ───────────────────────────────────────────────────

#[test]
fn first_unlock_initializes_metadata() {
    let backend = MemoryBackend::new();
    assert!(!keyring::is_initialized(&backend).unwrap());

    keyring::unlock_with_passphrase(&backend, "correct horse", &params()).unwrap();

    assert!(keyring::is_initialized(&backend).unwrap());
    assert!(backend.metadata(SALT_KEY).unwrap().is_some());
    assert!(backend.metadata(PARAMS_KEY).unwrap().is_some());
    assert!(backend.metadata(KEY_CHECK_KEY).unwrap().is_some());
}

#[test]
fn same_passphrase_yields_same_key() {
    let backend = MemoryBackend::new();
    let a = keyring::unlock_with_passphrase(&backend, "correct horse", &params()).unwrap();
    let b = keyring::unlock_with_passphrase(&backend, "correct horse", &params()).unwrap();
    assert_eq!(a.key.as_bytes(), b.key.as_bytes());
    assert_eq!(a.key_check, b.key_check);
    assert_eq!(backend.metadata(KEY_CHECK_KEY).unwrap(), Some(a.key_check));
}

#[test]
fn wrong_passphrase_fails() {
    let backend = MemoryBackend::new();
    keyring::unlock_with_passphrase(&backend, "correct horse", &params()).unwrap();
    let err = keyring::unlock_with_passphrase(&backend, "battery staple", &params()).unwrap_err();
    assert!(matches!(err, StorageError::InvalidMasterKey));
}

#[test]
fn persisted_params_win_over_caller_params() {
    let backend = MemoryBackend::new();
    let a = keyring::unlock_with_passphrase(&backend, "pw", &params()).unwrap();
    let other = KdfParams {
        memory_cost: 2048,
        time_cost: 2,
        parallelism: 1,
    };
    let b = keyring::unlock_with_passphrase(&backend, "pw", &other).unwrap();
    assert_eq!(a.key.as_bytes(), b.key.as_bytes());
}

// ── Raw key ──────────────────────────────────────────────────────

#[test]
fn raw_key_recorded_then_verified() {
    let backend = MemoryBackend::new();
    let key = generate_random_key();
    let first = keyring::unlock_with_key(&backend, &key).unwrap();
    assert_eq!(keyring::unlock_with_key(&backend, &key).unwrap(), first);
    assert!(matches!(
        keyring::unlock_with_key(&backend, &generate_random_key()),
        Err(StorageError::InvalidMasterKey)
    ));
}

#[test]
fn passphrase_rejected_on_raw_key_store() {
    let backend = MemoryBackend::new();
    keyring::unlock_with_key(&backend, &generate_random_key()).unwrap();
    assert!(keyring::unlock_with_passphrase(&backend, "pw", &params()).is_err());
}

// ── Rotation ─────────────────────────────────────────────────────

#[test]
fn rotate_passphrase_rewraps_and_switches_check() {
    let backend = MemoryBackend::new();
    let old = keyring::unlock_with_passphrase(&backend, "old pass", &params()).unwrap();
    let encryptor = Arc::new(MasterKeyEncryptor::new(old.key));
    let codec = DocumentCodec::new(encryptor.clone());

    let doc = secret_doc("api-token");
    backend
        .write_document(codec.encode(&doc).unwrap(), WriteCondition::MustNotExist, None)
        .unwrap();

    let rotation =
        keyring::rotate_passphrase(&backend, &codec, "old pass", "new pass", &params()).unwrap();
    assert_eq!(rotation.rewritten, 1);
    assert_ne!(rotation.key.key_check, old.key_check);

    assert!(keyring::unlock_with_passphrase(&backend, "old pass", &params()).is_err());
    let reopened = keyring::unlock_with_passphrase(&backend, "new pass", &params()).unwrap();
    assert_eq!(reopened.key_check, rotation.key.key_check);

    encryptor.unlock(rotation.key.key);
    let stored = backend.document(&doc.key()).unwrap().unwrap();
    assert_eq!(codec.decode(stored).unwrap().values, doc.values);
}

#[test]
fn rotate_with_wrong_old_passphrase_changes_nothing() {
    let backend = MemoryBackend::new();
    keyring::unlock_with_passphrase(&backend, "old pass", &params()).unwrap();
    let salt_before = backend.metadata(SALT_KEY).unwrap();
    let codec = DocumentCodec::new(Arc::new(MasterKeyEncryptor::locked()));

    let err = keyring::rotate_passphrase(&backend, &codec, "nope", "new", &params()).unwrap_err();
    assert!(matches!(err, StorageError::InvalidMasterKey));
    assert_eq!(backend.metadata(SALT_KEY).unwrap(), salt_before);
}

#[test]
fn rotate_raw_key() {
    let backend = MemoryBackend::new();
    let old_key = generate_random_key();
    let new_key = generate_random_key();
    keyring::unlock_with_key(&backend, &old_key).unwrap();
    let encryptor = Arc::new(MasterKeyEncryptor::new(old_key.clone()));
    let codec = DocumentCodec::new(encryptor.clone());

    let doc = secret_doc("api-token");
    backend
        .write_document(codec.encode(&doc).unwrap(), WriteCondition::Any, None)
        .unwrap();

    let rotation = keyring::rotate_key(&backend, &codec, &old_key, new_key.clone()).unwrap();
    assert_eq!(rotation.rewritten, 1);
    assert_eq!(
        keyring::unlock_with_key(&backend, &new_key).unwrap(),
        rotation.key.key_check
    );

    encryptor.unlock(new_key);
    let stored = backend.document(&doc.key()).unwrap().unwrap();
    assert_eq!(codec.decode(stored).unwrap().values, doc.values);
}
