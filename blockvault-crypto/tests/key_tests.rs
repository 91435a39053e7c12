use blockvault_crypto::{
    derive_key, generate_random_key, CryptoError, DerivedKey, KdfParams, Salt, KEY_SIZE,
};

fn test_params() -> KdfParams {
    KdfParams::minimal()
}

// ── derive_key ───────────────────────────────────────────────────

#[test]
fn derive_key_produces_consistent_results() {
    let salt = Salt::from_bytes([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
    let key1 = derive_key("correct horse", &salt, &test_params()).unwrap();
    let key2 = derive_key("correct horse", &salt, &test_params()).unwrap();
    assert_eq!(key1.as_bytes(), key2.as_bytes());
}

#[test]
fn different_passphrases_produce_different_keys() {
    let salt = Salt::from_bytes([1; 16]);
    let key1 = derive_key("passphrase1", &salt, &test_params()).unwrap();
    let key2 = derive_key("passphrase2", &salt, &test_params()).unwrap();
    assert_ne!(key1.as_bytes(), key2.as_bytes());
}

#[test]
fn different_salts_produce_different_keys() {
    let key1 = derive_key("same", &Salt::from_bytes([1; 16]), &test_params()).unwrap();
    let key2 = derive_key("same", &Salt::from_bytes([2; 16]), &test_params()).unwrap();
    assert_ne!(key1.as_bytes(), key2.as_bytes());
}

#[test]
fn invalid_params_fail() {
    let params = KdfParams {
        memory_cost: 1,
        time_cost: 0,
        parallelism: 0,
    };
    assert!(derive_key("pw", &Salt::random(), &params).is_err());
}

#[test]
fn default_params_are_owasp() {
    let p = KdfParams::default();
    assert_eq!(p.memory_cost, 19 * 1024);
    assert_eq!(p.time_cost, 2);
    assert_eq!(p.parallelism, 1);
}

// ── Keys ─────────────────────────────────────────────────────────

#[test]
fn random_keys_are_unique() {
    assert_ne!(generate_random_key().as_bytes(), generate_random_key().as_bytes());
}

#[test]
fn from_slice_checks_length() {
    assert!(DerivedKey::from_slice(&[0u8; KEY_SIZE]).is_ok());
    let err = DerivedKey::from_slice(&[0u8; 16]).unwrap_err();
    assert!(matches!(err, CryptoError::Malformed(_)));
    assert!(err.to_string().contains("16 bytes, expected 32"));
}

#[test]
fn debug_redacts_key_bytes() {
    let key = DerivedKey::from_bytes([0xAB; KEY_SIZE]);
    let dbg = format!("{key:?}");
    assert!(dbg.contains("REDACTED"));
    assert!(!dbg.contains("171"));
}

// ── Salt ─────────────────────────────────────────────────────────

#[test]
fn random_salts_are_unique() {
    assert_ne!(Salt::random(), Salt::random());
}

#[test]
fn salt_base64_roundtrip() {
    let salt = Salt::random();
    assert_eq!(Salt::from_base64(&salt.to_base64()).unwrap(), salt);
}

#[test]
fn salt_base64_wrong_length_fails() {
    use base64::{engine::general_purpose::STANDARD, Engine};
    let err = Salt::from_base64(&STANDARD.encode([0u8; 8])).unwrap_err();
    assert!(err.to_string().contains("invalid salt length"));
}
