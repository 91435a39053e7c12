use blockvault_crypto::{
    derive_key, generate_random_key, key_check, open, rewrap, seal, verify_key_check, CryptoError,
    DerivedKey, Envelope, KdfParams, Salt,
};

fn test_master_key() -> DerivedKey {
    let salt = Salt::from_bytes([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
    derive_key("test_passphrase", &salt, &KdfParams::minimal()).unwrap()
}

const CTX: &str = "webhook/alerts#url";

#[test]
fn seal_open_roundtrip() {
    let master = test_master_key();
    let sealed = seal(CTX, b"https://hooks.example.com/T000/B000", &master).unwrap();
    assert_eq!(sealed.version, Envelope::CURRENT_VERSION);
    let opened = open(CTX, &sealed, &master).unwrap();
    assert_eq!(opened, b"https://hooks.example.com/T000/B000");
}

#[test]
fn wrong_master_key_fails() {
    let sealed = seal(CTX, b"secret", &test_master_key()).unwrap();
    assert!(open(CTX, &sealed, &generate_random_key()).is_err());
}

#[test]
fn envelope_moved_to_other_field_fails() {
    let master = test_master_key();
    let sealed = seal(CTX, b"secret", &master).unwrap();
    assert!(open("webhook/alerts#headers", &sealed, &master).is_err());
}

#[test]
fn bytes_roundtrip() {
    let master = test_master_key();
    let sealed = seal(CTX, b"secret", &master).unwrap();
    let parsed = Envelope::from_bytes(&sealed.to_bytes()).unwrap();
    assert_eq!(parsed, sealed);
    assert_eq!(open(CTX, &parsed, &master).unwrap(), b"secret");
}

#[test]
fn unknown_version_rejected() {
    let master = test_master_key();
    let mut bytes = seal(CTX, b"secret", &master).unwrap().to_bytes();
    bytes[0] = 9;
    assert!(matches!(
        Envelope::from_bytes(&bytes),
        Err(CryptoError::UnsupportedVersion(9))
    ));
}

#[test]
fn truncated_envelope_rejected() {
    assert!(matches!(Envelope::from_bytes(&[]), Err(CryptoError::Malformed(_))));
    assert!(matches!(Envelope::from_bytes(&[1, 2, 3]), Err(CryptoError::Malformed(_))));
}

#[test]
fn rewrap_moves_to_new_key_without_touching_content() {
    let old_key = test_master_key();
    let new_key = generate_random_key();
    let sealed = seal(CTX, b"rotate me", &old_key).unwrap();

    let rewrapped = rewrap(CTX, &sealed, &old_key, &new_key).unwrap();
    assert_eq!(rewrapped.content, sealed.content);
    assert_ne!(rewrapped.wrapped_key, sealed.wrapped_key);

    assert_eq!(open(CTX, &rewrapped, &new_key).unwrap(), b"rotate me");
    assert!(open(CTX, &rewrapped, &old_key).is_err());
}

#[test]
fn rewrap_with_wrong_old_key_fails() {
    let sealed = seal(CTX, b"x", &test_master_key()).unwrap();
    assert!(rewrap(CTX, &sealed, &generate_random_key(), &generate_random_key()).is_err());
}

#[test]
fn key_check_verifies_only_matching_key() {
    let master = test_master_key();
    let token = key_check(&master).unwrap();
    assert!(verify_key_check(&master, &token));
    assert!(!verify_key_check(&generate_random_key(), &token));
    assert!(!verify_key_check(&master, "garbage"));
}
