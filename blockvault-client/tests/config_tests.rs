use blockvault_client::{
    BlockVaultConfig, ConfigError, DATABASE_ENV, DEFAULT_PASSPHRASE_ENV, TIMEOUT_ENV,
};
use blockvault_crypto::KdfParams;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |var| map.get(var).cloned()
}

#[test]
fn defaults() {
    let config = BlockVaultConfig::default();
    assert_eq!(config.database_path, PathBuf::from("blockvault.db"));
    assert_eq!(config.operation_timeout(), Duration::from_secs(30));
    assert_eq!(config.busy_timeout(), Duration::from_secs(5));
    assert_eq!(config.passphrase_env, DEFAULT_PASSPHRASE_ENV);
    assert_eq!(config.kdf, KdfParams::default());
}

#[test]
fn toml_partial_file_keeps_defaults() {
    let config = BlockVaultConfig::from_toml_str(
        r#"
        database_path = "/var/lib/blockvault/blocks.db"
        operation_timeout_ms = 2500

        [kdf]
        memory_cost = 1024
        "#,
    )
    .unwrap();

    assert_eq!(config.database_path, PathBuf::from("/var/lib/blockvault/blocks.db"));
    assert_eq!(config.operation_timeout_ms, 2500);
    assert_eq!(config.busy_timeout_ms, 5_000);
    assert_eq!(config.kdf.memory_cost, 1024);
    assert_eq!(config.kdf.time_cost, KdfParams::default().time_cost);
}

#[test]
fn toml_rejects_wrong_types() {
    let err = BlockVaultConfig::from_toml_str("operation_timeout_ms = \"soon\"").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn load_reads_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("blockvault.toml");
    std::fs::write(&path, "busy_timeout_ms = 100\n").unwrap();
    assert_eq!(BlockVaultConfig::load(&path).unwrap().busy_timeout_ms, 100);
}

#[test]
fn load_missing_file_names_path() {
    let err = BlockVaultConfig::load(std::path::Path::new("/nonexistent/blockvault.toml")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/blockvault.toml"));
}

#[test]
fn env_overrides_apply() {
    let config = BlockVaultConfig::default()
        .with_overrides(env(&[(DATABASE_ENV, "/tmp/other.db"), (TIMEOUT_ENV, " 750 ")]))
        .unwrap();
    assert_eq!(config.database_path, PathBuf::from("/tmp/other.db"));
    assert_eq!(config.operation_timeout_ms, 750);
}

#[test]
fn empty_database_override_is_ignored() {
    let config = BlockVaultConfig::default()
        .with_overrides(env(&[(DATABASE_ENV, "")]))
        .unwrap();
    assert_eq!(config.database_path, PathBuf::from("blockvault.db"));
}

#[test]
fn bad_timeout_override_fails() {
    let err = BlockVaultConfig::default()
        .with_overrides(env(&[(TIMEOUT_ENV, "fast")]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidOverride { ref var, .. } if var == TIMEOUT_ENV));
}

#[test]
fn passphrase_comes_from_named_variable() {
    let config = BlockVaultConfig {
        passphrase_env: "MY_VAULT_PASS".into(),
        ..BlockVaultConfig::default()
    };
    let pass = config
        .passphrase_from(env(&[("MY_VAULT_PASS", "correct horse")]))
        .unwrap();
    assert_eq!(pass.as_str(), "correct horse");

    let err = config.passphrase_from(env(&[])).unwrap_err();
    assert!(err.to_string().contains("MY_VAULT_PASS"));
    let err = config
        .passphrase_from(env(&[("MY_VAULT_PASS", "")]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::MissingPassphrase { .. }));
}

#[test]
fn config_serializes_without_passphrase() {
    let toml = toml::to_string(&BlockVaultConfig::default()).unwrap();
    assert!(toml.contains("passphrase_env"));
    assert!(BlockVaultConfig::from_toml_str(&toml).unwrap() == BlockVaultConfig::default());
}
