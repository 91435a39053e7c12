//! Client configuration: defaults, TOML file, environment overrides.

use blockvault_crypto::KdfParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use zeroize::Zeroizing;

/// Overrides `database_path`.
pub const DATABASE_ENV: &str = "BLOCKVAULT_DATABASE";
/// Overrides `operation_timeout_ms`.
pub const TIMEOUT_ENV: &str = "BLOCKVAULT_TIMEOUT_MS";
/// Default name of the variable holding the master passphrase.
pub const DEFAULT_PASSPHRASE_ENV: &str = "BLOCKVAULT_PASSPHRASE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: {value:?}")]
    InvalidOverride { var: String, value: String },

    #[error("master passphrase not set (export {var})")]
    MissingPassphrase { var: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for opening a block store.
///
/// The passphrase itself is never part of the file; only the name of the
/// environment variable holding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockVaultConfig {
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Upper bound for any single client operation.
    pub operation_timeout_ms: u64,
    /// How long SQLite waits on a locked database before failing busy.
    pub busy_timeout_ms: u64,
    /// Environment variable the passphrase is read from.
    pub passphrase_env: String,
    /// Argon2id parameters used when a new store is initialized.
    pub kdf: KdfParams,
}

impl Default for BlockVaultConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("blockvault.db"),
            operation_timeout_ms: 30_000,
            busy_timeout_ms: 5_000,
            passphrase_env: DEFAULT_PASSPHRASE_ENV.to_string(),
            kdf: KdfParams::default(),
        }
    }
}

impl BlockVaultConfig {
    /// Parses a TOML document; missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Applies `BLOCKVAULT_DATABASE` / `BLOCKVAULT_TIMEOUT_MS` from the
    /// process environment.
    pub fn with_env_overrides(self) -> ConfigResult<Self> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        if let Some(path) = lookup(DATABASE_ENV).filter(|p| !p.is_empty()) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            self.operation_timeout_ms =
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidOverride {
                        var: TIMEOUT_ENV.to_string(),
                        value: raw.clone(),
                    })?;
        }
        Ok(self)
    }

    /// Reads the master passphrase from the process environment.
    pub fn passphrase(&self) -> ConfigResult<Zeroizing<String>> {
        self.passphrase_from(|var| std::env::var(var).ok())
    }

    pub fn passphrase_from(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<Zeroizing<String>> {
        lookup(&self.passphrase_env)
            .filter(|p| !p.is_empty())
            .map(Zeroizing::new)
            .ok_or_else(|| ConfigError::MissingPassphrase {
                var: self.passphrase_env.clone(),
            })
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
