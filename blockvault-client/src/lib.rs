//! Async client for BlockVault.
//!
//! [`BlockClient`] runs [`Blocks`](blockvault_registry::Blocks) operations
//! on tokio's blocking pool with a per-call timeout. [`BlockVaultConfig`]
//! carries the store location, timeouts and KDF settings.

mod client;
mod config;

pub use client::{BlockClient, ClientError};
pub use config::{
    BlockVaultConfig, ConfigError, ConfigResult, DATABASE_ENV, DEFAULT_PASSPHRASE_ENV,
    TIMEOUT_ENV,
};

use tracing_subscriber::EnvFilter;

/// Installs a compact `tracing` subscriber honouring `RUST_LOG`, falling
/// back to `default_directive` (e.g. `"info"`). Returns `false` if a global
/// subscriber was already set.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}
