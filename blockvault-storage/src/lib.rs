//! Storage layer for BlockVault.
//!
//! Persists block types, documents and store metadata behind the
//! [`StorageBackend`] trait.
//!
//! # Architecture
//!
//! - [`SqliteBackend`]: one SQLite file; conditional writes run in
//!   `IMMEDIATE` transactions
//! - [`MemoryBackend`]: mutex-guarded maps for tests
//! - [`DocumentCodec`]: seals secret fields before they reach a backend
//! - [`keyring`]: master key bootstrap, verification and rotation

mod backend;
mod codec;
mod error;
pub mod keyring;
mod memory;
mod sqlite;

pub use backend::{StorageBackend, StoredDocument, WriteCondition};
pub use codec::{secret_context, DocumentCodec, SECRET_KEY};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use sqlite::{SqliteBackend, DEFAULT_BUSY_TIMEOUT};
