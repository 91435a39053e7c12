//! Async façade over [`Blocks`].
//!
//! Every call runs on the blocking pool under a timeout. A call that times
//! out returns `Transient`; the blocking work itself is not cancelled and
//! finishes (or fails) in the background.

use crate::config::{BlockVaultConfig, ConfigError};
use blockvault_registry::{
    BlockError, BlockHandler, BlockKey, BlockResult, Blocks, Document, DocumentId,
    DocumentSummary, FieldValue, HydratedDocument, SaveOptions, SchemaType,
};
use blockvault_storage::SqliteBackend;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Block(#[from] BlockError),
}

/// Cheaply cloneable async handle to a block store.
#[derive(Clone)]
pub struct BlockClient {
    blocks: Arc<Blocks>,
    timeout: Duration,
}

impl BlockClient {
    pub fn new(blocks: Blocks, timeout: Duration) -> Self {
        Self {
            blocks: Arc::new(blocks),
            timeout,
        }
    }

    /// Opens the SQLite store named by `config`, reading the passphrase
    /// from the configured environment variable.
    pub async fn connect(config: &BlockVaultConfig) -> Result<Self, ClientError> {
        let passphrase = config.passphrase()?;
        Self::connect_with_passphrase(config, passphrase.as_str()).await
    }

    pub async fn connect_with_passphrase(
        config: &BlockVaultConfig,
        passphrase: &str,
    ) -> Result<Self, ClientError> {
        let path = config.database_path.clone();
        let busy_timeout = config.busy_timeout();
        let kdf = config.kdf.clone();
        let passphrase = zeroize::Zeroizing::new(passphrase.to_string());

        let connect = tokio::task::spawn_blocking(move || -> BlockResult<Blocks> {
            let backend = Arc::new(SqliteBackend::open(&path, busy_timeout)?);
            Blocks::open(backend, passphrase.as_str(), &kdf)
        });
        let blocks = settle("connect", config.operation_timeout(), connect).await?;
        info!(path = %config.database_path.display(), "connected to block store");
        Ok(Self::new(blocks, config.operation_timeout()))
    }

    /// A handle sharing this store with a different per-call timeout.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            blocks: self.blocks.clone(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The underlying synchronous store.
    pub fn blocks(&self) -> &Arc<Blocks> {
        &self.blocks
    }

    async fn run<T, F>(&self, operation: &'static str, f: F) -> BlockResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Blocks) -> BlockResult<T> + Send + 'static,
    {
        let blocks = self.blocks.clone();
        let task = tokio::task::spawn_blocking(move || f(&blocks));
        settle(operation, self.timeout, task).await
    }

    // ── Block types ──────────────────────────────────────────────

    pub async fn register_type(&self, schema: SchemaType) -> BlockResult<String> {
        self.run("register_type", move |b| b.register_type(schema))
            .await
    }

    pub async fn register_type_version(&self, schema: SchemaType) -> BlockResult<(String, u32)> {
        self.run("register_type_version", move |b| {
            b.register_type_version(schema)
        })
        .await
    }

    pub async fn get_type(&self, slug: &str) -> BlockResult<Arc<SchemaType>> {
        let slug = slug.to_string();
        self.run("get_type", move |b| b.get_type(&slug)).await
    }

    pub async fn list_types(&self) -> BlockResult<Vec<SchemaType>> {
        self.run("list_types", |b| b.list_types()).await
    }

    pub async fn delete_type(&self, slug: &str) -> BlockResult<usize> {
        let slug = slug.to_string();
        self.run("delete_type", move |b| b.delete_type(&slug)).await
    }

    pub async fn install_builtins(&self) -> BlockResult<Vec<String>> {
        self.run("install_builtins", |b| b.install_builtins()).await
    }

    pub fn register_handler(&self, type_slug: &str, handler: Arc<dyn BlockHandler>) {
        self.blocks.register_handler(type_slug, handler);
    }

    // ── Documents ────────────────────────────────────────────────

    pub async fn save(
        &self,
        type_slug: &str,
        name: &str,
        values: BTreeMap<String, FieldValue>,
        overwrite: bool,
    ) -> BlockResult<DocumentId> {
        let (type_slug, name) = (type_slug.to_string(), name.to_string());
        self.run("save", move |b| b.save(&type_slug, &name, values, overwrite))
            .await
    }

    pub async fn save_with(
        &self,
        type_slug: &str,
        name: &str,
        values: BTreeMap<String, FieldValue>,
        options: SaveOptions,
    ) -> BlockResult<DocumentSummary> {
        let (type_slug, name) = (type_slug.to_string(), name.to_string());
        self.run("save", move |b| b.save_with(&type_slug, &name, values, options))
            .await
    }

    /// Loads a document with its references resolved.
    pub async fn load(&self, type_slug: &str, name: &str) -> BlockResult<HydratedDocument> {
        let (type_slug, name) = (type_slug.to_string(), name.to_string());
        self.run("load", move |b| b.load(&type_slug, &name)).await
    }

    pub async fn load_raw(&self, type_slug: &str, name: &str) -> BlockResult<Document> {
        let (type_slug, name) = (type_slug.to_string(), name.to_string());
        self.run("load", move |b| b.load_raw(&type_slug, &name)).await
    }

    pub async fn load_by_id(&self, id: DocumentId) -> BlockResult<Document> {
        self.run("load", move |b| b.load_by_id(id)).await
    }

    pub async fn delete(&self, type_slug: &str, name: &str) -> BlockResult<DocumentId> {
        let (type_slug, name) = (type_slug.to_string(), name.to_string());
        self.run("delete", move |b| b.delete(&type_slug, &name)).await
    }

    pub async fn delete_by_id(&self, id: DocumentId) -> BlockResult<BlockKey> {
        self.run("delete", move |b| b.delete_by_id(id)).await
    }

    pub async fn list(&self, type_slug: Option<&str>) -> BlockResult<Vec<DocumentSummary>> {
        let type_slug = type_slug.map(str::to_string);
        self.run("list", move |b| b.list(type_slug.as_deref()))
            .await
    }

    pub async fn rotate_master_key(
        &self,
        old_passphrase: &str,
        new_passphrase: &str,
        params: blockvault_crypto::KdfParams,
    ) -> BlockResult<usize> {
        let old = zeroize::Zeroizing::new(old_passphrase.to_string());
        let new = zeroize::Zeroizing::new(new_passphrase.to_string());
        self.run("rotate_master_key", move |b| {
            b.rotate_master_key(&old, &new, &params)
        })
        .await
    }
}

/// Awaits a blocking task under `timeout`, mapping the outcome onto
/// [`BlockError`]. A panic inside the task is resumed on the caller.
async fn settle<T>(
    operation: &'static str,
    timeout: Duration,
    task: tokio::task::JoinHandle<BlockResult<T>>,
) -> BlockResult<T> {
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
        Ok(Err(join)) => Err(BlockError::Transient {
            operation: operation.to_string(),
            reason: format!("task cancelled: {join}"),
        }),
        Err(_) => {
            warn!(
                operation,
                timeout_ms = timeout.as_millis() as u64,
                "operation timed out"
            );
            Err(BlockError::Transient {
                operation: operation.to_string(),
                reason: format!("timed out after {} ms", timeout.as_millis()),
            })
        }
    }
}
