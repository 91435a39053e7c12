//! The synchronous entry point tying registry, store and resolver together.

use crate::catalog;
use crate::error::{BlockError, BlockResult};
use crate::registry::SchemaRegistry;
use crate::resolver::{HydratedDocument, ReferenceResolver};
use crate::store::{DocumentStore, SaveOptions};
use blockvault_crypto::{generate_random_key, DataEncryptor, DerivedKey, KdfParams, MasterKeyEncryptor};
use blockvault_model::{BlockHandler, Document, DocumentSummary, FieldValue, SchemaType};
use blockvault_storage::{keyring, DocumentCodec, MemoryBackend, StorageBackend};
use blockvault_types::{BlockKey, DocumentId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Typed, secret-aware block storage.
///
/// ```ignore
/// let blocks = Blocks::open(backend, &passphrase, &KdfParams::default())?;
/// blocks.register_type(SchemaType::new("cube").with_field(FieldDefinition::float("edge_length_inches")))?;
/// blocks.save("cube", "rubiks-cube", values([("edge_length_inches", 2.25)]), false)?;
/// let cube = blocks.load("cube", "rubiks-cube")?;
/// ```
pub struct Blocks {
    backend: Arc<dyn StorageBackend>,
    schemas: Arc<SchemaRegistry>,
    store: DocumentStore,
    master: Option<Arc<MasterKeyEncryptor>>,
}

impl Blocks {
    /// Opens a store whose master key is derived from `passphrase`. The
    /// first open initializes the key; later opens must use the same
    /// passphrase.
    pub fn open(
        backend: Arc<dyn StorageBackend>,
        passphrase: &str,
        params: &KdfParams,
    ) -> BlockResult<Self> {
        let unlocked = keyring::unlock_with_passphrase(backend.as_ref(), passphrase, params)?;
        let master = Arc::new(MasterKeyEncryptor::new(unlocked.key));
        let blocks = Self::assemble(backend, master.clone(), Some(master));
        Ok(blocks.guarded_by(unlocked.key_check))
    }

    /// Opens a store with a raw 32-byte master key.
    pub fn with_master_key(backend: Arc<dyn StorageBackend>, key: DerivedKey) -> BlockResult<Self> {
        let key_check = keyring::unlock_with_key(backend.as_ref(), &key)?;
        let master = Arc::new(MasterKeyEncryptor::new(key));
        let blocks = Self::assemble(backend, master.clone(), Some(master));
        Ok(blocks.guarded_by(key_check))
    }

    /// Uses a caller-supplied encryptor. Key rotation is unavailable.
    pub fn with_encryptor(backend: Arc<dyn StorageBackend>, encryptor: Arc<dyn DataEncryptor>) -> Self {
        Self::assemble(backend, encryptor, None)
    }

    /// A throwaway in-memory store under a random master key.
    pub fn in_memory() -> Self {
        let master = Arc::new(MasterKeyEncryptor::new(generate_random_key()));
        Self::assemble(Arc::new(MemoryBackend::new()), master.clone(), Some(master))
    }

    fn assemble(
        backend: Arc<dyn StorageBackend>,
        encryptor: Arc<dyn DataEncryptor>,
        master: Option<Arc<MasterKeyEncryptor>>,
    ) -> Self {
        let schemas = Arc::new(SchemaRegistry::new(backend.clone()));
        let store = DocumentStore::new(backend.clone(), schemas.clone(), DocumentCodec::new(encryptor));
        for (slug, handler) in catalog::handlers() {
            store.register_handler(slug, handler);
        }
        Self {
            backend,
            schemas,
            store,
            master,
        }
    }

    fn guarded_by(self, key_check: String) -> Self {
        Self {
            store: self.store.with_sealing_key(key_check),
            ..self
        }
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    // ── Block types ──────────────────────────────────────────────

    pub fn register_type(&self, schema: SchemaType) -> BlockResult<String> {
        self.schemas.register(schema)
    }

    pub fn register_type_version(&self, schema: SchemaType) -> BlockResult<(String, u32)> {
        self.schemas.register_version(schema)
    }

    pub fn get_type(&self, slug: &str) -> BlockResult<Arc<SchemaType>> {
        self.schemas.get(slug)
    }

    pub fn get_type_version(&self, slug: &str, version: u32) -> BlockResult<Arc<SchemaType>> {
        self.schemas.get_version(slug, version)
    }

    pub fn list_types(&self) -> BlockResult<Vec<SchemaType>> {
        self.schemas.list()
    }

    pub fn delete_type(&self, slug: &str) -> BlockResult<usize> {
        self.schemas.delete(slug)
    }

    /// Registers every built-in block type. Safe to call repeatedly.
    pub fn install_builtins(&self) -> BlockResult<Vec<String>> {
        let slugs = catalog::catalog()
            .into_iter()
            .map(|schema| self.schemas.register(schema))
            .collect::<BlockResult<Vec<_>>>()?;
        info!(count = slugs.len(), "installed built-in block types");
        Ok(slugs)
    }

    /// The built-in block types, whether installed or not.
    pub fn catalog(&self) -> Vec<SchemaType> {
        catalog::catalog()
    }

    pub fn register_handler(&self, type_slug: &str, handler: Arc<dyn BlockHandler>) {
        self.store.register_handler(type_slug, handler);
    }

    // ── Documents ────────────────────────────────────────────────

    pub fn save(
        &self,
        type_slug: &str,
        name: &str,
        values: BTreeMap<String, FieldValue>,
        overwrite: bool,
    ) -> BlockResult<DocumentId> {
        self.store.save(type_slug, name, values, overwrite)
    }

    pub fn save_with(
        &self,
        type_slug: &str,
        name: &str,
        values: BTreeMap<String, FieldValue>,
        options: SaveOptions,
    ) -> BlockResult<DocumentSummary> {
        self.store.save_with(type_slug, name, values, options)
    }

    /// Loads a document and everything its references reach.
    pub fn load(&self, type_slug: &str, name: &str) -> BlockResult<HydratedDocument> {
        let document = self.store.load(type_slug, name)?;
        ReferenceResolver::new(&self.store).hydrate(document)
    }

    /// Loads a document without following references.
    pub fn load_raw(&self, type_slug: &str, name: &str) -> BlockResult<Document> {
        self.store.load(type_slug, name)
    }

    pub fn load_by_id(&self, id: DocumentId) -> BlockResult<Document> {
        self.store.load_by_id(id)
    }

    pub fn hydrate(&self, document: Document) -> BlockResult<HydratedDocument> {
        ReferenceResolver::new(&self.store).hydrate(document)
    }

    pub fn delete(&self, type_slug: &str, name: &str) -> BlockResult<DocumentId> {
        self.store.delete(type_slug, name)
    }

    pub fn delete_by_id(&self, id: DocumentId) -> BlockResult<BlockKey> {
        self.store.delete_by_id(id)
    }

    pub fn list(&self, type_slug: Option<&str>) -> BlockResult<Vec<DocumentSummary>> {
        self.store.list(type_slug)
    }

    // ── Keys ─────────────────────────────────────────────────────

    /// Moves every sealed secret from the old passphrase's key to a key
    /// derived from `new_passphrase`. Returns the number of rewritten
    /// documents.
    ///
    /// Other handles on the same store keep the old key; their writes fail
    /// with [`BlockError::Crypto`] until they are reopened.
    pub fn rotate_master_key(
        &self,
        old_passphrase: &str,
        new_passphrase: &str,
        params: &KdfParams,
    ) -> BlockResult<usize> {
        let master = self.master()?;
        self.store.switch_sealing_key(|| {
            let rotation = keyring::rotate_passphrase(
                self.backend.as_ref(),
                self.store.codec(),
                old_passphrase,
                new_passphrase,
                params,
            )?;
            master.unlock(rotation.key.key);
            Ok((rotation.key.key_check, rotation.rewritten))
        })
    }

    /// Raw-key counterpart of [`Blocks::rotate_master_key`].
    pub fn rotate_raw_key(&self, old_key: &DerivedKey, new_key: DerivedKey) -> BlockResult<usize> {
        let master = self.master()?;
        self.store.switch_sealing_key(|| {
            let rotation =
                keyring::rotate_key(self.backend.as_ref(), self.store.codec(), old_key, new_key)?;
            master.unlock(rotation.key.key);
            Ok((rotation.key.key_check, rotation.rewritten))
        })
    }

    fn master(&self) -> BlockResult<&Arc<MasterKeyEncryptor>> {
        self.master
            .as_ref()
            .ok_or_else(|| BlockError::Crypto("key rotation requires a master-key encryptor".into()))
    }
}
