//! Document persistence: validation, secret sealing, conditional writes.

use crate::error::{BlockError, BlockResult};
use crate::registry::SchemaRegistry;
use blockvault_model::{validate_values, BlockHandler, Document, DocumentSummary, FieldValue};
use blockvault_storage::{DocumentCodec, StorageBackend, WriteCondition};
use blockvault_types::{BlockKey, DocumentId};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// How [`DocumentStore::save_with`] treats an existing document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Replace an existing document instead of failing with `AlreadyExists`.
    pub overwrite: bool,
    /// Only write if the stored version equals this. Implies `overwrite`.
    pub expected_version: Option<u64>,
}

impl SaveOptions {
    /// Create-only.
    pub fn create() -> Self {
        Self::default()
    }

    /// Insert or overwrite, last writer wins.
    pub fn overwrite() -> Self {
        Self {
            overwrite: true,
            expected_version: None,
        }
    }

    /// Overwrite only if the stored version is `version`.
    pub fn expect_version(version: u64) -> Self {
        Self {
            overwrite: true,
            expected_version: Some(version),
        }
    }

    fn condition(self) -> WriteCondition {
        match (self.expected_version, self.overwrite) {
            (Some(version), _) => WriteCondition::Version(version),
            (None, true) => WriteCondition::Any,
            (None, false) => WriteCondition::MustNotExist,
        }
    }
}

/// Validated, encrypted document storage on top of a [`StorageBackend`].
pub struct DocumentStore {
    backend: Arc<dyn StorageBackend>,
    schemas: Arc<SchemaRegistry>,
    codec: DocumentCodec,
    handlers: RwLock<HashMap<String, Arc<dyn BlockHandler>>>,
    /// Key-check token of the master key the codec seals with. Writes
    /// carry it so the backend rejects them once the key is rotated.
    sealing_key: RwLock<Option<String>>,
}

impl DocumentStore {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        schemas: Arc<SchemaRegistry>,
        codec: DocumentCodec,
    ) -> Self {
        Self {
            backend,
            schemas,
            codec,
            handlers: RwLock::new(HashMap::new()),
            sealing_key: RwLock::new(None),
        }
    }

    /// Guards every later write with `key_check`.
    pub fn with_sealing_key(self, key_check: String) -> Self {
        *self.sealing_key.write().unwrap_or_else(PoisonError::into_inner) = Some(key_check);
        self
    }

    /// Runs a master key switch with saves held off. `switch` returns the
    /// new key's check token, which guards every later write.
    pub(crate) fn switch_sealing_key<T>(
        &self,
        switch: impl FnOnce() -> BlockResult<(String, T)>,
    ) -> BlockResult<T> {
        let mut sealing_key = self.sealing_key.write().unwrap_or_else(PoisonError::into_inner);
        let (key_check, out) = switch()?;
        *sealing_key = Some(key_check);
        Ok(out)
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn codec(&self) -> &DocumentCodec {
        &self.codec
    }

    /// Attaches a handler to one block type, replacing any previous one.
    pub fn register_handler(&self, type_slug: &str, handler: Arc<dyn BlockHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(type_slug.to_string(), handler);
    }

    fn handler(&self, type_slug: &str) -> Option<Arc<dyn BlockHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(type_slug)
            .cloned()
    }

    /// Saves a document, failing with `AlreadyExists` unless `overwrite`.
    pub fn save(
        &self,
        type_slug: &str,
        name: &str,
        values: BTreeMap<String, FieldValue>,
        overwrite: bool,
    ) -> BlockResult<DocumentId> {
        let options = SaveOptions {
            overwrite,
            expected_version: None,
        };
        Ok(self.save_with(type_slug, name, values, options)?.id)
    }

    /// Saves a document under `options`.
    ///
    /// Values are validated against the latest version of the block type,
    /// defaults are filled in, and secret fields are sealed before the
    /// backend sees them. An overwrite keeps the document id and bumps
    /// its version.
    pub fn save_with(
        &self,
        type_slug: &str,
        name: &str,
        values: BTreeMap<String, FieldValue>,
        options: SaveOptions,
    ) -> BlockResult<DocumentSummary> {
        let key = BlockKey::new(type_slug, name)
            .map_err(|e| BlockError::invalid_document(type_slug, name, None, e.to_string()))?;
        let schema = self.schemas.get(type_slug)?;
        let values = validate_values(&schema, values)
            .map_err(|e| BlockError::from_model(type_slug, name, e))?;

        let now = Utc::now();
        let document = Document {
            id: DocumentId::new(),
            type_slug: key.type_slug,
            schema_version: schema.version,
            name: key.name,
            values,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        if let Some(handler) = self.handler(type_slug) {
            handler
                .validate(&document)
                .map_err(|reason| BlockError::invalid_document(type_slug, name, None, reason))?;
        }

        let stored = {
            let sealing_key = self.sealing_key.read().unwrap_or_else(PoisonError::into_inner);
            self.backend.write_document(
                self.codec.encode(&document)?,
                options.condition(),
                sealing_key.as_deref(),
            )?
        };
        info!(
            key = %stored.key(),
            version = stored.version,
            schema_version = stored.schema_version,
            "saved block document"
        );
        Ok(stored.summary())
    }

    /// Loads a document without resolving its references.
    pub fn load(&self, type_slug: &str, name: &str) -> BlockResult<Document> {
        let key = BlockKey::new(type_slug, name)
            .map_err(|e| BlockError::invalid_document(type_slug, name, None, e.to_string()))?;
        self.load_key(&key)
    }

    pub fn load_key(&self, key: &BlockKey) -> BlockResult<Document> {
        let stored = self
            .backend
            .document(key)?
            .ok_or_else(|| BlockError::not_found(format!("block document '{key}'")))?;
        self.finish_load(self.codec.decode(stored)?)
    }

    pub fn load_by_id(&self, id: DocumentId) -> BlockResult<Document> {
        let stored = self
            .backend
            .document_by_id(id)?
            .ok_or_else(|| BlockError::not_found(format!("block document {id}")))?;
        self.finish_load(self.codec.decode(stored)?)
    }

    /// Re-validates against the schema version the document was saved
    /// with, then runs the type's post-load hook.
    fn finish_load(&self, mut document: Document) -> BlockResult<Document> {
        let schema = self
            .schemas
            .get_version(&document.type_slug, document.schema_version)?;
        let values = std::mem::take(&mut document.values);
        document.values = validate_values(&schema, values)
            .map_err(|e| BlockError::from_model(&document.type_slug, &document.name, e))?;

        if let Some(handler) = self.handler(&document.type_slug) {
            handler.on_after_load(&mut document);
        }
        debug!(key = %document.key(), version = document.version, "loaded block document");
        Ok(document)
    }

    /// Deletes a document. A missing document is `NotFound`.
    pub fn delete(&self, type_slug: &str, name: &str) -> BlockResult<DocumentId> {
        let key = BlockKey::new(type_slug, name)
            .map_err(|e| BlockError::invalid_document(type_slug, name, None, e.to_string()))?;
        let id = self.backend.delete_document(&key)?;
        info!(key = %key, "deleted block document");
        Ok(id)
    }

    pub fn delete_by_id(&self, id: DocumentId) -> BlockResult<BlockKey> {
        let key = self.backend.delete_document_by_id(id)?;
        info!(key = %key, %id, "deleted block document");
        Ok(key)
    }

    /// Summaries ordered by key, optionally for one block type.
    pub fn list(&self, type_slug: Option<&str>) -> BlockResult<Vec<DocumentSummary>> {
        Ok(self.backend.list_documents(type_slug)?)
    }
}
