//! In-memory backend for tests and throwaway stores.

use crate::backend::{
    check_sealing_key, resolve_write, ExistingRow, StorageBackend, StoredDocument, WriteCondition,
};
use crate::error::{StorageError, StorageResult};
use crate::keyring::KEY_CHECK_KEY;
use blockvault_model::{DocumentSummary, SchemaType};
use blockvault_types::{BlockKey, DocumentId};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct State {
    schemas: BTreeMap<String, BTreeMap<u32, SchemaType>>,
    documents: BTreeMap<BlockKey, StoredDocument>,
    metadata: BTreeMap<String, String>,
}

/// Backend holding everything in a mutex-guarded map. Nothing survives the
/// process.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageBackend for MemoryBackend {
    fn insert_schema(&self, schema: &SchemaType) -> StorageResult<()> {
        let mut state = self.lock();
        let versions = state.schemas.entry(schema.slug.clone()).or_default();
        if versions.contains_key(&schema.version) {
            return Err(StorageError::AlreadyExists(format!(
                "{} v{}",
                schema.slug, schema.version
            )));
        }
        versions.insert(schema.version, schema.clone());
        Ok(())
    }

    fn schema(&self, slug: &str, version: Option<u32>) -> StorageResult<Option<SchemaType>> {
        let state = self.lock();
        let Some(versions) = state.schemas.get(slug) else {
            return Ok(None);
        };
        Ok(match version {
            Some(v) => versions.get(&v).cloned(),
            None => versions.values().next_back().cloned(),
        })
    }

    fn list_schemas(&self) -> StorageResult<Vec<SchemaType>> {
        let state = self.lock();
        Ok(state
            .schemas
            .values()
            .filter_map(|versions| versions.values().next_back().cloned())
            .collect())
    }

    fn delete_schema(&self, slug: &str) -> StorageResult<usize> {
        let mut state = self.lock();
        let documents = state
            .documents
            .keys()
            .filter(|key| key.type_slug == slug)
            .count();
        if documents > 0 {
            return Err(StorageError::InUse {
                slug: slug.to_string(),
                documents,
            });
        }
        state
            .schemas
            .remove(slug)
            .map(|versions| versions.len())
            .ok_or_else(|| StorageError::NotFound(format!("block type '{slug}'")))
    }

    fn write_document(
        &self,
        document: StoredDocument,
        condition: WriteCondition,
        sealed_with: Option<&str>,
    ) -> StorageResult<StoredDocument> {
        let mut state = self.lock();
        check_sealing_key(state.metadata.get(KEY_CHECK_KEY).map(String::as_str), sealed_with)?;
        let key = document.key();
        let existing = state.documents.get(&key).map(|row| ExistingRow {
            id: row.id,
            version: row.version,
            created_at: row.created_at,
        });
        let record = resolve_write(existing, document, condition)?;
        state.documents.insert(key, record.clone());
        Ok(record)
    }

    fn document(&self, key: &BlockKey) -> StorageResult<Option<StoredDocument>> {
        Ok(self.lock().documents.get(key).cloned())
    }

    fn document_by_id(&self, id: DocumentId) -> StorageResult<Option<StoredDocument>> {
        Ok(self
            .lock()
            .documents
            .values()
            .find(|doc| doc.id == id)
            .cloned())
    }

    fn delete_document(&self, key: &BlockKey) -> StorageResult<DocumentId> {
        self.lock()
            .documents
            .remove(key)
            .map(|doc| doc.id)
            .ok_or_else(|| StorageError::NotFound(format!("block document '{key}'")))
    }

    fn delete_document_by_id(&self, id: DocumentId) -> StorageResult<BlockKey> {
        let mut state = self.lock();
        let key = state
            .documents
            .values()
            .find(|doc| doc.id == id)
            .map(StoredDocument::key)
            .ok_or_else(|| StorageError::NotFound(format!("block document {id}")))?;
        state.documents.remove(&key);
        Ok(key)
    }

    fn list_documents(&self, type_slug: Option<&str>) -> StorageResult<Vec<DocumentSummary>> {
        Ok(self
            .lock()
            .documents
            .values()
            .filter(|doc| type_slug.is_none_or(|slug| doc.type_slug == slug))
            .map(StoredDocument::summary)
            .collect())
    }

    fn metadata(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock().metadata.get(key).cloned())
    }

    fn put_metadata(&self, entries: &[(&str, String)]) -> StorageResult<()> {
        let mut state = self.lock();
        for (key, value) in entries {
            state.metadata.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn rewrite_bodies(
        &self,
        transform: &mut dyn FnMut(&StoredDocument) -> StorageResult<Option<String>>,
        metadata: &[(&str, String)],
    ) -> StorageResult<usize> {
        let mut state = self.lock();

        // Compute everything first so a failure leaves the state untouched.
        let mut updates = Vec::new();
        for (key, doc) in &state.documents {
            if let Some(body) = transform(doc)? {
                updates.push((key.clone(), body));
            }
        }

        let rewritten = updates.len();
        for (key, body) in updates {
            if let Some(doc) = state.documents.get_mut(&key) {
                doc.body = body;
            }
        }
        for (key, value) in metadata {
            state.metadata.insert((*key).to_string(), value.clone());
        }
        Ok(rewritten)
    }
}
