//! The backend seam: everything the registry needs from persistent storage.

use crate::error::{StorageError, StorageResult};
use blockvault_model::{DocumentSummary, SchemaType};
use blockvault_types::{BlockKey, DocumentId};
use chrono::{DateTime, Utc};
use std::fmt;

/// A document as persisted: metadata plus the encoded field body.
#[derive(Clone, PartialEq)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub type_slug: String,
    pub name: String,
    pub schema_version: u32,
    pub version: u64,
    /// JSON object of field values. Secret fields are sealed as
    /// `{"$secret": "<base64>"}`.
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredDocument {
    pub fn key(&self) -> BlockKey {
        BlockKey {
            type_slug: self.type_slug.clone(),
            name: self.name.clone(),
        }
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id,
            key: self.key(),
            schema_version: self.schema_version,
            version: self.version,
            updated_at: self.updated_at,
        }
    }
}

impl fmt::Debug for StoredDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredDocument")
            .field("id", &self.id)
            .field("key", &self.key().to_string())
            .field("schema_version", &self.schema_version)
            .field("version", &self.version)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Precondition checked atomically with a document write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCondition {
    /// Fail with `AlreadyExists` if the key is taken.
    MustNotExist,
    /// Insert or overwrite (last writer wins).
    Any,
    /// Overwrite only if the stored version equals this one.
    Version(u64),
}

/// Persistent storage for block types, documents and store metadata.
///
/// Every method is one atomic unit: conditional writes check and write
/// inside the same transaction (or critical section).
pub trait StorageBackend: Send + Sync {
    // ── Block types ──────────────────────────────────────────────

    /// Stores one schema version. Fails with `AlreadyExists` if that
    /// `(slug, version)` is taken.
    fn insert_schema(&self, schema: &SchemaType) -> StorageResult<()>;

    /// A specific version, or the latest when `version` is `None`.
    fn schema(&self, slug: &str, version: Option<u32>) -> StorageResult<Option<SchemaType>>;

    /// Latest version of every block type, ordered by slug.
    fn list_schemas(&self) -> StorageResult<Vec<SchemaType>>;

    /// Removes every version of a block type. Fails with `NotFound` if none
    /// exist and `InUse` if documents of the type remain.
    fn delete_schema(&self, slug: &str) -> StorageResult<usize>;

    // ── Documents ────────────────────────────────────────────────

    /// Writes `document` under `condition` and returns what was stored.
    ///
    /// On overwrite the stored id and `created_at` are kept and the
    /// version is the previous one plus one; a fresh insert gets version 1.
    ///
    /// `sealed_with` is the key-check token of the master key that sealed
    /// the body. When given, the write fails with `StaleKey` unless it is
    /// still the stored token.
    fn write_document(
        &self,
        document: StoredDocument,
        condition: WriteCondition,
        sealed_with: Option<&str>,
    ) -> StorageResult<StoredDocument>;

    fn document(&self, key: &BlockKey) -> StorageResult<Option<StoredDocument>>;

    fn document_by_id(&self, id: DocumentId) -> StorageResult<Option<StoredDocument>>;

    /// Fails with `NotFound` if the key is absent.
    fn delete_document(&self, key: &BlockKey) -> StorageResult<DocumentId>;

    /// Fails with `NotFound` if the id is absent.
    fn delete_document_by_id(&self, id: DocumentId) -> StorageResult<BlockKey>;

    /// Summaries ordered by key, optionally restricted to one type.
    fn list_documents(&self, type_slug: Option<&str>) -> StorageResult<Vec<DocumentSummary>>;

    // ── Metadata ─────────────────────────────────────────────────

    fn metadata(&self, key: &str) -> StorageResult<Option<String>>;

    /// Writes all entries in one transaction.
    fn put_metadata(&self, entries: &[(&str, String)]) -> StorageResult<()>;

    /// Passes every document through `transform` and stores the bodies it
    /// returns, together with `metadata`, in one transaction. Returns the
    /// number of rewritten documents.
    fn rewrite_bodies(
        &self,
        transform: &mut dyn FnMut(&StoredDocument) -> StorageResult<Option<String>>,
        metadata: &[(&str, String)],
    ) -> StorageResult<usize>;
}

/// Rejects a write sealed under a key other than the store's current one.
pub(crate) fn check_sealing_key(
    stored: Option<&str>,
    sealed_with: Option<&str>,
) -> StorageResult<()> {
    match sealed_with {
        Some(expected) if stored != Some(expected) => Err(StorageError::StaleKey),
        _ => Ok(()),
    }
}

/// Identity of the row a write would replace.
pub(crate) struct ExistingRow {
    pub id: DocumentId,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

/// Applies `condition` to an incoming write. Used by every backend.
pub(crate) fn resolve_write(
    existing: Option<ExistingRow>,
    mut incoming: StoredDocument,
    condition: WriteCondition,
) -> StorageResult<StoredDocument> {
    let key = incoming.key().to_string();
    match (existing, condition) {
        (Some(_), WriteCondition::MustNotExist) => Err(StorageError::AlreadyExists(key)),
        (None, WriteCondition::Version(expected)) => Err(StorageError::Conflict {
            key,
            expected,
            actual: 0,
        }),
        (Some(row), WriteCondition::Version(expected)) if row.version != expected => {
            Err(StorageError::Conflict {
                key,
                expected,
                actual: row.version,
            })
        }
        (Some(row), _) => {
            incoming.id = row.id;
            incoming.created_at = row.created_at;
            incoming.version = row.version + 1;
            Ok(incoming)
        }
        (None, _) => {
            incoming.version = 1;
            Ok(incoming)
        }
    }
}
