//! SQLite backend.
//!
//! One connection behind a mutex; conditional writes run inside an
//! `IMMEDIATE` transaction so the existence/version check and the write are
//! a single unit even across processes sharing the file.

use crate::backend::{
    check_sealing_key, resolve_write, ExistingRow, StorageBackend, StoredDocument, WriteCondition,
};
use crate::error::{StorageError, StorageResult};
use crate::keyring::KEY_CHECK_KEY;
use blockvault_model::{DocumentSummary, SchemaType};
use blockvault_types::{BlockKey, DocumentId};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Default time a writer waits on a locked database before failing busy.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const DOCUMENT_COLUMNS: &str =
    "id, type_slug, name, schema_version, version, body, created_at, updated_at";

/// Persistent backend over a single SQLite file.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Opens (or creates) a store at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        debug!(path = %path.display(), "opened sqlite store");
        Self::with_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        let backend = Self {
            conn: Mutex::new(conn),
        };
        backend.init_schema()?;
        Ok(backend)
    }

    fn init_schema(&self) -> StorageResult<()> {
        let conn = self.lock();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS block_types (
                slug TEXT NOT NULL,
                version INTEGER NOT NULL,
                checksum TEXT NOT NULL,
                definition TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (slug, version)
            );

            CREATE TABLE IF NOT EXISTS block_documents (
                id TEXT PRIMARY KEY,
                type_slug TEXT NOT NULL,
                name TEXT NOT NULL,
                schema_version INTEGER NOT NULL,
                version INTEGER NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(type_slug, name)
            );

            CREATE INDEX IF NOT EXISTS idx_block_documents_type
                ON block_documents(type_slug);

            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Column values of one `block_documents` row before parsing.
struct DocumentRow {
    id: String,
    type_slug: String,
    name: String,
    schema_version: i64,
    version: i64,
    body: String,
    created_at: String,
    updated_at: String,
}

impl DocumentRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            type_slug: row.get(1)?,
            name: row.get(2)?,
            schema_version: row.get(3)?,
            version: row.get(4)?,
            body: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_document(self) -> StorageResult<StoredDocument> {
        Ok(StoredDocument {
            id: parse_id(&self.id)?,
            type_slug: self.type_slug,
            name: self.name,
            schema_version: to_u32(self.schema_version)?,
            version: to_u64(self.version)?,
            body: self.body,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn parse_id(s: &str) -> StorageResult<DocumentId> {
    DocumentId::parse(s).map_err(|e| StorageError::InvalidData(format!("bad document id {s:?}: {e}")))
}

fn parse_timestamp(s: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidData(format!("bad timestamp {s:?}: {e}")))
}

fn to_u32(v: i64) -> StorageResult<u32> {
    u32::try_from(v).map_err(|_| StorageError::InvalidData(format!("value out of range: {v}")))
}

fn to_u64(v: i64) -> StorageResult<u64> {
    u64::try_from(v).map_err(|_| StorageError::InvalidData(format!("value out of range: {v}")))
}

fn to_i64(v: u64) -> StorageResult<i64> {
    i64::try_from(v).map_err(|_| StorageError::InvalidData(format!("value out of range: {v}")))
}

fn parse_schema(definition: &str) -> StorageResult<SchemaType> {
    Ok(serde_json::from_str(definition)?)
}

impl StorageBackend for SqliteBackend {
    fn insert_schema(&self, schema: &SchemaType) -> StorageResult<()> {
        let definition = serde_json::to_string(schema)?;
        let conn = self.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO block_types (slug, version, checksum, definition, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                schema.slug,
                schema.version,
                schema.checksum(),
                definition,
                Utc::now().to_rfc3339(),
            ],
        )?;
        if inserted == 0 {
            return Err(StorageError::AlreadyExists(format!(
                "{} v{}",
                schema.slug, schema.version
            )));
        }
        Ok(())
    }

    fn schema(&self, slug: &str, version: Option<u32>) -> StorageResult<Option<SchemaType>> {
        let conn = self.lock();
        let definition: Option<String> = match version {
            Some(v) => conn
                .query_row(
                    "SELECT definition FROM block_types WHERE slug = ?1 AND version = ?2",
                    params![slug, v],
                    |row| row.get(0),
                )
                .optional()?,
            None => conn
                .query_row(
                    "SELECT definition FROM block_types WHERE slug = ?1
                     ORDER BY version DESC LIMIT 1",
                    params![slug],
                    |row| row.get(0),
                )
                .optional()?,
        };
        definition.as_deref().map(parse_schema).transpose()
    }

    fn list_schemas(&self) -> StorageResult<Vec<SchemaType>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT definition FROM block_types t
             WHERE version = (SELECT MAX(version) FROM block_types WHERE slug = t.slug)
             ORDER BY slug",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut schemas = Vec::new();
        for row in rows {
            schemas.push(parse_schema(&row?)?);
        }
        Ok(schemas)
    }

    fn delete_schema(&self, slug: &str) -> StorageResult<usize> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let documents: i64 = tx.query_row(
            "SELECT COUNT(*) FROM block_documents WHERE type_slug = ?1",
            params![slug],
            |row| row.get(0),
        )?;
        if documents > 0 {
            return Err(StorageError::InUse {
                slug: slug.to_string(),
                documents: documents as usize,
            });
        }
        let removed = tx.execute("DELETE FROM block_types WHERE slug = ?1", params![slug])?;
        if removed == 0 {
            return Err(StorageError::NotFound(format!("block type '{slug}'")));
        }
        tx.commit()?;
        Ok(removed)
    }

    fn write_document(
        &self,
        document: StoredDocument,
        condition: WriteCondition,
        sealed_with: Option<&str>,
    ) -> StorageResult<StoredDocument> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if sealed_with.is_some() {
            let current: Option<String> = tx
                .query_row(
                    "SELECT value FROM metadata WHERE key = ?1",
                    params![KEY_CHECK_KEY],
                    |row| row.get(0),
                )
                .optional()?;
            check_sealing_key(current.as_deref(), sealed_with)?;
        }

        let existing = tx
            .query_row(
                "SELECT id, version, created_at FROM block_documents
                 WHERE type_slug = ?1 AND name = ?2",
                params![document.type_slug, document.name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        let existing = match existing {
            Some((id, version, created_at)) => Some(ExistingRow {
                id: parse_id(&id)?,
                version: to_u64(version)?,
                created_at: parse_timestamp(&created_at)?,
            }),
            None => None,
        };

        let record = resolve_write(existing, document, condition)?;
        tx.execute(
            "INSERT INTO block_documents (id, type_slug, name, schema_version, version, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(type_slug, name) DO UPDATE SET
                schema_version = excluded.schema_version,
                version = excluded.version,
                body = excluded.body,
                updated_at = excluded.updated_at",
            params![
                record.id.to_string(),
                record.type_slug,
                record.name,
                record.schema_version,
                to_i64(record.version)?,
                record.body,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(record)
    }

    fn document(&self, key: &BlockKey) -> StorageResult<Option<StoredDocument>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM block_documents WHERE type_slug = ?1 AND name = ?2"
                ),
                params![key.type_slug, key.name],
                DocumentRow::read,
            )
            .optional()?;
        row.map(DocumentRow::into_document).transpose()
    }

    fn document_by_id(&self, id: DocumentId) -> StorageResult<Option<StoredDocument>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM block_documents WHERE id = ?1"),
                params![id.to_string()],
                DocumentRow::read,
            )
            .optional()?;
        row.map(DocumentRow::into_document).transpose()
    }

    fn delete_document(&self, key: &BlockKey) -> StorageResult<DocumentId> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let id: Option<String> = tx
            .query_row(
                "SELECT id FROM block_documents WHERE type_slug = ?1 AND name = ?2",
                params![key.type_slug, key.name],
                |row| row.get(0),
            )
            .optional()?;
        let Some(id) = id else {
            return Err(StorageError::NotFound(format!("block document '{key}'")));
        };
        tx.execute("DELETE FROM block_documents WHERE id = ?1", params![id])?;
        tx.commit()?;
        parse_id(&id)
    }

    fn delete_document_by_id(&self, id: DocumentId) -> StorageResult<BlockKey> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let key: Option<(String, String)> = tx
            .query_row(
                "SELECT type_slug, name FROM block_documents WHERE id = ?1",
                params![id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((type_slug, name)) = key else {
            return Err(StorageError::NotFound(format!("block document {id}")));
        };
        tx.execute("DELETE FROM block_documents WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;
        Ok(BlockKey { type_slug, name })
    }

    fn list_documents(&self, type_slug: Option<&str>) -> StorageResult<Vec<DocumentSummary>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM block_documents
             WHERE ?1 IS NULL OR type_slug = ?1
             ORDER BY type_slug, name"
        ))?;
        let rows = stmt.query_map(params![type_slug], DocumentRow::read)?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?.into_document()?.summary());
        }
        Ok(summaries)
    }

    fn metadata(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn put_metadata(&self, entries: &[(&str, String)]) -> StorageResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO metadata (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn rewrite_bodies(
        &self,
        transform: &mut dyn FnMut(&StoredDocument) -> StorageResult<Option<String>>,
        metadata: &[(&str, String)],
    ) -> StorageResult<usize> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let rows = {
            let mut stmt = tx.prepare(&format!("SELECT {DOCUMENT_COLUMNS} FROM block_documents"))?;
            let rows = stmt.query_map([], DocumentRow::read)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut rewritten = 0;
        for row in rows {
            let document = row.into_document()?;
            if let Some(body) = transform(&document)? {
                tx.execute(
                    "UPDATE block_documents SET body = ?1 WHERE id = ?2",
                    params![body, document.id.to_string()],
                )?;
                rewritten += 1;
            }
        }
        for (key, value) in metadata {
            tx.execute(
                "INSERT INTO metadata (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(rewritten)
    }
}
