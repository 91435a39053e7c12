//! Block type registry with a read-through cache.

use crate::error::{BlockError, BlockResult};
use blockvault_model::SchemaType;
use blockvault_storage::{StorageBackend, StorageError};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Attempts at claiming a version number before giving up to concurrent
/// writers.
const REGISTER_ATTEMPTS: usize = 3;

/// Registered block types, cached in memory.
///
/// A `(slug, version)` pair never changes once stored, so cached versions
/// are only evicted when the type is deleted. The latest-version index is
/// updated by every registration made through this registry; registrations
/// themselves always read the latest version from the backend, so versions
/// stored by other handles are never overwritten or skipped.
pub struct SchemaRegistry {
    backend: Arc<dyn StorageBackend>,
    versions: RwLock<HashMap<(String, u32), Arc<SchemaType>>>,
    latest: RwLock<HashMap<String, u32>>,
}

impl SchemaRegistry {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            versions: RwLock::new(HashMap::new()),
            latest: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a block type.
    ///
    /// Re-registering an identical definition (same checksum) is a no-op;
    /// a different definition under an existing slug fails with
    /// [`BlockError::SchemaConflict`].
    pub fn register(&self, schema: SchemaType) -> BlockResult<String> {
        validate(&schema)?;
        if let Some(existing) = self.latest_stored(&schema.slug)? {
            return same_or_conflict(&existing, &schema).map(|()| schema.slug);
        }

        match self.backend.insert_schema(&schema) {
            Ok(()) => {}
            // Lost a race with another writer; accept it if it wrote the same thing.
            Err(StorageError::AlreadyExists(_)) => {
                let existing = self
                    .latest_stored(&schema.slug)?
                    .ok_or_else(|| BlockError::not_found(format!("block type '{}'", schema.slug)))?;
                return same_or_conflict(&existing, &schema).map(|()| schema.slug);
            }
            Err(e) => return Err(e.into()),
        }

        info!(slug = %schema.slug, version = schema.version, "registered block type");
        let slug = schema.slug.clone();
        self.remember(schema, true);
        Ok(slug)
    }

    /// Stores `schema` as the next version of its slug (version 1 for a new
    /// slug). Returns the stored version. An unchanged definition returns
    /// the current version without writing.
    ///
    /// If another handle claims the version number first, the latest
    /// version is re-read and the next number tried.
    pub fn register_version(&self, mut schema: SchemaType) -> BlockResult<(String, u32)> {
        validate(&schema)?;
        for _ in 0..REGISTER_ATTEMPTS {
            let next = match self.latest_stored(&schema.slug)? {
                Some(latest) if latest.checksum() == schema.checksum() => {
                    debug!(slug = %schema.slug, version = latest.version, "block type unchanged");
                    return Ok((schema.slug, latest.version));
                }
                Some(latest) => latest.version + 1,
                None => 1,
            };
            schema.version = next;
            match self.backend.insert_schema(&schema) {
                Ok(()) => {
                    info!(slug = %schema.slug, version = next, "registered block type version");
                    let slug = schema.slug.clone();
                    self.remember(schema, true);
                    return Ok((slug, next));
                }
                Err(StorageError::AlreadyExists(_)) => {
                    debug!(slug = %schema.slug, version = next, "block type version taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(BlockError::Transient {
            operation: "register block type version".into(),
            reason: format!(
                "concurrent writers kept claiming the next version of '{}'",
                schema.slug
            ),
        })
    }

    /// Latest version of a block type.
    pub fn get(&self, slug: &str) -> BlockResult<Arc<SchemaType>> {
        self.require(slug, None)
    }

    pub fn get_version(&self, slug: &str, version: u32) -> BlockResult<Arc<SchemaType>> {
        self.require(slug, Some(version))
    }

    pub fn contains(&self, slug: &str) -> BlockResult<bool> {
        Ok(self.find(slug, None)?.is_some())
    }

    /// Latest version of every block type, ordered by slug.
    pub fn list(&self) -> BlockResult<Vec<SchemaType>> {
        Ok(self.backend.list_schemas()?)
    }

    /// Removes every version of a block type. Fails if documents remain.
    pub fn delete(&self, slug: &str) -> BlockResult<usize> {
        let removed = self.backend.delete_schema(slug)?;
        self.versions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(cached, _), _| cached != slug);
        self.latest
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(slug);
        info!(slug, versions = removed, "deleted block type");
        Ok(removed)
    }

    /// Drops every cached entry, e.g. after another process registered
    /// new versions.
    pub fn clear_cache(&self) {
        self.versions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.latest
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Latest stored version, bypassing the latest-version index and
    /// refreshing it.
    fn latest_stored(&self, slug: &str) -> BlockResult<Option<Arc<SchemaType>>> {
        Ok(self
            .backend
            .schema(slug, None)?
            .map(|schema| self.remember(schema, true)))
    }

    fn require(&self, slug: &str, version: Option<u32>) -> BlockResult<Arc<SchemaType>> {
        self.find(slug, version)?.ok_or_else(|| match version {
            Some(v) => BlockError::not_found(format!("block type '{slug}' v{v}")),
            None => BlockError::not_found(format!("block type '{slug}'")),
        })
    }

    fn find(&self, slug: &str, version: Option<u32>) -> BlockResult<Option<Arc<SchemaType>>> {
        let version = match version {
            Some(v) => Some(v),
            None => self
                .latest
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(slug)
                .copied(),
        };
        if let Some(v) = version {
            let cached = self
                .versions
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&(slug.to_string(), v))
                .cloned();
            if cached.is_some() {
                return Ok(cached);
            }
        }

        let Some(schema) = self.backend.schema(slug, version)? else {
            return Ok(None);
        };
        debug!(slug, version = schema.version, "cached block type");
        Ok(Some(self.remember(schema, version.is_none())))
    }

    fn remember(&self, schema: SchemaType, is_latest: bool) -> Arc<SchemaType> {
        let schema = Arc::new(schema);
        if is_latest {
            let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
            let entry = latest.entry(schema.slug.clone()).or_insert(schema.version);
            *entry = (*entry).max(schema.version);
        }
        self.versions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((schema.slug.clone(), schema.version), schema.clone());
        schema
    }
}

fn validate(schema: &SchemaType) -> BlockResult<()> {
    schema
        .validate_definition()
        .map_err(|e| BlockError::invalid_type(&schema.slug, e.to_string()))
}

fn same_or_conflict(existing: &SchemaType, incoming: &SchemaType) -> BlockResult<()> {
    let (existing_sum, incoming_sum) = (existing.checksum(), incoming.checksum());
    if existing_sum == incoming_sum {
        debug!(slug = %incoming.slug, "block type already registered");
        return Ok(());
    }
    Err(BlockError::SchemaConflict {
        slug: incoming.slug.clone(),
        existing: existing_sum,
        incoming: incoming_sum,
    })
}
