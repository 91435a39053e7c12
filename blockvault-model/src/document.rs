use crate::value::FieldValue;
use blockvault_types::{BlockKey, DocumentId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A named, persisted instance of a block type.
///
/// `Serialize`, `Debug` and `Display` all mask secret fields. There is no
/// `Deserialize`: documents are rebuilt from storage by the at-rest codec.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: DocumentId,
    pub type_slug: String,
    pub schema_version: u32,
    pub name: String,
    pub values: BTreeMap<String, FieldValue>,
    /// Starts at 1, incremented by every overwrite.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// The `type_slug/name` key.
    pub fn key(&self) -> BlockKey {
        BlockKey {
            type_slug: self.type_slug.clone(),
            name: self.name.clone(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// Extract a string field.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    /// Extract a boolean field.
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(FieldValue::as_bool)
    }

    /// Extract a numeric field.
    pub fn get_number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(FieldValue::as_f64)
    }

    /// Every reference held by this document, keyed by JSON pointer.
    pub fn references(&self) -> Vec<(String, &BlockKey)> {
        let mut refs = Vec::new();
        for (name, value) in &self.values {
            let base = format!("/{}", crate::value::escape_pointer(name));
            value.walk_references(&base, &mut |pointer, key| refs.push((pointer, key)));
        }
        refs
    }

    /// Masked JSON rendering of the field values.
    pub fn masked_values(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.masked_json()))
                .collect(),
        )
    }

    /// Lightweight listing row.
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

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

/// Listing row for a document; never carries field values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub key: BlockKey,
    pub schema_version: u32,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}
