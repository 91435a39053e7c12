//! At-rest encoding of documents.
//!
//! Non-secret fields are stored as plain JSON (references as
//! `{"$ref": "slug/name"}`). Each secret field is serialized, sealed through
//! the [`DataEncryptor`] with the context `type_slug/name#field`, and stored
//! as `{"$secret": "<base64 envelope>"}`.

use crate::backend::StoredDocument;
use crate::error::{StorageError, StorageResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use blockvault_crypto::{DataEncryptor, DerivedKey};
use blockvault_model::{Document, FieldValue};
use blockvault_types::SecretValue;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use zeroize::Zeroize;

/// Marker key of a sealed secret in a stored body.
pub const SECRET_KEY: &str = "$secret";

/// Converts between [`Document`] and [`StoredDocument`], sealing secrets.
#[derive(Clone)]
pub struct DocumentCodec {
    encryptor: Arc<dyn DataEncryptor>,
}

impl DocumentCodec {
    pub fn new(encryptor: Arc<dyn DataEncryptor>) -> Self {
        Self { encryptor }
    }

    pub fn encryptor(&self) -> &Arc<dyn DataEncryptor> {
        &self.encryptor
    }

    /// Seals secret fields and serializes the body.
    pub fn encode(&self, document: &Document) -> StorageResult<StoredDocument> {
        let mut body = Map::new();
        for (field, value) in &document.values {
            let encoded = match value {
                FieldValue::Secret(secret) => {
                    let context = secret_context(&document.type_slug, &document.name, field);
                    self.seal(&context, secret)?
                }
                other => {
                    let json = other.expose_json();
                    if sealed_payload(&json).is_some() {
                        return Err(StorageError::InvalidData(format!(
                            "field '{field}' uses the reserved {SECRET_KEY} marker"
                        )));
                    }
                    json
                }
            };
            body.insert(field.clone(), encoded);
        }

        Ok(StoredDocument {
            id: document.id,
            type_slug: document.type_slug.clone(),
            name: document.name.clone(),
            schema_version: document.schema_version,
            version: document.version,
            body: serde_json::to_string(&Value::Object(body))?,
            created_at: document.created_at,
            updated_at: document.updated_at,
        })
    }

    /// Parses the body and opens sealed secrets.
    pub fn decode(&self, stored: StoredDocument) -> StorageResult<Document> {
        let body: Map<String, Value> = serde_json::from_str(&stored.body)?;
        let mut values = BTreeMap::new();
        for (field, json) in body {
            let value = match sealed_payload(&json) {
                Some(encoded) => {
                    let context = secret_context(&stored.type_slug, &stored.name, &field);
                    FieldValue::Secret(self.open(&context, encoded)?)
                }
                None => FieldValue::try_from(json)?,
            };
            values.insert(field, value);
        }

        Ok(Document {
            id: stored.id,
            type_slug: stored.type_slug,
            schema_version: stored.schema_version,
            name: stored.name,
            values,
            version: stored.version,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    /// Re-wraps every sealed secret in `stored` from `old_key` to `new_key`.
    /// Returns the new body, or `None` when the document holds no secrets.
    pub fn rewrap(
        &self,
        stored: &StoredDocument,
        old_key: &DerivedKey,
        new_key: &DerivedKey,
    ) -> StorageResult<Option<String>> {
        let mut body: Map<String, Value> = serde_json::from_str(&stored.body)?;
        let mut changed = false;
        for (field, json) in body.iter_mut() {
            let Some(encoded) = sealed_payload(json) else {
                continue;
            };
            let context = secret_context(&stored.type_slug, &stored.name, field);
            let sealed = decode_b64(encoded)?;
            let rewrapped = self
                .encryptor
                .reencrypt_bytes(&context, &sealed, old_key, new_key)?;
            *json = sealed_json(&rewrapped);
            changed = true;
        }
        if !changed {
            return Ok(None);
        }
        Ok(Some(serde_json::to_string(&Value::Object(body))?))
    }

    fn seal(&self, context: &str, secret: &SecretValue) -> StorageResult<Value> {
        let mut plaintext = serde_json::to_vec(secret.expose())?;
        let sealed = self.encryptor.encrypt_bytes(context, &plaintext);
        plaintext.zeroize();
        Ok(sealed_json(&sealed?))
    }

    fn open(&self, context: &str, encoded: &str) -> StorageResult<SecretValue> {
        let sealed = decode_b64(encoded)?;
        let mut plaintext = self.encryptor.decrypt_bytes(context, &sealed)?;
        let raw = serde_json::from_slice::<Value>(&plaintext);
        plaintext.zeroize();
        Ok(SecretValue::new(raw?))
    }
}

/// Associated-data context binding a sealed value to its document field.
pub fn secret_context(type_slug: &str, name: &str, field: &str) -> String {
    format!("{type_slug}/{name}#{field}")
}

fn sealed_json(sealed: &[u8]) -> Value {
    let mut map = Map::new();
    map.insert(SECRET_KEY.to_string(), Value::String(STANDARD.encode(sealed)));
    Value::Object(map)
}

fn sealed_payload(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get(SECRET_KEY).and_then(Value::as_str),
        _ => None,
    }
}

fn decode_b64(encoded: &str) -> StorageResult<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .map_err(|e| StorageError::InvalidData(format!("bad sealed secret encoding: {e}")))
}
