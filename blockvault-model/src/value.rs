use crate::error::ModelError;
use blockvault_types::{BlockKey, SecretValue};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// JSON object key marking a reference, e.g. `{"$ref": "aws-credentials/prod"}`.
pub const REF_KEY: &str = "$ref";

/// A typed field value inside a [`Document`](crate::Document).
///
/// Serialization masks secrets; use [`FieldValue::expose_json`] where the
/// cleartext is required.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<FieldValue>),
    Mapping(BTreeMap<String, FieldValue>),
    Secret(SecretValue),
    Reference(BlockKey),
}

impl FieldValue {
    /// Wraps a raw value as a secret.
    pub fn secret(raw: impl Into<Value>) -> Self {
        Self::Secret(SecretValue::new(raw))
    }

    /// Reference to another document.
    pub fn reference(key: BlockKey) -> Self {
        Self::Reference(key)
    }

    /// Short type label used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Mapping(_) => "mapping",
            Self::Secret(_) => "secret",
            Self::Reference(_) => "reference",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_secret(&self) -> Option<&SecretValue> {
        match self {
            Self::Secret(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&BlockKey> {
        match self {
            Self::Reference(k) => Some(k),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Cleartext JSON form. Secrets are exposed, references become
    /// `{"$ref": "..."}`.
    pub fn expose_json(&self) -> Value {
        self.to_json(true)
    }

    /// Masked JSON form, identical to what `Serialize` produces.
    pub fn masked_json(&self) -> Value {
        self.to_json(false)
    }

    fn to_json(&self, expose: bool) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::String(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(|v| v.to_json(expose)).collect()),
            Self::Mapping(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json(expose)))
                    .collect(),
            ),
            Self::Secret(s) if expose => s.expose().clone(),
            Self::Secret(s) => s.masked(),
            Self::Reference(key) => reference_json(key),
        }
    }

    /// Visits every reference in this value with its JSON pointer, relative
    /// to `base`.
    pub fn walk_references<'a>(&'a self, base: &str, visit: &mut dyn FnMut(String, &'a BlockKey)) {
        match self {
            Self::Reference(key) => visit(base.to_string(), key),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    item.walk_references(&format!("{base}/{i}"), visit);
                }
            }
            Self::Mapping(map) => {
                for (k, v) in map {
                    v.walk_references(&format!("{base}/{}", escape_pointer(k)), visit);
                }
            }
            _ => {}
        }
    }

    /// Whether any reference appears anywhere in this value.
    pub fn contains_reference(&self) -> bool {
        let mut found = false;
        self.walk_references("", &mut |_, _| found = true);
        found
    }

    /// Whether this value, or any value nested in its lists and mappings,
    /// satisfies `pred`.
    pub fn any(&self, pred: &dyn Fn(&FieldValue) -> bool) -> bool {
        pred(self)
            || match self {
                Self::List(items) => items.iter().any(|v| v.any(pred)),
                Self::Mapping(map) => map.values().any(|v| v.any(pred)),
                _ => false,
            }
    }
}

fn reference_json(key: &BlockKey) -> Value {
    let mut map = Map::new();
    map.insert(REF_KEY.to_string(), Value::String(key.to_string()));
    Value::Object(map)
}

/// Escapes a mapping key for use as a JSON pointer token (RFC 6901).
pub fn escape_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

impl TryFrom<Value> for FieldValue {
    type Error = ModelError;

    /// Converts plain JSON. `{"$ref": "slug/name"}` becomes a reference;
    /// secrets are never produced here, the schema decides that.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(
                items
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(Value::String(target)) = map.get(REF_KEY) {
                        return Ok(Self::Reference(BlockKey::parse(target)?));
                    }
                }
                Self::Mapping(
                    map.into_iter()
                        .map(|(k, v)| Ok((k, Self::try_from(v)?)))
                        .collect::<Result<_, ModelError>>()?,
                )
            }
        })
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.masked_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::try_from(value).map_err(serde::de::Error::custom)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<SecretValue> for FieldValue {
    fn from(value: SecretValue) -> Self {
        Self::Secret(value)
    }
}

impl From<BlockKey> for FieldValue {
    fn from(value: BlockKey) -> Self {
        Self::Reference(value)
    }
}

/// Builds a value map from `(name, value)` pairs.
pub fn values<K, V, I>(pairs: I) -> BTreeMap<String, FieldValue>
where
    K: Into<String>,
    V: Into<FieldValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
