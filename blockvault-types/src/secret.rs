//! Secret value wrapper with suppressed rendering.
//!
//! A [`SecretValue`] holds a raw JSON value (a string for secret strings, an
//! object for secret mappings). Every generic rendering path (`Debug`,
//! `Display`, `Serialize`) emits [`SECRET_MASK`] in place of the raw leaves.
//! The raw value is only reachable through [`SecretValue::expose`] and
//! [`SecretValue::into_inner`].

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use zeroize::Zeroize;

/// Fixed-width placeholder substituted for every secret leaf.
pub const SECRET_MASK: &str = "********";

/// A secret raw value. Equality compares raw values.
#[derive(Clone)]
pub struct SecretValue {
    raw: Value,
}

impl SecretValue {
    /// Wraps a raw value.
    pub fn new(raw: impl Into<Value>) -> Self {
        Self { raw: raw.into() }
    }

    /// Returns the raw value.
    ///
    /// Call this only where the cleartext is actually needed, such as when
    /// handing credentials to an external service or sealing for storage.
    #[must_use]
    pub fn expose(&self) -> &Value {
        &self.raw
    }

    /// Returns the raw value if it is a string.
    #[must_use]
    pub fn expose_str(&self) -> Option<&str> {
        self.raw.as_str()
    }

    /// Consumes the wrapper and returns the raw value.
    #[must_use]
    pub fn into_inner(mut self) -> Value {
        std::mem::take(&mut self.raw)
    }

    /// Whether the raw value is a mapping (the secret-dict form).
    #[must_use]
    pub fn is_mapping(&self) -> bool {
        self.raw.is_object()
    }

    /// The masked rendering: mappings keep their keys and mask every leaf,
    /// recursively; any other value collapses to [`SECRET_MASK`].
    #[must_use]
    pub fn masked(&self) -> Value {
        mask_value(&self.raw)
    }
}

fn mask_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), mask_value(v)))
                .collect(),
        ),
        _ => Value::String(SECRET_MASK.to_string()),
    }
}

fn zeroize_value(value: &mut Value) {
    match value {
        Value::String(s) => s.zeroize(),
        Value::Array(items) => items.iter_mut().for_each(zeroize_value),
        Value::Object(map) => map.values_mut().for_each(zeroize_value),
        _ => {}
    }
}

impl Zeroize for SecretValue {
    fn zeroize(&mut self) {
        zeroize_value(&mut self.raw);
        self.raw = Value::Null;
    }
}

impl Drop for SecretValue {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl PartialEq for SecretValue {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.masked() {
            Value::String(mask) => f.write_str(&mask),
            other => write!(f, "{other}"),
        }
    }
}

impl Serialize for SecretValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.masked().serialize(serializer)
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Value> for SecretValue {
    fn from(value: Value) -> Self {
        Self { raw: value }
    }
}
