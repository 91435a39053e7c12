//! Identifier types used throughout BlockVault.
//!
//! Documents carry a UUID v7 [`DocumentId`] and are externally addressed by a
//! [`BlockKey`] of the form `type_slug/name`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum length of a slug or document name.
pub const MAX_SLUG_LEN: usize = 64;

/// Unique identifier for a stored document.
/// Uses UUID v7 which embeds a timestamp for natural ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Creates a new document ID with the current timestamp.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a document ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses a document ID from a string.
    pub fn parse(s: &str) -> Result<Self> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Checks that `value` is a valid slug: 1..=64 chars of `[a-z0-9-]`,
/// not starting or ending with `-`.
///
/// Both block type slugs and document names follow this rule, which keeps
/// `type_slug/name` unambiguous.
pub fn validate_slug(value: &str) -> Result<()> {
    if value.is_empty() || value.len() > MAX_SLUG_LEN {
        return Err(Error::InvalidSlug {
            value: value.to_string(),
            reason: format!("must be 1..={MAX_SLUG_LEN} characters"),
        });
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(Error::InvalidSlug {
            value: value.to_string(),
            reason: format!("invalid character {c:?}"),
        });
    }
    if value.starts_with('-') || value.ends_with('-') {
        return Err(Error::InvalidSlug {
            value: value.to_string(),
            reason: "must not start or end with '-'".to_string(),
        });
    }
    Ok(())
}

/// Composite key addressing a document: `type_slug/name`.
///
/// This is the stable external identifier shared by the CLI and the API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
    pub type_slug: String,
    pub name: String,
}

impl BlockKey {
    /// Builds a key, validating both halves.
    pub fn new(type_slug: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let type_slug = type_slug.into();
        let name = name.into();
        validate_slug(&type_slug)?;
        validate_slug(&name)?;
        Ok(Self { type_slug, name })
    }

    /// Parses `type_slug/name`.
    pub fn parse(s: &str) -> Result<Self> {
        let (type_slug, name) = s.split_once('/').ok_or_else(|| Error::InvalidKey {
            value: s.to_string(),
            reason: "expected <type_slug>/<name>".to_string(),
        })?;
        Self::new(type_slug, name).map_err(|e| Error::InvalidKey {
            value: s.to_string(),
            reason: e.to_string(),
        })
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_slug, self.name)
    }
}

impl FromStr for BlockKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for BlockKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BlockKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
