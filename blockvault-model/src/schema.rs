use crate::error::{ModelError, ModelResult};
use crate::validate::coerce_field;
use crate::value::FieldValue;
use blockvault_types::validate_slug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Describes a block type: a slug plus an ordered list of typed fields.
///
/// Registered schemas are immutable. A changed definition under the same
/// slug is only accepted through an explicit new-version registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaType {
    pub slug: String,
    #[serde(default = "first_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

fn first_version() -> u32 {
    1
}

impl SchemaType {
    /// An empty version-1 schema.
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            version: 1,
            description: None,
            fields: Vec::new(),
        }
    }

    /// Appends a field definition.
    #[must_use]
    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Looks up a field definition by name.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields flagged as secret.
    pub fn secret_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.secret)
    }

    /// Content checksum over the slug and field definitions, `sha256:<hex>`.
    ///
    /// Version and description are excluded, so two registrations with the
    /// same structure compare equal.
    pub fn checksum(&self) -> String {
        #[derive(Serialize)]
        struct Canonical<'a> {
            slug: &'a str,
            fields: &'a [FieldDefinition],
        }
        let canonical = serde_json::to_vec(&Canonical {
            slug: &self.slug,
            fields: &self.fields,
        })
        .unwrap_or_default();
        format!("sha256:{}", hex::encode(Sha256::digest(&canonical)))
    }

    /// Checks the definition itself: slug format, unique and well-formed
    /// field names, secret flags on supported types, and defaults that
    /// validate against their own field.
    pub fn validate_definition(&self) -> ModelResult<()> {
        let invalid = |reason: String| ModelError::InvalidSchema {
            slug: self.slug.clone(),
            reason,
        };

        validate_slug(&self.slug).map_err(|e| invalid(e.to_string()))?;
        if self.version == 0 {
            return Err(invalid("version must be >= 1".into()));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !is_field_name(&field.name) {
                return Err(invalid(format!("invalid field name {:?}", field.name)));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(invalid(format!("duplicate field {:?}", field.name)));
            }
            if field.secret && !field.field_type.supports_secret() {
                return Err(invalid(format!(
                    "field {:?}: {} fields cannot be secret",
                    field.name,
                    field.field_type.name()
                )));
            }
            if let FieldType::Reference { target } = &field.field_type {
                validate_slug(target)
                    .map_err(|e| invalid(format!("field {:?}: {e}", field.name)))?;
            }
            if let Some(default) = &field.default {
                let value = FieldValue::try_from(default.clone())
                    .map_err(|e| invalid(format!("field {:?}: bad default: {e}", field.name)))?;
                coerce_field(field, value)
                    .map_err(|e| invalid(format!("field {:?}: bad default: {e}", field.name)))?;
            }
        }
        Ok(())
    }
}

fn is_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// One field of a block type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(flatten)]
    pub field_type: FieldType,
    /// Encrypted at rest and masked on display.
    #[serde(default)]
    pub secret: bool,
    /// Must be present on save (unless a default is declared).
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDefinition {
    /// A plain, optional field of the given type.
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            secret: false,
            required: false,
            default: None,
            description: None,
        }
    }

    /// Shorthand for a string field.
    pub fn string(name: &str) -> Self {
        Self::new(name, FieldType::String)
    }

    /// Shorthand for an integer field.
    pub fn integer(name: &str) -> Self {
        Self::new(name, FieldType::Integer)
    }

    /// Shorthand for a float field. Integers are widened on save.
    pub fn float(name: &str) -> Self {
        Self::new(name, FieldType::Float)
    }

    /// Shorthand for a boolean field.
    pub fn boolean(name: &str) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    /// Shorthand for an RFC 3339 timestamp field.
    pub fn date_time(name: &str) -> Self {
        Self::new(name, FieldType::DateTime)
    }

    /// Shorthand for a list field.
    pub fn list(name: &str) -> Self {
        Self::new(name, FieldType::List)
    }

    /// Shorthand for a mapping field.
    pub fn mapping(name: &str) -> Self {
        Self::new(name, FieldType::Mapping)
    }

    /// Shorthand for a field accepting any JSON value.
    pub fn json(name: &str) -> Self {
        Self::new(name, FieldType::Json)
    }

    /// Shorthand for a reference to a document of type `target`.
    pub fn reference(name: &str, target: &str) -> Self {
        Self::new(
            name,
            FieldType::Reference {
                target: target.into(),
            },
        )
    }

    /// Shorthand for a secret string field.
    pub fn secret_string(name: &str) -> Self {
        Self::string(name).secret()
    }

    /// Shorthand for a secret mapping field.
    pub fn secret_mapping(name: &str) -> Self {
        Self::mapping(name).secret()
    }

    /// Marks the field secret.
    #[must_use]
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    /// Marks the field required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the default applied when the field is omitted on save.
    #[must_use]
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The data type of a field.
///
/// Serialized flattened into the field definition, e.g.
/// `{"name": "creds", "type": "reference", "target": "aws-credentials"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
    List,
    Mapping,
    Json,
    Reference { target: String },
}

impl FieldType {
    /// Name used in error messages and listings.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::DateTime => "date_time",
            Self::List => "list",
            Self::Mapping => "mapping",
            Self::Json => "json",
            Self::Reference { .. } => "reference",
        }
    }

    /// Whether fields of this type may carry the secret flag.
    pub fn supports_secret(&self) -> bool {
        matches!(self, Self::String | Self::Mapping | Self::Json)
    }
}
