//! Value validation and coercion against a schema.

use crate::error::{ModelError, ModelResult};
use crate::schema::{FieldDefinition, FieldType, SchemaType};
use crate::value::FieldValue;
use blockvault_types::SecretValue;
use std::collections::BTreeMap;

/// Validates a full value set against `schema`.
///
/// Unknown fields are rejected, declared defaults are materialized for
/// omitted fields, and each value is coerced to its field's type (integers
/// widen to floats, secret fields are wrapped in [`SecretValue`]).
pub fn validate_values(
    schema: &SchemaType,
    mut values: BTreeMap<String, FieldValue>,
) -> ModelResult<BTreeMap<String, FieldValue>> {
    if let Some(unknown) = values.keys().find(|k| schema.field(k).is_none()) {
        return Err(ModelError::UnknownField {
            field: unknown.clone(),
        });
    }

    let mut out = BTreeMap::new();
    for field in &schema.fields {
        let value = match values.remove(&field.name) {
            Some(value) => value,
            None => match &field.default {
                Some(default) => FieldValue::try_from(default.clone())?,
                None if field.required => {
                    return Err(ModelError::MissingField {
                        field: field.name.clone(),
                    });
                }
                None => continue,
            },
        };
        out.insert(field.name.clone(), coerce_field(field, value)?);
    }
    Ok(out)
}

/// Coerces one value to `field`'s declared type.
pub fn coerce_field(field: &FieldDefinition, value: FieldValue) -> ModelResult<FieldValue> {
    if value.is_null() {
        if field.required {
            return Err(ModelError::InvalidValue {
                field: field.name.clone(),
                reason: "required field is null".into(),
            });
        }
        return Ok(FieldValue::Null);
    }

    if field.secret {
        return coerce_secret(field, value);
    }

    let mismatch = |value: &FieldValue| ModelError::TypeMismatch {
        field: field.name.clone(),
        expected: field.field_type.name().to_string(),
        actual: value.kind().to_string(),
    };

    match (&field.field_type, value) {
        (FieldType::String, v @ FieldValue::String(_)) => Ok(v),
        (FieldType::Integer, v @ FieldValue::Integer(_)) => Ok(v),
        (FieldType::Float, FieldValue::Float(f)) if !f.is_finite() => Err(non_finite(field)),
        (FieldType::Float, v @ FieldValue::Float(_)) => Ok(v),
        (FieldType::Float, FieldValue::Integer(i)) => Ok(FieldValue::Float(i as f64)),
        (FieldType::Boolean, v @ FieldValue::Bool(_)) => Ok(v),
        (FieldType::DateTime, FieldValue::String(s)) => {
            chrono::DateTime::parse_from_rfc3339(&s).map_err(|e| ModelError::InvalidValue {
                field: field.name.clone(),
                reason: format!("not an RFC 3339 timestamp: {e}"),
            })?;
            Ok(FieldValue::String(s))
        }
        (FieldType::List, v @ FieldValue::List(_)) => check_nested(field, v),
        (FieldType::Mapping, v @ FieldValue::Mapping(_)) => check_nested(field, v),
        (FieldType::Json, FieldValue::Secret(_)) => Err(ModelError::TypeMismatch {
            field: field.name.clone(),
            expected: "json".into(),
            actual: "secret".into(),
        }),
        (FieldType::Json, v) => check_nested(field, v),
        (FieldType::Reference { target }, FieldValue::Reference(key)) => {
            if &key.type_slug != target {
                return Err(ModelError::InvalidValue {
                    field: field.name.clone(),
                    reason: format!("reference {key} must point at a {target:?} document"),
                });
            }
            Ok(FieldValue::Reference(key))
        }
        (_, v) => Err(mismatch(&v)),
    }
}

fn coerce_secret(field: &FieldDefinition, value: FieldValue) -> ModelResult<FieldValue> {
    let raw = match value {
        FieldValue::Secret(secret) => secret.into_inner(),
        other => {
            if other.contains_reference() {
                return Err(ModelError::InvalidValue {
                    field: field.name.clone(),
                    reason: "secret fields cannot hold references".into(),
                });
            }
            if other.any(&is_non_finite) {
                return Err(non_finite(field));
            }
            other.expose_json()
        }
    };

    let ok = match field.field_type {
        FieldType::String => raw.is_string(),
        FieldType::Mapping => raw.is_object(),
        FieldType::Json => true,
        _ => false,
    };
    if !ok {
        return Err(ModelError::TypeMismatch {
            field: field.name.clone(),
            expected: format!("secret {}", field.field_type.name()),
            actual: json_kind(&raw).to_string(),
        });
    }
    Ok(FieldValue::Secret(SecretValue::new(raw)))
}

/// Contents of a plain list, mapping or json field are written as-is, so
/// they may not carry secrets or floats JSON cannot represent.
fn check_nested(field: &FieldDefinition, value: FieldValue) -> ModelResult<FieldValue> {
    if value.any(&|v| matches!(v, FieldValue::Secret(_))) {
        return Err(ModelError::InvalidValue {
            field: field.name.clone(),
            reason: "secret values are only allowed in fields declared secret".into(),
        });
    }
    if value.any(&is_non_finite) {
        return Err(non_finite(field));
    }
    Ok(value)
}

fn is_non_finite(value: &FieldValue) -> bool {
    matches!(value, FieldValue::Float(f) if !f.is_finite())
}

fn non_finite(field: &FieldDefinition) -> ModelError {
    ModelError::InvalidValue {
        field: field.name.clone(),
        reason: "must be a finite number".into(),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "mapping",
    }
}
