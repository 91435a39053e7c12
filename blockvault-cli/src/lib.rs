//! Command handlers for the `blockvault` binary.
//!
//! Each handler takes a connected [`BlockClient`] and writes its report to
//! `out`, so the binary and the tests share the same code path. Document
//! output is always masked.

use anyhow::{bail, Context, Result};
use blockvault_client::BlockClient;
use blockvault_registry::{BlockKey, DocumentId, FieldValue, SchemaType};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Reads one schema, or an array of schemas, from a `.json` or `.toml` file.
///
/// TOML files hold several schemas as `[[types]]` tables.
pub fn read_schemas(path: &Path) -> Result<Vec<SchemaType>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    if is_toml {
        #[derive(serde::Deserialize)]
        struct TypesFile {
            types: Vec<SchemaType>,
        }
        if let Ok(file) = toml::from_str::<TypesFile>(&raw) {
            return Ok(file.types);
        }
        let schema: SchemaType = toml::from_str(&raw)
            .with_context(|| format!("Invalid block type definition in {}", path.display()))?;
        return Ok(vec![schema]);
    }

    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    let schemas: Vec<SchemaType> = match value {
        Value::Array(_) => serde_json::from_value(value),
        other => serde_json::from_value(other).map(|s: SchemaType| vec![s]),
    }
    .with_context(|| format!("Invalid block type definition in {}", path.display()))?;
    Ok(schemas)
}

/// Reads a JSON object of field values. `{"$ref": "slug/name"}` entries
/// become references.
pub fn read_values(path: &Path) -> Result<BTreeMap<String, FieldValue>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_values(&raw).with_context(|| format!("Invalid field values in {}", path.display()))
}

pub fn parse_values(raw: &str) -> Result<BTreeMap<String, FieldValue>> {
    let Value::Object(map) = serde_json::from_str::<Value>(raw)? else {
        bail!("expected a JSON object of field values");
    };
    map.into_iter()
        .map(|(name, value)| -> Result<(String, FieldValue)> {
            Ok((name, FieldValue::try_from(value)?))
        })
        .collect()
}

// ── Block types ──────────────────────────────────────────────────

pub async fn register_types(client: &BlockClient, path: &Path, out: &mut impl Write) -> Result<()> {
    let schemas = read_schemas(path)?;
    debug!(count = schemas.len(), file = %path.display(), "registering block types");
    for schema in schemas {
        let slug = schema.slug.clone();
        client
            .register_type(schema)
            .await
            .with_context(|| format!("Failed to register block type {slug}"))?;
        writeln!(out, "registered {slug}")?;
    }
    Ok(())
}

pub async fn install_builtins(client: &BlockClient, out: &mut impl Write) -> Result<()> {
    for slug in client.install_builtins().await? {
        writeln!(out, "registered {slug}")?;
    }
    Ok(())
}

pub async fn list_types(client: &BlockClient, out: &mut impl Write) -> Result<()> {
    let types = client.list_types().await?;
    if types.is_empty() {
        writeln!(out, "no block types registered")?;
    }
    for schema in types {
        let secrets = schema.secret_fields().count();
        writeln!(
            out,
            "{:<28} v{:<3} {} field(s), {} secret",
            schema.slug,
            schema.version,
            schema.fields.len(),
            secrets
        )?;
    }
    Ok(())
}

pub async fn inspect_type(client: &BlockClient, slug: &str, out: &mut impl Write) -> Result<()> {
    let schema = client.get_type(slug).await?;
    writeln!(out, "{}", serde_json::to_string_pretty(schema.as_ref())?)?;
    Ok(())
}

pub async fn delete_type(client: &BlockClient, slug: &str, out: &mut impl Write) -> Result<()> {
    let versions = client.delete_type(slug).await?;
    writeln!(out, "deleted {slug} ({versions} version(s))")?;
    Ok(())
}

// ── Blocks ───────────────────────────────────────────────────────

pub async fn create_block(
    client: &BlockClient,
    key: &str,
    values_path: &Path,
    overwrite: bool,
    out: &mut impl Write,
) -> Result<()> {
    let key = BlockKey::parse(key)?;
    let values = read_values(values_path)?;
    let id = client
        .save(&key.type_slug, &key.name, values, overwrite)
        .await
        .with_context(|| format!("Failed to save {key}"))?;
    writeln!(out, "saved {key} ({id})")?;
    Ok(())
}

pub async fn list_blocks(
    client: &BlockClient,
    type_slug: Option<&str>,
    out: &mut impl Write,
) -> Result<()> {
    let summaries = client.list(type_slug).await?;
    if summaries.is_empty() {
        writeln!(out, "no blocks found")?;
    }
    for summary in summaries {
        writeln!(
            out,
            "{:<40} {}  v{}  {}",
            summary.key.to_string(),
            summary.id,
            summary.version,
            summary.updated_at.to_rfc3339()
        )?;
    }
    Ok(())
}

/// Prints the block with its references resolved. Secrets stay masked.
pub async fn inspect_block(client: &BlockClient, key: &str, out: &mut impl Write) -> Result<()> {
    let key = BlockKey::parse(key)?;
    let hydrated = client.load(&key.type_slug, &key.name).await?;
    writeln!(out, "{}", serde_json::to_string_pretty(&hydrated)?)?;
    Ok(())
}

pub async fn delete_block(client: &BlockClient, key: &str, out: &mut impl Write) -> Result<()> {
    let key = BlockKey::parse(key)?;
    let id = client.delete(&key.type_slug, &key.name).await?;
    writeln!(out, "deleted {key} ({id})")?;
    Ok(())
}

pub async fn delete_block_by_id(client: &BlockClient, id: &str, out: &mut impl Write) -> Result<()> {
    let id = DocumentId::parse(id)?;
    let key = client.delete_by_id(id).await?;
    writeln!(out, "deleted {key} ({id})")?;
    Ok(())
}
