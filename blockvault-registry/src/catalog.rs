//! Built-in block types.

use blockvault_model::{BlockHandler, Document, FieldDefinition, SchemaType};
use serde_json::json;
use std::sync::Arc;

/// Every built-in block type, ordered by slug.
pub fn catalog() -> Vec<SchemaType> {
    vec![
        SchemaType::new("database-credentials")
            .describe("Connection settings for a SQL database")
            .with_field(FieldDefinition::string("driver").required())
            .with_field(FieldDefinition::string("host"))
            .with_field(FieldDefinition::integer("port"))
            .with_field(FieldDefinition::string("username"))
            .with_field(FieldDefinition::secret_string("password"))
            .with_field(FieldDefinition::string("database")),
        SchemaType::new("date-time")
            .describe("A single RFC 3339 timestamp")
            .with_field(FieldDefinition::date_time("value").required()),
        SchemaType::new("json")
            .describe("Arbitrary JSON")
            .with_field(FieldDefinition::json("value").required()),
        SchemaType::new("local-file-system")
            .describe("A directory on the local file system")
            .with_field(FieldDefinition::string("basepath").required()),
        SchemaType::new("secret")
            .describe("Any JSON value kept secret")
            .with_field(FieldDefinition::json("value").secret().required()),
        SchemaType::new("string")
            .describe("A plain string")
            .with_field(FieldDefinition::string("value").required()),
        SchemaType::new("webhook")
            .describe("An outgoing HTTP webhook")
            .with_field(
                FieldDefinition::secret_string("url")
                    .required()
                    .describe("Endpoint; usually embeds a token"),
            )
            .with_field(FieldDefinition::string("method").with_default(json!("POST")))
            .with_field(FieldDefinition::secret_mapping("headers")),
    ]
}

/// Handlers installed together with the catalog.
pub(crate) fn handlers() -> Vec<(&'static str, Arc<dyn BlockHandler>)> {
    let webhook: Arc<dyn BlockHandler> = Arc::new(WebhookHandler);
    let database: Arc<dyn BlockHandler> = Arc::new(DatabaseCredentialsHandler);
    vec![("webhook", webhook), ("database-credentials", database)]
}

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];

/// Requires an http(s) URL and a known HTTP method.
pub struct WebhookHandler;

impl BlockHandler for WebhookHandler {
    fn validate(&self, document: &Document) -> Result<(), String> {
        let url = document
            .get("url")
            .and_then(|v| v.as_secret())
            .and_then(|s| s.expose_str())
            .unwrap_or_default();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            // The URL is secret; never echo it.
            return Err("url must start with http:// or https://".into());
        }
        if let Some(method) = document.get_str("method") {
            if !HTTP_METHODS.contains(&method) {
                return Err(format!("unsupported HTTP method {method:?}"));
            }
        }
        Ok(())
    }
}

/// Requires a valid TCP port when one is given.
pub struct DatabaseCredentialsHandler;

impl BlockHandler for DatabaseCredentialsHandler {
    fn validate(&self, document: &Document) -> Result<(), String> {
        match document.get("port").and_then(|v| v.as_i64()) {
            Some(port) if !(1..=65535).contains(&port) => {
                Err(format!("port {port} is outside 1-65535"))
            }
            _ => Ok(()),
        }
    }
}
