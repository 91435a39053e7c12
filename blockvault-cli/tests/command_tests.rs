use blockvault_cli::*;
use blockvault_client::BlockClient;
use blockvault_registry::{Blocks, FieldValue, SECRET_MASK};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn client() -> BlockClient {
    BlockClient::new(Blocks::in_memory(), Duration::from_secs(5))
}

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn output(buf: Vec<u8>) -> String {
    String::from_utf8(buf).unwrap()
}

const CUBE_JSON: &str = r#"{
    "slug": "cube",
    "description": "A cube",
    "fields": [{"name": "edge_length_inches", "type": "float", "required": true}]
}"#;

// ── File parsing ─────────────────────────────────────────────────

#[test]
fn reads_single_json_schema() {
    let dir = TempDir::new().unwrap();
    let schemas = read_schemas(&write(&dir, "cube.json", CUBE_JSON)).unwrap();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].slug, "cube");
    assert_eq!(schemas[0].version, 1);
    assert!(schemas[0].fields[0].required);
}

#[test]
fn reads_json_schema_array() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "types.json",
        r#"[{"slug": "a", "fields": []}, {"slug": "b", "fields": []}]"#,
    );
    let slugs: Vec<_> = read_schemas(&path).unwrap().into_iter().map(|s| s.slug).collect();
    assert_eq!(slugs, vec!["a", "b"]);
}

#[test]
fn reads_toml_schemas() {
    let dir = TempDir::new().unwrap();
    let single = write(
        &dir,
        "cube.toml",
        r#"
        slug = "cube"

        [[fields]]
        name = "edge_length_inches"
        type = "float"
        "#,
    );
    assert_eq!(read_schemas(&single).unwrap()[0].slug, "cube");

    let many = write(
        &dir,
        "types.toml",
        r#"
        [[types]]
        slug = "aws-credentials"

        [[types.fields]]
        name = "secret_access_key"
        type = "string"
        secret = true

        [[types]]
        slug = "region"
        "#,
    );
    let schemas = read_schemas(&many).unwrap();
    assert_eq!(schemas.len(), 2);
    assert!(schemas[0].fields[0].secret);
}

#[test]
fn invalid_schema_file_names_path() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "broken.json", "{not json");
    let err = read_schemas(&path).unwrap_err();
    assert!(format!("{err:#}").contains("broken.json"));
}

#[test]
fn parses_values_with_references() {
    let values = parse_values(r#"{"region": "us-east-1", "creds": {"$ref": "aws-credentials/prod"}}"#)
        .unwrap();
    assert_eq!(values["region"], FieldValue::from("us-east-1"));
    assert!(matches!(values["creds"], FieldValue::Reference(_)));
}

#[test]
fn values_must_be_an_object() {
    assert!(parse_values("[1, 2]").is_err());
}

// ── Commands ─────────────────────────────────────────────────────

#[tokio::test]
async fn register_list_and_inspect_types() {
    let dir = TempDir::new().unwrap();
    let client = client();
    let mut out = Vec::new();

    register_types(&client, &write(&dir, "cube.json", CUBE_JSON), &mut out)
        .await
        .unwrap();
    assert_eq!(output(out), "registered cube\n");

    let mut out = Vec::new();
    list_types(&client, &mut out).await.unwrap();
    let listing = output(out);
    assert!(listing.contains("cube"));
    assert!(listing.contains("1 field(s), 0 secret"));

    let mut out = Vec::new();
    inspect_type(&client, "cube", &mut out).await.unwrap();
    assert!(output(out).contains("edge_length_inches"));
}

#[tokio::test]
async fn block_lifecycle_masks_secrets() {
    let dir = TempDir::new().unwrap();
    let client = client();
    install_builtins(&client, &mut Vec::new()).await.unwrap();

    let values = write(&dir, "hook.json", r#"{"url": "https://hooks.example.com/T0K3N"}"#);
    let mut out = Vec::new();
    create_block(&client, "webhook/deploy", &values, false, &mut out)
        .await
        .unwrap();
    assert!(output(out).starts_with("saved webhook/deploy"));

    let mut out = Vec::new();
    inspect_block(&client, "webhook/deploy", &mut out).await.unwrap();
    let shown = output(out);
    assert!(shown.contains(SECRET_MASK));
    assert!(!shown.contains("T0K3N"));
    assert!(shown.contains("POST"));

    let mut out = Vec::new();
    list_blocks(&client, Some("webhook"), &mut out).await.unwrap();
    assert!(output(out).contains("webhook/deploy"));

    let err = create_block(&client, "webhook/deploy", &values, false, &mut Vec::new())
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("already exists"));
    create_block(&client, "webhook/deploy", &values, true, &mut Vec::new())
        .await
        .unwrap();

    let mut out = Vec::new();
    delete_block(&client, "webhook/deploy", &mut out).await.unwrap();
    assert!(output(out).starts_with("deleted webhook/deploy"));

    let mut out = Vec::new();
    list_blocks(&client, None, &mut out).await.unwrap();
    assert_eq!(output(out), "no blocks found\n");
}

#[tokio::test]
async fn delete_by_id_reports_key() {
    let dir = TempDir::new().unwrap();
    let client = client();
    install_builtins(&client, &mut Vec::new()).await.unwrap();
    let values = write(&dir, "region.json", r#"{"value": "eu-west-1"}"#);
    create_block(&client, "string/region", &values, false, &mut Vec::new())
        .await
        .unwrap();
    let id = client.list(None).await.unwrap()[0].id;

    let mut out = Vec::new();
    delete_block_by_id(&client, &id.to_string(), &mut out).await.unwrap();
    assert_eq!(output(out), format!("deleted string/region ({id})\n"));
}

#[tokio::test]
async fn malformed_keys_are_rejected() {
    let client = client();
    assert!(inspect_block(&client, "no-slash", &mut Vec::new()).await.is_err());
    assert!(delete_block_by_id(&client, "not-a-uuid", &mut Vec::new()).await.is_err());
}

#[tokio::test]
async fn deleting_type_in_use_fails() {
    let dir = TempDir::new().unwrap();
    let client = client();
    install_builtins(&client, &mut Vec::new()).await.unwrap();
    let values = write(&dir, "v.json", r#"{"value": "x"}"#);
    create_block(&client, "string/x", &values, false, &mut Vec::new())
        .await
        .unwrap();

    assert!(delete_type(&client, "string", &mut Vec::new()).await.is_err());
    delete_block(&client, "string/x", &mut Vec::new()).await.unwrap();

    let mut out = Vec::new();
    delete_type(&client, "string", &mut out).await.unwrap();
    assert_eq!(output(out), "deleted string (1 version(s))\n");
}
