use blockvault_model::{values, Document, FieldValue};
use blockvault_types::{BlockKey, DocumentId, SECRET_MASK};
use chrono::Utc;
use pretty_assertions::assert_eq;
use serde_json::json;

fn make_document() -> Document {
    let mut v = values([("host", FieldValue::from("db.local"))]);
    v.insert("port".into(), FieldValue::Integer(5432));
    v.insert("password".into(), FieldValue::secret("hunter2"));
    v.insert(
        "options".into(),
        FieldValue::secret(json!({"sslkey": "PRIVATE", "nested": {"token": "tok-123"}})),
    );
    v.insert(
        "fallback".into(),
        FieldValue::Reference(BlockKey::parse("database-credentials/replica").unwrap()),
    );
    let now = Utc::now();
    Document {
        id: DocumentId::new(),
        type_slug: "database-credentials".into(),
        schema_version: 1,
        name: "primary".into(),
        values: v,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

// ── Accessors ────────────────────────────────────────────────────

#[test]
fn key_is_type_slash_name() {
    assert_eq!(make_document().key().to_string(), "database-credentials/primary");
}

#[test]
fn typed_getters() {
    let d = make_document();
    assert_eq!(d.get_str("host"), Some("db.local"));
    assert_eq!(d.get_number("port"), Some(5432.0));
    assert_eq!(d.get_bool("host"), None);
    assert_eq!(d.get_str("missing"), None);
}

// ── Masking on every rendering path ──────────────────────────────

#[test]
fn display_masks_secrets() {
    let rendered = make_document().to_string();
    assert!(!rendered.contains("hunter2"));
    assert!(!rendered.contains("PRIVATE"));
    assert!(!rendered.contains("tok-123"));
    assert!(rendered.contains(SECRET_MASK));
    assert!(rendered.contains("db.local"));
}

#[test]
fn debug_masks_secrets() {
    let rendered = format!("{:?}", make_document());
    assert!(!rendered.contains("hunter2"));
    assert!(!rendered.contains("PRIVATE"));
    assert!(!rendered.contains("tok-123"));
}

#[test]
fn serialize_masks_secrets_and_keeps_mapping_keys() {
    let v = serde_json::to_value(make_document()).unwrap();
    assert_eq!(v["values"]["password"], json!(SECRET_MASK));
    assert_eq!(
        v["values"]["options"],
        json!({"sslkey": SECRET_MASK, "nested": {"token": SECRET_MASK}})
    );
    assert_eq!(
        v["values"]["fallback"],
        json!({"$ref": "database-credentials/replica"})
    );
}

#[test]
fn masked_values_matches_serialization() {
    let d = make_document();
    let v = serde_json::to_value(&d).unwrap();
    assert_eq!(d.masked_values(), v["values"]);
}

#[test]
fn expose_json_reveals_only_on_request() {
    let d = make_document();
    assert_eq!(d.values["password"].expose_json(), json!("hunter2"));
}

// ── References ───────────────────────────────────────────────────

#[test]
fn references_are_collected_with_pointers() {
    let mut d = make_document();
    d.values.insert(
        "targets".into(),
        FieldValue::try_from(json!([{"$ref": "webhook/a"}, "plain", {"inner": {"$ref": "webhook/b"}}]))
            .unwrap(),
    );
    let refs: Vec<(String, String)> = d
        .references()
        .into_iter()
        .map(|(p, k)| (p, k.to_string()))
        .collect();
    assert_eq!(
        refs,
        vec![
            ("/fallback".to_string(), "database-credentials/replica".to_string()),
            ("/targets/0".to_string(), "webhook/a".to_string()),
            ("/targets/2/inner".to_string(), "webhook/b".to_string()),
        ]
    );
}

#[test]
fn ref_object_with_extra_keys_is_a_mapping() {
    let v = FieldValue::try_from(json!({"$ref": "a/b", "other": 1})).unwrap();
    assert!(matches!(v, FieldValue::Mapping(_)));
}

#[test]
fn malformed_ref_is_an_error() {
    assert!(FieldValue::try_from(json!({"$ref": "no-slash"})).is_err());
}

#[test]
fn numbers_convert_to_integer_or_float() {
    assert_eq!(FieldValue::try_from(json!(7)).unwrap(), FieldValue::Integer(7));
    assert_eq!(FieldValue::try_from(json!(2.25)).unwrap(), FieldValue::Float(2.25));
}

#[test]
fn summary_has_no_values() {
    let d = make_document();
    let s = serde_json::to_value(d.summary()).unwrap();
    assert_eq!(s["key"], json!("database-credentials/primary"));
    assert!(s.get("values").is_none());
}
