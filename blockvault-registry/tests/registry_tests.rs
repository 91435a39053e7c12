use blockvault_registry::{BlockError, Blocks, FieldDefinition, SchemaRegistry, SchemaType};
use blockvault_storage::{MemoryBackend, StorageBackend};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn cube() -> SchemaType {
    SchemaType::new("cube").with_field(FieldDefinition::float("edge_length_inches"))
}

// ── register ─────────────────────────────────────────────────────

#[test]
fn register_returns_slug() {
    let blocks = Blocks::in_memory();
    assert_eq!(blocks.register_type(cube()).unwrap(), "cube");
    assert_eq!(*blocks.get_type("cube").unwrap(), cube());
}

#[test]
fn register_identical_schema_is_idempotent() {
    let blocks = Blocks::in_memory();
    blocks.register_type(cube()).unwrap();
    // Description does not take part in the checksum.
    blocks.register_type(cube().describe("a cube")).unwrap();
    assert_eq!(blocks.list_types().unwrap().len(), 1);
}

#[test]
fn register_different_schema_conflicts() {
    let blocks = Blocks::in_memory();
    blocks.register_type(cube()).unwrap();

    let changed = cube().with_field(FieldDefinition::string("color"));
    let err = blocks.register_type(changed.clone()).unwrap_err();
    match err {
        BlockError::SchemaConflict {
            slug,
            existing,
            incoming,
        } => {
            assert_eq!(slug, "cube");
            assert_eq!(existing, cube().checksum());
            assert_eq!(incoming, changed.checksum());
        }
        other => panic!("expected SchemaConflict, got {other:?}"),
    }
}

#[test]
fn register_rejects_invalid_definitions() {
    let blocks = Blocks::in_memory();

    let bad_slug = SchemaType::new("Not A Slug");
    assert!(matches!(
        blocks.register_type(bad_slug),
        Err(BlockError::Validation { .. })
    ));

    let duplicate = cube().with_field(FieldDefinition::float("edge_length_inches"));
    assert!(matches!(
        blocks.register_type(duplicate),
        Err(BlockError::Validation { .. })
    ));

    let secret_int = SchemaType::new("counter").with_field(FieldDefinition::integer("n").secret());
    assert!(matches!(
        blocks.register_type(secret_int),
        Err(BlockError::Validation { .. })
    ));

    let bad_default = SchemaType::new("counter")
        .with_field(FieldDefinition::integer("n").with_default(json!("seven")));
    let err = blocks.register_type(bad_default).unwrap_err();
    assert!(err.to_string().contains("block type 'counter'"), "{err}");
}

// ── versions ─────────────────────────────────────────────────────

#[test]
fn register_version_increments() {
    let blocks = Blocks::in_memory();
    assert_eq!(
        blocks.register_type_version(cube()).unwrap(),
        ("cube".to_string(), 1)
    );

    let v2 = cube().with_field(FieldDefinition::string("color"));
    assert_eq!(
        blocks.register_type_version(v2.clone()).unwrap(),
        ("cube".to_string(), 2)
    );
    // Unchanged definition keeps the current version.
    assert_eq!(
        blocks.register_type_version(v2).unwrap(),
        ("cube".to_string(), 2)
    );

    assert_eq!(blocks.get_type("cube").unwrap().version, 2);
    assert_eq!(blocks.get_type_version("cube", 1).unwrap().fields.len(), 1);
    assert_eq!(blocks.get_type_version("cube", 2).unwrap().fields.len(), 2);
}

#[test]
fn missing_type_and_version_are_not_found() {
    let blocks = Blocks::in_memory();
    assert!(matches!(
        blocks.get_type("sphere"),
        Err(BlockError::NotFound { .. })
    ));
    blocks.register_type(cube()).unwrap();
    let err = blocks.get_type_version("cube", 9).unwrap_err();
    assert!(matches!(err, BlockError::NotFound { ref what } if what.contains("v9")));
}

#[test]
fn older_version_lookup_does_not_shadow_latest() {
    let blocks = Blocks::in_memory();
    blocks.register_type_version(cube()).unwrap();
    blocks
        .register_type_version(cube().with_field(FieldDefinition::string("color")))
        .unwrap();
    blocks.schemas().clear_cache();

    blocks.get_type_version("cube", 1).unwrap();
    assert_eq!(blocks.get_type("cube").unwrap().version, 2);
}

#[test]
fn register_version_sees_versions_from_other_handles() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
    let a = SchemaRegistry::new(backend.clone());
    let b = SchemaRegistry::new(backend);
    a.register(cube()).unwrap();
    assert_eq!(a.get("cube").unwrap().version, 1);

    let v2 = cube().with_field(FieldDefinition::string("color"));
    assert_eq!(b.register_version(v2.clone()).unwrap(), ("cube".to_string(), 2));

    // `a` still has version 1 cached as the latest.
    assert_eq!(a.register_version(v2).unwrap(), ("cube".to_string(), 2));
    assert_eq!(a.get("cube").unwrap().version, 2);

    let v3 = cube().with_field(FieldDefinition::boolean("solved"));
    assert_eq!(a.register_version(v3).unwrap(), ("cube".to_string(), 3));
    assert_eq!(b.get_version("cube", 3).unwrap().fields.len(), 2);
}

#[test]
fn register_checks_against_versions_from_other_handles() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
    let a = SchemaRegistry::new(backend.clone());
    let b = SchemaRegistry::new(backend);
    a.register(cube()).unwrap();
    a.get("cube").unwrap();
    b.register_version(cube().with_field(FieldDefinition::string("color")))
        .unwrap();

    let err = a.register(cube()).unwrap_err();
    assert!(matches!(err, BlockError::SchemaConflict { ref slug, .. } if slug == "cube"), "{err}");
}

// ── list / delete ────────────────────────────────────────────────

#[test]
fn list_types_ordered_by_slug() {
    let blocks = Blocks::in_memory();
    blocks.register_type(SchemaType::new("zebra")).unwrap();
    blocks.register_type(cube()).unwrap();
    let slugs: Vec<_> = blocks
        .list_types()
        .unwrap()
        .into_iter()
        .map(|s| s.slug)
        .collect();
    assert_eq!(slugs, vec!["cube", "zebra"]);
}

#[test]
fn delete_type_with_documents_is_rejected() {
    let blocks = Blocks::in_memory();
    blocks.register_type(cube()).unwrap();
    blocks
        .save(
            "cube",
            "rubiks-cube",
            blockvault_registry::values([("edge_length_inches", 2.25)]),
            false,
        )
        .unwrap();

    assert!(matches!(
        blocks.delete_type("cube"),
        Err(BlockError::Validation { .. })
    ));

    blocks.delete("cube", "rubiks-cube").unwrap();
    assert_eq!(blocks.delete_type("cube").unwrap(), 1);
    assert!(matches!(
        blocks.get_type("cube"),
        Err(BlockError::NotFound { .. })
    ));
    assert!(matches!(
        blocks.delete_type("cube"),
        Err(BlockError::NotFound { .. })
    ));
}
