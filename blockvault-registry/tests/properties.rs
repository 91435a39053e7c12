//! Property tests over save/load and masking.

use blockvault_registry::{values, Blocks, FieldDefinition, FieldValue, SchemaType, SecretValue};
use proptest::prelude::*;

fn profile_schema() -> SchemaType {
    SchemaType::new("profile")
        .with_field(FieldDefinition::string("label"))
        .with_field(FieldDefinition::integer("count"))
        .with_field(FieldDefinition::boolean("enabled"))
        .with_field(FieldDefinition::secret_string("token"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn save_then_load_returns_saved_values(
        label in ".{0,40}",
        count in any::<i64>(),
        enabled in any::<bool>(),
        token in ".{0,40}",
    ) {
        let blocks = Blocks::in_memory();
        blocks.register_type(profile_schema()).unwrap();
        let saved = values([
            ("label", FieldValue::from(label.as_str())),
            ("count", FieldValue::from(count)),
            ("enabled", FieldValue::from(enabled)),
            ("token", FieldValue::from(token.as_str())),
        ]);
        blocks.save("profile", "p", saved.clone(), false).unwrap();

        let loaded = blocks.load_raw("profile", "p").unwrap();
        prop_assert_eq!(loaded.get("label"), saved.get("label"));
        prop_assert_eq!(loaded.get("count"), saved.get("count"));
        prop_assert_eq!(loaded.get("enabled"), saved.get("enabled"));
        prop_assert_eq!(
            loaded.get("token").and_then(FieldValue::as_secret),
            Some(&SecretValue::new(token.as_str()))
        );
    }

    #[test]
    fn document_renderings_never_contain_the_token(token in "[a-zA-Z0-9]{9,40}") {
        let blocks = Blocks::in_memory();
        blocks.register_type(profile_schema()).unwrap();
        blocks
            .save("profile", "p", values([("token", token.as_str())]), false)
            .unwrap();
        let doc = blocks.load("profile", "p").unwrap();

        prop_assert!(!doc.document.to_string().contains(&token));
        let debug_repr = format!("{doc:?}");
        prop_assert!(!debug_repr.contains(&token));
        prop_assert!(!serde_json::to_string(&doc).unwrap().contains(&token));
    }
}
