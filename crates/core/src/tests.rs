use super::*;
use serde_json::json;

#[test]
fn row_id_validation() {
    assert_eq!(RowId::try_new("").unwrap_err(), IdError::Empty);
    assert_eq!(RowId::try_new("x".repeat(65)).unwrap_err(), IdError::TooLong);
    assert_eq!(
        RowId::try_new("bad\u{0007}id").unwrap_err(),
        IdError::ContainsControl
    );
    assert!(RowId::try_new("x".repeat(64)).is_ok());
    assert!(RowId::try_new("row-1").is_ok());
}

#[test]
fn table_id_validation() {
    assert_eq!(TableId::try_new("").unwrap_err(), IdError::Empty);
    assert_eq!(TableId::try_new("__schema").unwrap_err(), IdError::Reserved);
    assert_eq!(
        TableId::try_new("bad id").unwrap_err(),
        IdError::InvalidChar { ch: ' ', index: 3 }
    );
    assert!(TableId::try_new("posts_v2").is_ok());
    assert!(ids::is_system_table_id(ids::SCHEMA_TABLE_ID));
}

#[test]
fn data_path_parse_and_display() {
    let path = DataPath::parse("a.b[0].c").expect("path parses");
    assert_eq!(
        path.segments(),
        &[
            PathSegment::Key("a".to_string()),
            PathSegment::Key("b".to_string()),
            PathSegment::Index(0),
            PathSegment::Key("c".to_string()),
        ]
    );
    assert_eq!(path.to_string(), "a.b[0].c");
    assert_eq!(
        path.to_sqlite_json_path().as_deref(),
        Some("$.\"a\".\"b\"[0].\"c\"")
    );
    assert!(DataPath::parse("").expect("root").is_root());
    assert!(DataPath::parse("a..b").is_err());
    assert!(DataPath::parse("a[x]").is_err());
    assert!(DataPath::parse("a[*].b").expect("wildcard").to_sqlite_json_path().is_none());
}

#[test]
fn data_path_select_expands_wildcards() {
    let doc = json!({ "refs": [{ "user": "u1" }, { "user": "u2" }, {}] });
    let path = DataPath::parse("refs[*].user").unwrap();
    let found = path.select(&doc);
    assert_eq!(found, vec![&json!("u1"), &json!("u2")]);
}

#[test]
fn json_patch_applies_rfc6902_subset() {
    let doc = json!({ "properties": { "a": { "type": "string" } } });
    let patched = apply_json_patches(
        &doc,
        &[
            JsonPatch::Add {
                path: "/properties/b".to_string(),
                value: json!({ "type": "number" }),
            },
            JsonPatch::Move {
                from: "/properties/a".to_string(),
                path: "/properties/c".to_string(),
            },
            JsonPatch::Replace {
                path: "/properties/b/type".to_string(),
                value: json!("boolean"),
            },
        ],
    )
    .expect("patches apply");
    assert_eq!(
        patched,
        json!({ "properties": { "b": { "type": "boolean" }, "c": { "type": "string" } } })
    );

    assert_eq!(
        apply_json_patches(
            &doc,
            &[JsonPatch::Remove {
                path: "/properties/zzz".to_string()
            }]
        ),
        Err(JsonPatchError::PathNotFound("/properties/zzz".to_string()))
    );
}

#[test]
fn migration_serde_shape_and_validation() {
    let raw = json!({
        "changeType": "rename",
        "id": "2025-01-02T03:04:05.006Z",
        "tableId": "posts",
        "nextTableId": "articles"
    });
    let migration: Migration = serde_json::from_value(raw.clone()).expect("deserializes");
    assert_eq!(migration.change_type(), ChangeType::Rename);
    assert!(migration.touches("articles"));
    assert_eq!(serde_json::to_value(&migration).unwrap(), raw);
    assert!(migration.validate().is_ok());

    let bad = Migration::Remove {
        id: "yesterday".to_string(),
        table_id: "posts".to_string(),
    };
    assert_eq!(
        bad.validate(),
        Err(MigrationError::InvalidId("yesterday".to_string()))
    );
}

#[test]
fn flatten_histories_is_stable_on_equal_dates() {
    let remove = |id: &str, table: &str| Migration::Remove {
        id: id.to_string(),
        table_id: table.to_string(),
    };
    let flat = migration::flatten_histories(vec![
        vec![
            remove("2025-01-01T00:00:00Z", "a"),
            remove("2025-01-03T00:00:00Z", "a"),
        ],
        vec![
            remove("2025-01-01T00:00:00Z", "b"),
            remove("2025-01-02T00:00:00Z", "b"),
        ],
    ]);
    let order = flat
        .iter()
        .map(|m| format!("{}@{}", m.table_id(), &m.id()[..10]))
        .collect::<Vec<_>>();
    assert_eq!(
        order,
        vec![
            "a@2025-01-01",
            "b@2025-01-01",
            "b@2025-01-02",
            "a@2025-01-03"
        ]
    );
}

#[test]
fn content_hash_ignores_key_order() {
    let a: serde_json::Value = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
    let b: serde_json::Value = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();
    assert_eq!(hash_json(&a), hash_json(&b));
    assert_eq!(hash_json(&a).len(), 64);
    assert_ne!(hash_json(&a), hash_json(&json!({ "a": 1 })));
}
