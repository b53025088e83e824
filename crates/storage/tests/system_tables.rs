#![forbid(unsafe_code)]

use serde_json::json;
use std::path::PathBuf;
use tg_storage::{
    CreateProjectRequest, CreateRowRequest, CreateTableRequest, RemoveTableRequest,
    RenameTableRequest, SetSharedSchemaRequest, SetViewsRequest, SqliteStore, StoreError,
    WriteOrigin,
};

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("tg_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn new_draft(store: &mut SqliteStore) -> String {
    store
        .create_project(CreateProjectRequest {
            organization_id: "org".to_string(),
            project_name: "system".to_string(),
            branch_name: None,
        })
        .expect("create project")
        .draft_revision_id
}

fn create_table(store: &mut SqliteStore, draft: &str, table_id: &str, schema: serde_json::Value) {
    store
        .create_table(CreateTableRequest {
            revision_id: draft.to_string(),
            table_id: table_id.to_string(),
            schema,
        })
        .expect("create table");
}

#[test]
fn views_follow_their_table() {
    let storage_dir = temp_dir("views_follow_table");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let draft = new_draft(&mut store);
    let schema = json!({ "type": "object", "properties": { "name": { "type": "string" } } });
    create_table(&mut store, &draft, "users", schema.clone());

    assert_eq!(store.get_table_views(&draft, "users").expect("views"), None);
    let views = json!({ "default": { "columns": ["name"] } });
    store
        .set_table_views(SetViewsRequest {
            revision_id: draft.clone(),
            table_id: "users".to_string(),
            views: views.clone(),
        })
        .expect("set views");

    let err = store
        .set_table_views(SetViewsRequest {
            revision_id: draft.clone(),
            table_id: "users".to_string(),
            views: json!(["name"]),
        })
        .expect_err("views are an object");
    assert_eq!(err.code(), "INVALID_INPUT");

    store
        .rename_table(RenameTableRequest {
            revision_id: draft.clone(),
            table_id: "users".to_string(),
            next_table_id: "people".to_string(),
        })
        .expect("rename");
    assert_eq!(
        store.get_table_views(&draft, "people").expect("views"),
        Some(views)
    );

    store
        .remove_table(RemoveTableRequest {
            revision_id: draft.clone(),
            table_id: "people".to_string(),
        })
        .expect("remove");
    create_table(&mut store, &draft, "people", schema);
    assert_eq!(store.get_table_views(&draft, "people").expect("views"), None);

    let system = store.get_tables(&draft, true).expect("all tables");
    assert!(system.iter().any(|table| table.id == "__views" && table.system));
    assert!(!store
        .get_tables(&draft, false)
        .expect("user tables")
        .iter()
        .any(|table| table.system));
    let schema_schema = store
        .get_table_schema(&draft, "__schema")
        .expect("system schema");
    assert_eq!(schema_schema.schema, json!({ "systemTable": "__schema" }));
}

#[test]
fn shared_schemas_are_referenced_by_name() {
    let storage_dir = temp_dir("shared_schemas");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let draft = new_draft(&mut store);
    let file = json!({ "type": "object", "properties": { "url": { "type": "string" } } });

    store
        .set_shared_schema(SetSharedSchemaRequest {
            revision_id: draft.clone(),
            name: "file".to_string(),
            schema: file.clone(),
        })
        .expect("set shared schema");
    create_table(
        &mut store,
        &draft,
        "posts",
        json!({ "type": "object", "properties": { "cover": { "$ref": "file" } } }),
    );
    store
        .create_row(CreateRowRequest {
            revision_id: draft.clone(),
            table_id: "posts".to_string(),
            row_id: "p1".to_string(),
            data: json!({ "cover": { "url": "https://example.com/a.png" } }),
            meta: None,
            origin: WriteOrigin::User,
        })
        .expect("row with shared field");

    let err = store
        .create_row(CreateRowRequest {
            revision_id: draft.clone(),
            table_id: "posts".to_string(),
            row_id: "p2".to_string(),
            data: json!({ "cover": { "url": 1 } }),
            meta: None,
            origin: WriteOrigin::User,
        })
        .expect_err("url is a string");
    assert_eq!(err.details()[0].path, "cover.url");

    assert_eq!(
        store.get_shared_schemas(&draft).expect("shared").get("file"),
        Some(&file)
    );

    let err = store
        .set_shared_schema(SetSharedSchemaRequest {
            revision_id: draft.clone(),
            name: "file".to_string(),
            schema: json!({ "type": "object", "properties": { "path": { "type": "string" } } }),
        })
        .expect_err("posts uses file");
    assert!(matches!(err, StoreError::InvalidInput(_)));
    store
        .set_shared_schema(SetSharedSchemaRequest {
            revision_id: draft.clone(),
            name: "file".to_string(),
            schema: file,
        })
        .expect("identical schema is accepted");

    let err = store
        .set_shared_schema(SetSharedSchemaRequest {
            revision_id: draft,
            name: "owner".to_string(),
            schema: json!({ "type": "string", "foreignKey": "posts" }),
        })
        .expect_err("no foreign keys in shared schemas");
    assert_eq!(err.code(), "INVALID_SCHEMA");
}
