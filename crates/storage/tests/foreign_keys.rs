#![forbid(unsafe_code)]

use serde_json::json;
use std::path::PathBuf;
use tg_storage::{
    ChangeType, CreateProjectRequest, CreateRowRequest, CreateTableRequest, RemoveRowRequest,
    RemoveTableRequest, RenameRowRequest, RenameTableRequest, SqliteStore, StoreError,
    UpdateRowRequest, WriteOrigin,
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

fn create_row(store: &mut SqliteStore, draft: &str, table_id: &str, row_id: &str, data: serde_json::Value) {
    store
        .create_row(CreateRowRequest {
            revision_id: draft.to_string(),
            table_id: table_id.to_string(),
            row_id: row_id.to_string(),
            data,
            meta: None,
            origin: WriteOrigin::User,
        })
        .expect("create row");
}

/// `users/u1` and `posts/p1` whose `author` points at `u1`.
fn blog(store: &mut SqliteStore) -> String {
    let draft = store
        .create_project(CreateProjectRequest {
            organization_id: "org".to_string(),
            project_name: "blog".to_string(),
            branch_name: None,
        })
        .expect("create project")
        .draft_revision_id;

    store
        .create_table(CreateTableRequest {
            revision_id: draft.clone(),
            table_id: "users".to_string(),
            schema: json!({ "type": "object", "properties": { "name": { "type": "string" } } }),
        })
        .expect("create users");
    store
        .create_table(CreateTableRequest {
            revision_id: draft.clone(),
            table_id: "posts".to_string(),
            schema: json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "author": { "type": "string", "foreignKey": "users" }
                }
            }),
        })
        .expect("create posts");
    create_row(store, &draft, "users", "u1", json!({ "name": "Ada" }));
    create_row(store, &draft, "posts", "p1", json!({ "title": "Hello", "author": "u1" }));
    draft
}

#[test]
fn referenced_rows_cannot_be_removed() {
    let storage_dir = temp_dir("fk_referenced_row");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let draft = blog(&mut store);
    let before = store.get_table(&draft, "users").expect("users");

    let err = store
        .remove_row(RemoveRowRequest {
            revision_id: draft.clone(),
            table_id: "users".to_string(),
            row_id: "u1".to_string(),
        })
        .expect_err("p1 references u1");
    assert!(matches!(
        err,
        StoreError::RowIsReferenced { ref row_id, references: 1, .. } if row_id == "u1"
    ));
    assert_eq!(err.code(), "ROW_IS_REFERENCED");
    assert!(store.find_row(&draft, "users", "u1").expect("lookup").is_some());
    assert_eq!(store.get_table(&draft, "users").expect("users"), before);

    store
        .update_row(UpdateRowRequest {
            revision_id: draft.clone(),
            table_id: "posts".to_string(),
            row_id: "p1".to_string(),
            data: json!({ "title": "Hello", "author": "" }),
            origin: WriteOrigin::User,
        })
        .expect("empty reference is allowed");
    store
        .remove_row(RemoveRowRequest {
            revision_id: draft.clone(),
            table_id: "users".to_string(),
            row_id: "u1".to_string(),
        })
        .expect("no more references");
}

#[test]
fn dangling_references_are_rejected() {
    let storage_dir = temp_dir("fk_dangling");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let draft = blog(&mut store);

    let err = store
        .create_row(CreateRowRequest {
            revision_id: draft.clone(),
            table_id: "posts".to_string(),
            row_id: "p2".to_string(),
            data: json!({ "title": "Ghost", "author": "nobody" }),
            meta: None,
            origin: WriteOrigin::User,
        })
        .expect_err("nobody is not a user");
    match err {
        StoreError::ForeignKeyNotFound {
            path,
            table_id,
            row_id,
        } => {
            assert_eq!(path, "author");
            assert_eq!(table_id, "users");
            assert_eq!(row_id, "nobody");
        }
        other => panic!("expected ForeignKeyNotFound, got {other:?}"),
    }
    assert!(store.find_row(&draft, "posts", "p2").expect("lookup").is_none());

    let err = store
        .create_table(CreateTableRequest {
            revision_id: draft,
            table_id: "comments".to_string(),
            schema: json!({
                "type": "object",
                "properties": { "post": { "type": "string", "foreignKey": "articles" } }
            }),
        })
        .expect_err("articles does not exist");
    assert!(matches!(err, StoreError::NotFound { entity: "table", ref id } if id == "articles"));
}

#[test]
fn self_references_are_allowed() {
    let storage_dir = temp_dir("fk_self_reference");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let draft = blog(&mut store);

    store
        .create_table(CreateTableRequest {
            revision_id: draft.clone(),
            table_id: "folders".to_string(),
            schema: json!({
                "type": "object",
                "properties": { "parent": { "type": "string", "foreignKey": "folders" } }
            }),
        })
        .expect("self reference");
    create_row(&mut store, &draft, "folders", "root", json!({ "parent": "" }));
    create_row(&mut store, &draft, "folders", "child", json!({ "parent": "root" }));

    store
        .rename_table(RenameTableRequest {
            revision_id: draft.clone(),
            table_id: "folders".to_string(),
            next_table_id: "dirs".to_string(),
        })
        .expect("rename self-referencing table");
    let schema = store.get_table_schema(&draft, "dirs").expect("schema");
    assert_eq!(schema.schema["properties"]["parent"]["foreignKey"], json!("dirs"));
    assert_eq!(
        store.get_row(&draft, "dirs", "child").expect("child").data,
        json!({ "parent": "root" })
    );
}

#[test]
fn renaming_a_row_rewrites_references() {
    let storage_dir = temp_dir("fk_rename_row");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let draft = blog(&mut store);

    let renamed = store
        .rename_row(RenameRowRequest {
            revision_id: draft.clone(),
            table_id: "users".to_string(),
            row_id: "u1".to_string(),
            next_row_id: "ada".to_string(),
        })
        .expect("rename row");
    assert_eq!(renamed.id, "ada");
    assert!(store.find_row(&draft, "users", "u1").expect("lookup").is_none());
    assert_eq!(
        store.get_row(&draft, "posts", "p1").expect("post").data["author"],
        json!("ada")
    );

    create_row(&mut store, &draft, "users", "grace", json!({ "name": "Grace" }));
    let err = store
        .rename_row(RenameRowRequest {
            revision_id: draft,
            table_id: "users".to_string(),
            row_id: "grace".to_string(),
            next_row_id: "ada".to_string(),
        })
        .expect_err("ada is taken");
    assert!(matches!(err, StoreError::RowAlreadyExists { ref row_id, .. } if row_id == "ada"));
}

#[test]
fn referenced_tables_cannot_be_removed_and_follow_renames() {
    let storage_dir = temp_dir("fk_table_rename");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let draft = blog(&mut store);

    let err = store
        .remove_table(RemoveTableRequest {
            revision_id: draft.clone(),
            table_id: "users".to_string(),
        })
        .expect_err("posts references users");
    assert!(matches!(
        err,
        StoreError::TableIsReferenced { ref table_id, ref by } if table_id == "users" && by == &vec!["posts".to_string()]
    ));

    store
        .rename_table(RenameTableRequest {
            revision_id: draft.clone(),
            table_id: "users".to_string(),
            next_table_id: "people".to_string(),
        })
        .expect("rename users");
    let posts = store.get_table_schema(&draft, "posts").expect("posts schema");
    assert_eq!(posts.schema["properties"]["author"]["foreignKey"], json!("people"));

    let history = store
        .get_table_migrations(&draft, "posts")
        .expect("posts history");
    assert_eq!(history.last().map(|migration| migration.change_type()), Some(ChangeType::Update));

    create_row(&mut store, &draft, "posts", "p2", json!({ "title": "Again", "author": "u1" }));

    store
        .remove_table(RemoveTableRequest {
            revision_id: draft.clone(),
            table_id: "posts".to_string(),
        })
        .expect("posts is not referenced");
    store
        .remove_table(RemoveTableRequest {
            revision_id: draft.clone(),
            table_id: "people".to_string(),
        })
        .expect("people is free now");
    assert!(store.get_tables(&draft, false).expect("tables").is_empty());
}
