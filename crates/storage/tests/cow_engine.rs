#![forbid(unsafe_code)]

use rusqlite::{Connection, params};
use serde_json::{Value, json};
use std::path::PathBuf;
use tg_storage::{
    CreateProjectRequest, CreateRevisionRequest, CreateRowRequest, CreateTableRequest,
    PatchRowsRequest, ProjectInfo, RemoveRowRequest, RenameTableRequest, RowPatch, RowPatches,
    SqliteStore, StoreError, UpdateRowRequest, WriteOrigin,
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

fn versioned_schema() -> Value {
    json!({ "type": "object", "properties": { "ver": { "type": "number" } } })
}

/// A project whose head holds table `items` with row `r1 = {ver: 1}`.
/// Returns the project and the current draft revision id.
fn seeded_project(store: &mut SqliteStore) -> (ProjectInfo, String) {
    let project = store
        .create_project(CreateProjectRequest {
            organization_id: "org".to_string(),
            project_name: "catalog".to_string(),
            branch_name: None,
        })
        .expect("create project");
    let draft = project.draft_revision_id.clone();

    store
        .create_table(CreateTableRequest {
            revision_id: draft.clone(),
            table_id: "items".to_string(),
            schema: versioned_schema(),
        })
        .expect("create table");
    store
        .create_row(CreateRowRequest {
            revision_id: draft.clone(),
            table_id: "items".to_string(),
            row_id: "r1".to_string(),
            data: json!({ "ver": 1 }),
            meta: None,
            origin: WriteOrigin::User,
        })
        .expect("create row");
    let commit = store
        .create_revision(CreateRevisionRequest {
            revision_id: draft,
            comment: Some("seed".to_string()),
        })
        .expect("commit seed");
    (project, commit.draft.id)
}

#[test]
fn patch_forks_row_and_leaves_head_untouched() {
    let storage_dir = temp_dir("patch_forks_row");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let (project, draft) = seeded_project(&mut store);
    let head = store
        .find_head_revision(&project.root_branch.id)
        .expect("head revision");

    let head_row = store.get_row(&head.id, "items", "r1").expect("head row");
    assert!(head_row.readonly);

    let updates = store
        .patch_rows(PatchRowsRequest {
            revision_id: draft.clone(),
            table_id: "items".to_string(),
            rows: vec![RowPatches {
                row_id: "r1".to_string(),
                patches: vec![RowPatch::Replace {
                    path: "ver".to_string(),
                    value: json!(10),
                }],
            }],
            origin: WriteOrigin::User,
        })
        .expect("patch row");
    assert_eq!(updates.len(), 1);
    let patched = &updates[0];
    assert!(patched.changed);
    assert_eq!(patched.previous_version_id, head_row.version_id);
    assert_ne!(patched.row.version_id, head_row.version_id);
    assert_eq!(patched.row.created_id, head_row.created_id);
    assert_eq!(patched.row.data, json!({ "ver": 10 }));
    assert!(!patched.row.readonly);

    let head_again = store.get_row(&head.id, "items", "r1").expect("head row");
    assert_eq!(head_again, head_row);

    let head_table = store.get_table(&head.id, "items").expect("head table");
    let draft_table = store.get_table(&draft, "items").expect("draft table");
    assert!(head_table.readonly);
    assert!(!draft_table.readonly);
    assert_ne!(head_table.version_id, draft_table.version_id);
    assert_eq!(head_table.created_id, draft_table.created_id);

    assert!(store.get_revision(&draft).expect("draft").has_changes);
    assert!(store.get_touched(&project.root_branch.id).expect("touched"));
}

#[test]
fn patch_type_mismatch_is_reported_with_path() {
    let storage_dir = temp_dir("patch_type_mismatch");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let (_project, draft) = seeded_project(&mut store);

    let err = store
        .patch_rows(PatchRowsRequest {
            revision_id: draft.clone(),
            table_id: "items".to_string(),
            rows: vec![RowPatches {
                row_id: "r1".to_string(),
                patches: vec![RowPatch::Replace {
                    path: "ver".to_string(),
                    value: json!("ten"),
                }],
            }],
            origin: WriteOrigin::User,
        })
        .expect_err("string is not a number");
    assert_eq!(err.code(), "DATA_NOT_VALID");
    assert_eq!(err.details()[0].path, "ver");
    assert_eq!(err.details()[0].message, "must be number");

    let err = store
        .patch_rows(PatchRowsRequest {
            revision_id: draft.clone(),
            table_id: "items".to_string(),
            rows: vec![RowPatches {
                row_id: "r1".to_string(),
                patches: vec![RowPatch::Replace {
                    path: "missing".to_string(),
                    value: json!(1),
                }],
            }],
            origin: WriteOrigin::User,
        })
        .expect_err("unknown path");
    assert!(matches!(err, StoreError::PathNotFound { ref path } if path == "missing"));

    assert!(!store.get_revision(&draft).expect("draft").has_changes);
}

#[test]
fn repeated_writes_reuse_the_draft_versions() {
    let storage_dir = temp_dir("repeated_writes_reuse");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let (_project, draft) = seeded_project(&mut store);

    let first = store
        .update_row(UpdateRowRequest {
            revision_id: draft.clone(),
            table_id: "items".to_string(),
            row_id: "r1".to_string(),
            data: json!({ "ver": 2 }),
            origin: WriteOrigin::User,
        })
        .expect("first update");
    let table_after_first = store.get_table(&draft, "items").expect("draft table");

    let second = store
        .update_row(UpdateRowRequest {
            revision_id: draft.clone(),
            table_id: "items".to_string(),
            row_id: "r1".to_string(),
            data: json!({ "ver": 3 }),
            origin: WriteOrigin::User,
        })
        .expect("second update");
    let table_after_second = store.get_table(&draft, "items").expect("draft table");

    assert_eq!(table_after_first.version_id, table_after_second.version_id);
    assert_eq!(second.previous_version_id, first.row.version_id);
    assert_eq!(second.row.version_id, first.row.version_id);
    assert_eq!(second.row.data, json!({ "ver": 3 }));

    let unchanged = store
        .update_row(UpdateRowRequest {
            revision_id: draft.clone(),
            table_id: "items".to_string(),
            row_id: "r1".to_string(),
            data: json!({ "ver": 3 }),
            origin: WriteOrigin::User,
        })
        .expect("identical update");
    assert!(!unchanged.changed);
    assert_eq!(unchanged.row.version_id, second.row.version_id);
}

#[test]
fn identical_update_on_head_row_does_not_fork() {
    let storage_dir = temp_dir("identical_update_no_fork");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let (project, draft) = seeded_project(&mut store);
    let head = store
        .find_head_revision(&project.root_branch.id)
        .expect("head revision");

    let update = store
        .update_row(UpdateRowRequest {
            revision_id: draft.clone(),
            table_id: "items".to_string(),
            row_id: "r1".to_string(),
            data: json!({ "ver": 1 }),
            origin: WriteOrigin::User,
        })
        .expect("identical update");
    assert!(!update.changed);
    assert!(update.row.readonly);
    assert_eq!(
        store.get_table(&draft, "items").expect("draft").version_id,
        store.get_table(&head.id, "items").expect("head").version_id
    );
    assert!(!store.get_revision(&draft).expect("draft").has_changes);
}

#[test]
fn create_then_remove_row_reverts_the_table_fork() {
    let storage_dir = temp_dir("create_remove_reverts");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let (project, draft) = seeded_project(&mut store);
    let head = store
        .find_head_revision(&project.root_branch.id)
        .expect("head revision");
    let head_table = store.get_table(&head.id, "items").expect("head table");

    store
        .create_row(CreateRowRequest {
            revision_id: draft.clone(),
            table_id: "items".to_string(),
            row_id: "r2".to_string(),
            data: json!({ "ver": 2 }),
            meta: None,
            origin: WriteOrigin::User,
        })
        .expect("create row");
    assert_ne!(
        store.get_table(&draft, "items").expect("draft").version_id,
        head_table.version_id
    );
    assert!(store.get_revision(&draft).expect("draft").has_changes);

    store
        .remove_row(RemoveRowRequest {
            revision_id: draft.clone(),
            table_id: "items".to_string(),
            row_id: "r2".to_string(),
        })
        .expect("remove row");

    let draft_table = store.get_table(&draft, "items").expect("draft table");
    assert_eq!(draft_table.version_id, head_table.version_id);
    assert!(!store.get_revision(&draft).expect("draft").has_changes);
    assert!(!store.get_touched(&project.root_branch.id).expect("touched"));
    assert!(!store.has_table_diffs(&head.id, &draft).expect("diff"));

    let err = store
        .create_revision(CreateRevisionRequest {
            revision_id: draft,
            comment: None,
        })
        .expect_err("nothing to commit");
    assert!(matches!(err, StoreError::NoChanges));
}

#[test]
fn rename_table_moves_identity_to_the_new_id() {
    let storage_dir = temp_dir("rename_table_identity");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let (project, draft) = seeded_project(&mut store);
    let head = store
        .find_head_revision(&project.root_branch.id)
        .expect("head revision");
    let head_table = store.get_table(&head.id, "items").expect("head table");

    let renamed = store
        .rename_table(RenameTableRequest {
            revision_id: draft.clone(),
            table_id: "items".to_string(),
            next_table_id: "entries".to_string(),
        })
        .expect("rename table");
    assert_eq!(renamed.id, "entries");

    assert!(store.find_table(&draft, "items").expect("lookup").is_none());
    let found = store
        .find_table(&draft, "entries")
        .expect("lookup")
        .expect("renamed table is visible");
    assert_eq!(found.created_id, head_table.created_id);
    assert_ne!(found.version_id, head_table.version_id);

    let schema = store.get_table_schema(&draft, "entries").expect("schema follows");
    assert_eq!(schema.schema, versioned_schema());
    assert!(matches!(
        store.get_table_schema(&draft, "items"),
        Err(StoreError::NotFound { entity: "table", .. })
    ));
    assert_eq!(
        store.get_row(&draft, "entries", "r1").expect("rows follow").data,
        json!({ "ver": 1 })
    );
    assert!(store.find_table(&head.id, "items").expect("lookup").is_some());
}

#[test]
fn commit_seals_versions_and_never_rewrites_them() {
    let storage_dir = temp_dir("commit_seals_versions");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let (project, draft) = seeded_project(&mut store);
    let head = store
        .find_head_revision(&project.root_branch.id)
        .expect("head revision");
    let sealed = store.get_row(&head.id, "items", "r1").expect("sealed row");

    store
        .update_row(UpdateRowRequest {
            revision_id: draft.clone(),
            table_id: "items".to_string(),
            row_id: "r1".to_string(),
            data: json!({ "ver": 5 }),
            origin: WriteOrigin::User,
        })
        .expect("update");
    store
        .create_revision(CreateRevisionRequest {
            revision_id: draft,
            comment: None,
        })
        .expect("second commit");

    let conn = Connection::open(storage_dir.join("tablegraph.db")).expect("open sqlite db");
    let (data, readonly): (String, bool) = conn
        .query_row(
            "SELECT data, readonly FROM rows WHERE version_id=?1",
            params![sealed.version_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("sealed version still stored");
    assert!(readonly);
    assert_eq!(
        serde_json::from_str::<Value>(&data).expect("json"),
        json!({ "ver": 1 })
    );

    let writable: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM rows r JOIN table_rows tr ON tr.row_version_id = r.version_id \
             JOIN revision_tables rt ON rt.table_version_id = tr.table_version_id \
             JOIN revisions v ON v.id = rt.revision_id \
             WHERE v.is_head = 1 AND r.readonly = 0",
            [],
            |row| row.get(0),
        )
        .expect("count writable head rows");
    assert_eq!(writable, 0);
}

#[test]
fn rows_of_system_tables_are_not_writable() {
    let storage_dir = temp_dir("system_tables_guarded");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let (_project, draft) = seeded_project(&mut store);

    let err = store
        .create_row(CreateRowRequest {
            revision_id: draft,
            table_id: "__schema".to_string(),
            row_id: "forged".to_string(),
            data: json!({ "type": "object", "properties": {} }),
            meta: None,
            origin: WriteOrigin::User,
        })
        .expect_err("system tables are internal");
    assert!(matches!(err, StoreError::SystemTableWrite(ref id) if id == "__schema"));
}
