#![forbid(unsafe_code)]

use rusqlite::Connection;
use serde_json::json;
use std::path::PathBuf;
use tg_storage::{
    CreateBranchRequest, CreateProjectRequest, CreateRevisionRequest, CreateRowRequest,
    CreateTableRequest, DeleteBranchRequest, GetRowsRequest, RevertChangesRequest, SqliteStore,
    StoreConfig, StoreError, TableChangeKind, UpdateRowRequest, WriteOrigin,
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

fn project_request(name: &str) -> CreateProjectRequest {
    CreateProjectRequest {
        organization_id: "org".to_string(),
        project_name: name.to_string(),
        branch_name: None,
    }
}

fn add_table_with_row(store: &mut SqliteStore, draft: &str) {
    store
        .create_table(CreateTableRequest {
            revision_id: draft.to_string(),
            table_id: "notes".to_string(),
            schema: json!({ "type": "object", "properties": { "text": { "type": "string" } } }),
        })
        .expect("create table");
    store
        .create_row(CreateRowRequest {
            revision_id: draft.to_string(),
            table_id: "notes".to_string(),
            row_id: "n1".to_string(),
            data: json!({ "text": "hello" }),
            meta: None,
            origin: WriteOrigin::User,
        })
        .expect("create row");
}

#[test]
fn new_project_has_root_branch_with_start_head_and_draft() {
    let storage_dir = temp_dir("new_project_layout");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let project = store
        .create_project(project_request("docs"))
        .expect("create project");

    assert_eq!(project.root_branch.name, "master");
    assert!(project.root_branch.is_root);
    assert!(!project.root_branch.touched);

    let head = store
        .find_head_revision(&project.root_branch.id)
        .expect("head");
    let start = store
        .find_start_revision(&project.root_branch.id)
        .expect("start");
    let draft = store
        .find_draft_revision(&project.root_branch.id)
        .expect("draft");
    assert_eq!(head.id, start.id);
    assert_eq!(head.id, project.head_revision_id);
    assert!(head.is_head && head.is_start && !head.is_draft);
    assert_eq!(head.parent_id, None);
    assert_eq!(draft.id, project.draft_revision_id);
    assert_eq!(draft.parent_id.as_deref(), Some(head.id.as_str()));
    assert!(draft.is_draft && !draft.has_changes);

    assert_eq!(store.get_project(&project.id).expect("get project"), project);
    let revisions = store
        .list_revisions(&project.root_branch.id)
        .expect("list revisions");
    assert_eq!(
        revisions.iter().map(|rev| rev.id.clone()).collect::<Vec<_>>(),
        vec![head.id, draft.id]
    );
    assert!(store.get_tables(&project.draft_revision_id, false).expect("tables").is_empty());
}

#[test]
fn duplicate_project_name_in_organization_is_rejected() {
    let storage_dir = temp_dir("duplicate_project");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    store
        .create_project(project_request("docs"))
        .expect("create project");

    let err = store
        .create_project(project_request("docs"))
        .expect_err("name is taken");
    assert!(matches!(err, StoreError::ProjectAlreadyExists(ref name) if name == "docs"));
    assert_eq!(err.code(), "PROJECT_ALREADY_EXISTS");

    store
        .create_project(CreateProjectRequest {
            organization_id: "other-org".to_string(),
            project_name: "docs".to_string(),
            branch_name: Some("main".to_string()),
        })
        .expect("same name in another organization");
}

#[test]
fn commit_requires_changes_and_rolls_head_forward() {
    let storage_dir = temp_dir("commit_rolls_head");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let project = store
        .create_project(project_request("docs"))
        .expect("create project");

    let err = store
        .create_revision(CreateRevisionRequest {
            revision_id: project.draft_revision_id.clone(),
            comment: None,
        })
        .expect_err("clean draft");
    assert!(matches!(err, StoreError::NoChanges));

    add_table_with_row(&mut store, &project.draft_revision_id);
    assert!(store.get_touched(&project.root_branch.id).expect("touched"));

    let commit = store
        .create_revision(CreateRevisionRequest {
            revision_id: project.draft_revision_id.clone(),
            comment: Some("  first  ".to_string()),
        })
        .expect("commit");
    assert_eq!(commit.head.id, project.draft_revision_id);
    assert!(commit.head.is_head && !commit.head.is_draft);
    assert_eq!(commit.head.comment.as_deref(), Some("first"));
    assert_eq!(commit.draft.parent_id.as_deref(), Some(commit.head.id.as_str()));
    assert!(!commit.draft.has_changes);
    assert!(!store.get_touched(&project.root_branch.id).expect("touched"));

    let old_head = store.get_revision(&project.head_revision_id).expect("old head");
    assert!(!old_head.is_head);
    assert!(old_head.is_start);

    let head_table = store.get_table(&commit.head.id, "notes").expect("head table");
    let draft_table = store.get_table(&commit.draft.id, "notes").expect("draft table");
    assert!(head_table.readonly);
    assert_eq!(head_table.version_id, draft_table.version_id);
    assert!(store.get_row(&commit.draft.id, "notes", "n1").expect("row").readonly);

    let err = store
        .create_table(CreateTableRequest {
            revision_id: commit.head.id.clone(),
            table_id: "more".to_string(),
            schema: json!({ "type": "object", "properties": {} }),
        })
        .expect_err("head is sealed");
    assert!(matches!(err, StoreError::NotDraftRevision(_)));
}

#[test]
fn revert_restores_head_state() {
    let storage_dir = temp_dir("revert_restores_head");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let project = store
        .create_project(project_request("docs"))
        .expect("create project");
    add_table_with_row(&mut store, &project.draft_revision_id);
    let commit = store
        .create_revision(CreateRevisionRequest {
            revision_id: project.draft_revision_id.clone(),
            comment: None,
        })
        .expect("commit");
    let draft = commit.draft.id;

    store
        .update_row(UpdateRowRequest {
            revision_id: draft.clone(),
            table_id: "notes".to_string(),
            row_id: "n1".to_string(),
            data: json!({ "text": "changed" }),
            origin: WriteOrigin::User,
        })
        .expect("update");
    store
        .create_table(CreateTableRequest {
            revision_id: draft.clone(),
            table_id: "extra".to_string(),
            schema: json!({ "type": "object", "properties": {} }),
        })
        .expect("create extra table");

    let reverted = store
        .revert_changes(RevertChangesRequest {
            revision_id: draft.clone(),
        })
        .expect("revert");
    assert_eq!(reverted.id, draft);
    assert!(!reverted.has_changes);
    assert!(!store.get_touched(&project.root_branch.id).expect("touched"));
    assert!(store.find_table(&draft, "extra").expect("lookup").is_none());
    assert_eq!(
        store.get_row(&draft, "notes", "n1").expect("row").data,
        json!({ "text": "hello" })
    );
    assert!(!store.has_table_diffs(&commit.head.id, &draft).expect("diff"));

    store
        .revert_changes(RevertChangesRequest {
            revision_id: draft.clone(),
        })
        .expect("reverting a clean draft is a no-op");
}

#[test]
fn branches_fork_from_committed_revisions() {
    let storage_dir = temp_dir("branches_fork");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let project = store
        .create_project(project_request("docs"))
        .expect("create project");
    add_table_with_row(&mut store, &project.draft_revision_id);

    let err = store
        .create_branch(CreateBranchRequest {
            revision_id: project.draft_revision_id.clone(),
            branch_name: "feature".to_string(),
        })
        .expect_err("drafts cannot be forked");
    assert_eq!(err.code(), "INVALID_INPUT");

    let commit = store
        .create_revision(CreateRevisionRequest {
            revision_id: project.draft_revision_id.clone(),
            comment: None,
        })
        .expect("commit");
    let created = store
        .create_branch(CreateBranchRequest {
            revision_id: commit.head.id.clone(),
            branch_name: "feature".to_string(),
        })
        .expect("create branch");
    assert!(!created.branch.is_root);
    assert_eq!(created.start_revision.parent_id.as_deref(), Some(commit.head.id.as_str()));
    assert!(created.start_revision.is_head && created.start_revision.is_start);
    assert_eq!(
        store
            .get_row(&created.draft_revision.id, "notes", "n1")
            .expect("row visible in branch")
            .data,
        json!({ "text": "hello" })
    );

    let parent = store
        .resolve_parent_branch(&created.branch.id)
        .expect("parent")
        .expect("feature has a parent");
    assert_eq!(parent.branch.id, project.root_branch.id);
    assert_eq!(parent.revision.id, commit.head.id);
    assert!(store
        .resolve_parent_branch(&project.root_branch.id)
        .expect("root parent")
        .is_none());

    let err = store
        .create_branch(CreateBranchRequest {
            revision_id: commit.head.id.clone(),
            branch_name: "feature".to_string(),
        })
        .expect_err("name is taken");
    assert!(matches!(err, StoreError::BranchAlreadyExists(ref name) if name == "feature"));

    let names = store
        .list_branches(&project.id)
        .expect("list branches")
        .into_iter()
        .map(|branch| branch.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["master".to_string(), "feature".to_string()]);

    store
        .update_row(UpdateRowRequest {
            revision_id: created.draft_revision.id.clone(),
            table_id: "notes".to_string(),
            row_id: "n1".to_string(),
            data: json!({ "text": "branch edit" }),
            origin: WriteOrigin::User,
        })
        .expect("edit in branch");
    assert_eq!(
        store.get_row(&commit.draft.id, "notes", "n1").expect("master row").data,
        json!({ "text": "hello" })
    );
}

#[test]
fn branch_deletion_guards_root_and_dependents() {
    let storage_dir = temp_dir("branch_deletion_guards");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let project = store
        .create_project(project_request("docs"))
        .expect("create project");

    let err = store
        .delete_branch(DeleteBranchRequest {
            branch_id: project.root_branch.id.clone(),
        })
        .expect_err("root branch");
    assert!(matches!(err, StoreError::CannotDeleteRootBranch));

    let feature = store
        .create_branch(CreateBranchRequest {
            revision_id: project.head_revision_id.clone(),
            branch_name: "feature".to_string(),
        })
        .expect("feature");
    store
        .create_branch(CreateBranchRequest {
            revision_id: feature.start_revision.id.clone(),
            branch_name: "nested".to_string(),
        })
        .expect("nested");

    let err = store
        .delete_branch(DeleteBranchRequest {
            branch_id: feature.branch.id.clone(),
        })
        .expect_err("nested depends on feature");
    assert!(matches!(err, StoreError::BranchHasDependents(ref name) if name == "feature"));
    assert_eq!(err.code(), "BRANCH_HAS_DEPENDENTS");

    let lonely = store
        .create_branch(CreateBranchRequest {
            revision_id: project.head_revision_id.clone(),
            branch_name: "lonely".to_string(),
        })
        .expect("lonely");
    add_table_with_row(&mut store, &lonely.draft_revision.id);
    store
        .delete_branch(DeleteBranchRequest {
            branch_id: lonely.branch.id.clone(),
        })
        .expect("delete leaf branch");
    assert!(matches!(
        store.get_branch(&lonely.branch.id),
        Err(StoreError::NotFound { entity: "branch", .. })
    ));
    assert!(matches!(
        store.get_revision(&lonely.draft_revision.id),
        Err(StoreError::NotFound { .. })
    ));
}

#[test]
fn revision_changes_classify_tables() {
    let storage_dir = temp_dir("revision_changes");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let project = store
        .create_project(project_request("docs"))
        .expect("create project");
    add_table_with_row(&mut store, &project.draft_revision_id);

    let changes = store
        .get_revision_changes(&project.head_revision_id, &project.draft_revision_id)
        .expect("changes");
    let notes = changes
        .tables
        .iter()
        .find(|table| table.table_id == "notes")
        .expect("notes listed");
    assert_eq!(notes.kind, TableChangeKind::Added);
    assert_eq!(notes.rows_changed, 1);
    assert!(changes.tables.iter().any(|table| table.table_id == "__schema"));
    assert!(store
        .has_table_diffs(&project.head_revision_id, &project.draft_revision_id)
        .expect("table diffs"));
    assert!(store
        .has_row_diffs(&notes.created_id, &project.head_revision_id, &project.draft_revision_id)
        .expect("row diffs"));

    let unchanged = store
        .get_revision_changes(&project.draft_revision_id, &project.draft_revision_id)
        .expect("self diff");
    assert!(unchanged.is_empty());
}

#[test]
fn legacy_database_requires_reset() {
    let storage_dir = temp_dir("legacy_database");
    {
        let conn = Connection::open(storage_dir.join("tablegraph.db")).expect("open sqlite db");
        conn.execute_batch("CREATE TABLE documents (id TEXT PRIMARY KEY, body TEXT);")
            .expect("create legacy table");
    }

    let err = SqliteStore::open(&storage_dir).expect_err("legacy layout");
    assert_eq!(err.code(), "RESET_REQUIRED");
}

#[test]
fn config_controls_file_name_and_page_size() {
    let config = StoreConfig::from_json_str(
        r#"{ "db_file_name": "custom.db", "default_page_size": 2, "max_page_size": 3, "journal_mode": "delete" }"#,
    )
    .expect("parse config");
    assert_eq!(config.db_file_name, "custom.db");
    assert_eq!(config.busy_timeout_ms, StoreConfig::default().busy_timeout_ms);

    assert!(StoreConfig::from_json_str(r#"{ "default_page_size": 0 }"#).is_err());
    assert!(
        StoreConfig::from_json_str(r#"{ "default_page_size": 10, "max_page_size": 5 }"#).is_err()
    );

    let storage_dir = temp_dir("custom_config");
    let store = SqliteStore::open_with_config(&storage_dir, config.clone()).expect("open store");
    assert!(storage_dir.join("custom.db").exists());
    assert_eq!(store.config(), &config);
    drop(store);

    let mut store = SqliteStore::open_in_memory(config).expect("in-memory store");
    assert!(store.storage_dir().is_none());
    let project = store
        .create_project(project_request("paged"))
        .expect("create project");
    let draft = project.draft_revision_id;
    store
        .create_table(CreateTableRequest {
            revision_id: draft.clone(),
            table_id: "notes".to_string(),
            schema: json!({ "type": "object", "properties": { "text": { "type": "string" } } }),
        })
        .expect("create table");
    for index in 0..5 {
        store
            .create_row(CreateRowRequest {
                revision_id: draft.clone(),
                table_id: "notes".to_string(),
                row_id: format!("n{index}"),
                data: json!({ "text": format!("note {index}") }),
                meta: None,
                origin: WriteOrigin::User,
            })
            .expect("create row");
    }

    let page = store
        .get_rows(&GetRowsRequest {
            revision_id: draft.clone(),
            table_id: "notes".to_string(),
            ..GetRowsRequest::default()
        })
        .expect("default page");
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.total_count, 5);

    let page = store
        .get_rows(&GetRowsRequest {
            revision_id: draft,
            table_id: "notes".to_string(),
            first: Some(50),
            ..GetRowsRequest::default()
        })
        .expect("clamped page");
    assert_eq!(page.rows.len(), 3);
    assert!(page.has_more);
}

#[test]
fn deleting_a_branch_drops_versions_only_it_reached() {
    let storage_dir = temp_dir("branch_delete_sweep");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let project = store
        .create_project(project_request("docs"))
        .expect("create project");
    add_table_with_row(&mut store, &project.draft_revision_id);
    let master = store
        .create_revision(CreateRevisionRequest {
            revision_id: project.draft_revision_id.clone(),
            comment: None,
        })
        .expect("commit master");
    let shared_row = store
        .get_row(&master.head.id, "notes", "n1")
        .expect("master row");

    let feature = store
        .create_branch(CreateBranchRequest {
            revision_id: master.head.id.clone(),
            branch_name: "feature".to_string(),
        })
        .expect("feature");
    store
        .update_row(UpdateRowRequest {
            revision_id: feature.draft_revision.id.clone(),
            table_id: "notes".to_string(),
            row_id: "n1".to_string(),
            data: json!({ "text": "feature edit" }),
            origin: WriteOrigin::User,
        })
        .expect("edit in feature");
    let feature_commit = store
        .create_revision(CreateRevisionRequest {
            revision_id: feature.draft_revision.id.clone(),
            comment: Some("feature".to_string()),
        })
        .expect("commit feature");
    let feature_row = store
        .get_row(&feature_commit.head.id, "notes", "n1")
        .expect("feature row");
    let feature_table = store
        .get_table(&feature_commit.head.id, "notes")
        .expect("feature table");
    assert_ne!(feature_row.version_id, shared_row.version_id);

    store
        .delete_branch(DeleteBranchRequest {
            branch_id: feature.branch.id.clone(),
        })
        .expect("delete feature");

    let conn = Connection::open(storage_dir.join("tablegraph.db")).expect("open sqlite db");
    let count = |sql: &str, version_id: &str| -> i64 {
        conn.query_row(sql, [version_id], |row| row.get(0))
            .expect("count")
    };
    assert_eq!(
        count("SELECT COUNT(*) FROM rows WHERE version_id=?1", &feature_row.version_id),
        0
    );
    assert_eq!(
        count("SELECT COUNT(*) FROM tables WHERE version_id=?1", &feature_table.version_id),
        0
    );
    assert_eq!(
        count("SELECT COUNT(*) FROM rows WHERE version_id=?1", &shared_row.version_id),
        1
    );
    let unattached: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM rows r WHERE NOT EXISTS \
             (SELECT 1 FROM table_rows tr WHERE tr.row_version_id = r.version_id)",
            [],
            |row| row.get(0),
        )
        .expect("unattached rows");
    assert_eq!(unattached, 0);

    assert_eq!(
        store
            .get_row(&master.draft.id, "notes", "n1")
            .expect("master row survives")
            .data,
        json!({ "text": "hello" })
    );
}
