#![forbid(unsafe_code)]

use super::super::{BranchInfo, RevisionInfo, StoreError};
use rusqlite::{Connection, OptionalExtension, params};
use tg_core::generate_id;

const REVISION_COLUMNS: &str =
    "id, branch_id, parent_id, is_head, is_draft, is_start, has_changes, comment, created_at_ms";
const BRANCH_COLUMNS: &str = "id, project_id, name, is_root, touched, created_at_ms";

/// The writable revision of a branch together with the head it diverges from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(in crate::store) struct DraftRevision {
    pub(in crate::store) revision_id: String,
    pub(in crate::store) branch_id: String,
    pub(in crate::store) head_revision_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::store) enum RevisionSlot {
    Head,
    Draft,
    Start,
}

impl RevisionSlot {
    fn column(self) -> &'static str {
        match self {
            Self::Head => "is_head",
            Self::Draft => "is_draft",
            Self::Start => "is_start",
        }
    }
}

fn revision_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RevisionInfo> {
    Ok(RevisionInfo {
        id: row.get(0)?,
        branch_id: row.get(1)?,
        parent_id: row.get(2)?,
        is_head: row.get(3)?,
        is_draft: row.get(4)?,
        is_start: row.get(5)?,
        has_changes: row.get(6)?,
        comment: row.get(7)?,
        created_at_ms: row.get(8)?,
    })
}

fn branch_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BranchInfo> {
    Ok(BranchInfo {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        is_root: row.get(3)?,
        touched: row.get(4)?,
        created_at_ms: row.get(5)?,
    })
}

pub(in crate::store) fn load_revision_tx(
    conn: &Connection,
    revision_id: &str,
) -> Result<Option<RevisionInfo>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {REVISION_COLUMNS} FROM revisions WHERE id=?1"),
            params![revision_id],
            revision_from_row,
        )
        .optional()?)
}

pub(in crate::store) fn require_revision_tx(
    conn: &Connection,
    revision_id: &str,
) -> Result<RevisionInfo, StoreError> {
    load_revision_tx(conn, revision_id)?.ok_or_else(|| StoreError::not_found("revision", revision_id))
}

pub(in crate::store) fn load_branch_tx(
    conn: &Connection,
    branch_id: &str,
) -> Result<Option<BranchInfo>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE id=?1"),
            params![branch_id],
            branch_from_row,
        )
        .optional()?)
}

pub(in crate::store) fn require_branch_tx(
    conn: &Connection,
    branch_id: &str,
) -> Result<BranchInfo, StoreError> {
    load_branch_tx(conn, branch_id)?.ok_or_else(|| StoreError::not_found("branch", branch_id))
}

pub(in crate::store) fn branch_revision_tx(
    conn: &Connection,
    branch_id: &str,
    slot: RevisionSlot,
) -> Result<Option<RevisionInfo>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {REVISION_COLUMNS} FROM revisions WHERE branch_id=?1 AND {}=1",
                slot.column()
            ),
            params![branch_id],
            revision_from_row,
        )
        .optional()?)
}

/// Like [`branch_revision_tx`] for slots every live branch must have.
pub(in crate::store) fn require_branch_revision_tx(
    conn: &Connection,
    branch_id: &str,
    slot: RevisionSlot,
) -> Result<RevisionInfo, StoreError> {
    branch_revision_tx(conn, branch_id, slot)?.ok_or_else(|| {
        StoreError::Corrupt(format!("branch '{branch_id}' has no {slot:?} revision"))
    })
}

pub(in crate::store) fn list_revisions_tx(
    conn: &Connection,
    branch_id: &str,
) -> Result<Vec<RevisionInfo>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REVISION_COLUMNS} FROM revisions WHERE branch_id=?1 ORDER BY seq ASC"
    ))?;
    let rows = stmt.query_map(params![branch_id], revision_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub(in crate::store) fn resolve_draft_revision_tx(
    conn: &Connection,
    revision_id: &str,
) -> Result<DraftRevision, StoreError> {
    let revision = require_revision_tx(conn, revision_id)?;
    if !revision.is_draft {
        return Err(StoreError::NotDraftRevision(revision.id));
    }
    let head = require_branch_revision_tx(conn, &revision.branch_id, RevisionSlot::Head)?;
    Ok(DraftRevision {
        revision_id: revision.id,
        branch_id: revision.branch_id,
        head_revision_id: head.id,
    })
}

pub(in crate::store) struct NewRevision<'a> {
    pub(in crate::store) branch_id: &'a str,
    pub(in crate::store) parent_id: Option<&'a str>,
    pub(in crate::store) slot: RevisionSlot,
    pub(in crate::store) comment: Option<&'a str>,
    pub(in crate::store) created_at_ms: i64,
}

/// Inserts a revision; a start revision is also the branch head.
pub(in crate::store) fn insert_revision_tx(
    conn: &Connection,
    revision: NewRevision<'_>,
) -> Result<RevisionInfo, StoreError> {
    let id = generate_id();
    let seq = conn.query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM revisions", [], |row| {
        row.get::<_, i64>(0)
    })?;
    let is_start = revision.slot == RevisionSlot::Start;
    let is_head = is_start || revision.slot == RevisionSlot::Head;
    let is_draft = revision.slot == RevisionSlot::Draft;

    conn.execute(
        "INSERT INTO revisions(id, seq, branch_id, parent_id, is_head, is_draft, is_start, has_changes, comment, created_at_ms) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9)",
        params![
            id,
            seq,
            revision.branch_id,
            revision.parent_id,
            is_head,
            is_draft,
            is_start,
            revision.comment,
            revision.created_at_ms,
        ],
    )?;

    require_revision_tx(conn, &id)
}

/// Makes `to` share every table version attached to `from`.
pub(in crate::store) fn copy_revision_tables_tx(
    conn: &Connection,
    from_revision_id: &str,
    to_revision_id: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO revision_tables(revision_id, table_version_id, table_id, table_created_id) \
         SELECT ?2, table_version_id, table_id, table_created_id \
         FROM revision_tables WHERE revision_id=?1",
        params![from_revision_id, to_revision_id],
    )?;
    Ok(())
}

pub(in crate::store) fn set_draft_state_tx(
    conn: &Connection,
    draft: &DraftRevision,
    has_changes: bool,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE revisions SET has_changes=?2 WHERE id=?1",
        params![draft.revision_id, has_changes],
    )?;
    conn.execute(
        "UPDATE branches SET touched=?2 WHERE id=?1",
        params![draft.branch_id, has_changes],
    )?;
    Ok(())
}

pub(in crate::store) fn insert_branch_tx(
    conn: &Connection,
    project_id: &str,
    name: &str,
    is_root: bool,
    created_at_ms: i64,
) -> Result<BranchInfo, StoreError> {
    let id = generate_id();
    conn.execute(
        "INSERT INTO branches(id, project_id, name, is_root, touched, created_at_ms) \
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![id, project_id, name, is_root, created_at_ms],
    )
    .map_err(|err| {
        if super::super::is_constraint_violation(&err) {
            StoreError::BranchAlreadyExists(name.to_string())
        } else {
            StoreError::Sql(err)
        }
    })?;
    require_branch_tx(conn, &id)
}

pub(in crate::store) fn root_branch_tx(
    conn: &Connection,
    project_id: &str,
) -> Result<Option<BranchInfo>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE project_id=?1 AND is_root=1"),
            params![project_id],
            branch_from_row,
        )
        .optional()?)
}

pub(in crate::store) fn list_branches_tx(
    conn: &Connection,
    project_id: &str,
) -> Result<Vec<BranchInfo>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BRANCH_COLUMNS} FROM branches WHERE project_id=?1 \
         ORDER BY is_root DESC, created_at_ms ASC, name ASC"
    ))?;
    let rows = stmt.query_map(params![project_id], branch_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
