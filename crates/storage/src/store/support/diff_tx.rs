#![forbid(unsafe_code)]

use super::super::StoreError;
use super::{
    DraftRevision, changelog_is_empty_tx, find_table_by_created_id_tx, row_versions_tx,
    set_draft_state_tx,
};
use rusqlite::{Connection, params};
use std::collections::BTreeMap;

/// Whether the sets of attached table versions of two revisions differ.
pub(in crate::store) fn has_table_diffs_tx(
    conn: &Connection,
    from_revision_id: &str,
    to_revision_id: &str,
) -> Result<bool, StoreError> {
    Ok(conn.query_row(
        "SELECT EXISTS ( \
           SELECT table_version_id FROM revision_tables WHERE revision_id=?1 \
           EXCEPT \
           SELECT table_version_id FROM revision_tables WHERE revision_id=?2 \
         ) OR EXISTS ( \
           SELECT table_version_id FROM revision_tables WHERE revision_id=?2 \
           EXCEPT \
           SELECT table_version_id FROM revision_tables WHERE revision_id=?1 \
         )",
        params![from_revision_id, to_revision_id],
        |row| row.get::<_, bool>(0),
    )?)
}

/// Whether two table versions hold different sets of row versions.
pub(in crate::store) fn table_versions_differ_tx(
    conn: &Connection,
    left_version_id: &str,
    right_version_id: &str,
) -> Result<bool, StoreError> {
    if left_version_id == right_version_id {
        return Ok(false);
    }
    Ok(conn.query_row(
        "SELECT EXISTS ( \
           SELECT row_version_id FROM table_rows WHERE table_version_id=?1 \
           EXCEPT \
           SELECT row_version_id FROM table_rows WHERE table_version_id=?2 \
         ) OR EXISTS ( \
           SELECT row_version_id FROM table_rows WHERE table_version_id=?2 \
           EXCEPT \
           SELECT row_version_id FROM table_rows WHERE table_version_id=?1 \
         )",
        params![left_version_id, right_version_id],
        |row| row.get::<_, bool>(0),
    )?)
}

/// Row-level diff of one logical table between two revisions. A table
/// present on only one side differs; absent on both sides does not.
pub(in crate::store) fn has_row_diffs_tx(
    conn: &Connection,
    table_created_id: &str,
    from_revision_id: &str,
    to_revision_id: &str,
) -> Result<bool, StoreError> {
    let from = find_table_by_created_id_tx(conn, from_revision_id, table_created_id)?;
    let to = find_table_by_created_id_tx(conn, to_revision_id, table_created_id)?;
    match (from, to) {
        (None, None) => Ok(false),
        (Some(from), Some(to)) => table_versions_differ_tx(conn, &from.version_id, &to.version_id),
        _ => Ok(true),
    }
}

/// Number of logical rows added, removed or re-versioned between two table
/// versions (either side may be absent).
pub(in crate::store) fn count_row_diffs_tx(
    conn: &Connection,
    from_version_id: Option<&str>,
    to_version_id: Option<&str>,
) -> Result<usize, StoreError> {
    if from_version_id == to_version_id {
        return Ok(0);
    }
    let from = match from_version_id {
        Some(version_id) => row_versions_tx(conn, version_id)?,
        None => BTreeMap::new(),
    };
    let to = match to_version_id {
        Some(version_id) => row_versions_tx(conn, version_id)?,
        None => BTreeMap::new(),
    };

    let changed_or_removed = from
        .iter()
        .filter(|(created_id, version_id)| to.get(*created_id) != Some(*version_id))
        .count();
    let added = to.keys().filter(|created_id| !from.contains_key(*created_id)).count();
    Ok(changed_or_removed + added)
}

/// Recomputes `has_changes` of a draft (and `touched` of its branch).
///
/// An empty changelog means nothing was written since the last commit or
/// revert, so the table diff is skipped.
pub(in crate::store) fn refresh_draft_state_tx(
    conn: &Connection,
    draft: &DraftRevision,
) -> Result<bool, StoreError> {
    let has_changes = if changelog_is_empty_tx(conn, &draft.revision_id)? {
        false
    } else {
        has_table_diffs_tx(conn, &draft.head_revision_id, &draft.revision_id)?
    };
    set_draft_state_tx(conn, draft, has_changes)?;
    Ok(has_changes)
}
