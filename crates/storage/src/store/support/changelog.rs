#![forbid(unsafe_code)]

use super::super::StoreError;
use rusqlite::{Connection, params};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::store) enum ChangeCounter {
    Insert,
    Update,
    Delete,
}

pub(in crate::store) fn bump_changelog_tx(
    conn: &Connection,
    revision_id: &str,
    table_created_id: &str,
    counter: ChangeCounter,
) -> Result<(), StoreError> {
    let (inserts, updates, deletes) = match counter {
        ChangeCounter::Insert => (1, 0, 0),
        ChangeCounter::Update => (0, 1, 0),
        ChangeCounter::Delete => (0, 0, 1),
    };
    conn.execute(
        "INSERT INTO changelog(revision_id, table_created_id, inserts, updates, deletes) \
         VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT(revision_id, table_created_id) DO UPDATE SET \
           inserts = inserts + excluded.inserts, \
           updates = updates + excluded.updates, \
           deletes = deletes + excluded.deletes",
        params![revision_id, table_created_id, inserts, updates, deletes],
    )?;
    Ok(())
}

/// Drops changelog entries of one table, or of the whole revision.
pub(in crate::store) fn clear_changelog_tx(
    conn: &Connection,
    revision_id: &str,
    table_created_id: Option<&str>,
) -> Result<(), StoreError> {
    match table_created_id {
        Some(created_id) => conn.execute(
            "DELETE FROM changelog WHERE revision_id=?1 AND table_created_id=?2",
            params![revision_id, created_id],
        )?,
        None => conn.execute(
            "DELETE FROM changelog WHERE revision_id=?1",
            params![revision_id],
        )?,
    };
    Ok(())
}

pub(in crate::store) fn changelog_is_empty_tx(
    conn: &Connection,
    revision_id: &str,
) -> Result<bool, StoreError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM changelog WHERE revision_id=?1)",
        params![revision_id],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(!exists)
}
