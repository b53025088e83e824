#![forbid(unsafe_code)]

use super::super::{StoreError, TableInfo, is_constraint_violation};
use super::{
    ChangeCounter, WriteCtx, bump_changelog_tx, clear_changelog_tx, table_versions_differ_tx,
};
use rusqlite::{Connection, OptionalExtension, params};
use tg_core::generate_id;

const TABLE_COLUMNS: &str =
    "t.version_id, t.id, t.created_id, t.readonly, t.system, t.created_at_ms, t.updated_at_ms";

fn table_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TableInfo> {
    Ok(TableInfo {
        version_id: row.get(0)?,
        id: row.get(1)?,
        created_id: row.get(2)?,
        readonly: row.get(3)?,
        system: row.get(4)?,
        created_at_ms: row.get(5)?,
        updated_at_ms: row.get(6)?,
    })
}

pub(in crate::store) fn find_table_tx(
    conn: &Connection,
    revision_id: &str,
    table_id: &str,
) -> Result<Option<TableInfo>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {TABLE_COLUMNS} FROM revision_tables rt \
                 JOIN tables t ON t.version_id = rt.table_version_id \
                 WHERE rt.revision_id=?1 AND rt.table_id=?2"
            ),
            params![revision_id, table_id],
            table_from_row,
        )
        .optional()?)
}

pub(in crate::store) fn require_table_tx(
    conn: &Connection,
    revision_id: &str,
    table_id: &str,
) -> Result<TableInfo, StoreError> {
    find_table_tx(conn, revision_id, table_id)?.ok_or_else(|| StoreError::not_found("table", table_id))
}

pub(in crate::store) fn find_table_by_created_id_tx(
    conn: &Connection,
    revision_id: &str,
    created_id: &str,
) -> Result<Option<TableInfo>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {TABLE_COLUMNS} FROM revision_tables rt \
                 JOIN tables t ON t.version_id = rt.table_version_id \
                 WHERE rt.revision_id=?1 AND rt.table_created_id=?2"
            ),
            params![revision_id, created_id],
            table_from_row,
        )
        .optional()?)
}

pub(in crate::store) fn list_tables_tx(
    conn: &Connection,
    revision_id: &str,
    include_system: bool,
) -> Result<Vec<TableInfo>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TABLE_COLUMNS} FROM revision_tables rt \
         JOIN tables t ON t.version_id = rt.table_version_id \
         WHERE rt.revision_id=?1 AND (?2 = 1 OR t.system = 0) \
         ORDER BY t.created_at_ms ASC, t.id ASC"
    ))?;
    let rows = stmt.query_map(params![revision_id, include_system], table_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn attach_table_tx(conn: &Connection, revision_id: &str, table: &TableInfo) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO revision_tables(revision_id, table_version_id, table_id, table_created_id) \
         VALUES (?1, ?2, ?3, ?4)",
        params![revision_id, table.version_id, table.id, table.created_id],
    )
    .map_err(|err| {
        if is_constraint_violation(&err) {
            StoreError::TableAlreadyExists(table.id.clone())
        } else {
            StoreError::Sql(err)
        }
    })?;
    Ok(())
}

fn detach_table_tx(conn: &Connection, revision_id: &str, version_id: &str) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM revision_tables WHERE revision_id=?1 AND table_version_id=?2",
        params![revision_id, version_id],
    )?;
    Ok(())
}

fn load_table_version_tx(conn: &Connection, version_id: &str) -> Result<TableInfo, StoreError> {
    conn.query_row(
        &format!("SELECT {TABLE_COLUMNS} FROM tables t WHERE t.version_id=?1"),
        params![version_id],
        table_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::Corrupt(format!("table version '{version_id}' vanished")))
}

/// Creates a new logical table, writable and attached to the draft.
pub(in crate::store) fn insert_table_tx(
    ctx: &mut WriteCtx<'_>,
    table_id: &str,
    system: bool,
) -> Result<TableInfo, StoreError> {
    if find_table_tx(ctx.conn, ctx.revision_id(), table_id)?.is_some() {
        return Err(StoreError::TableAlreadyExists(table_id.to_string()));
    }

    let table = TableInfo {
        version_id: generate_id(),
        id: table_id.to_string(),
        created_id: generate_id(),
        readonly: false,
        system,
        created_at_ms: ctx.now_ms,
        updated_at_ms: ctx.now_ms,
    };
    ctx.conn.execute(
        "INSERT INTO tables(version_id, id, created_id, readonly, system, created_at_ms, updated_at_ms) \
         VALUES (?1, ?2, ?3, 0, ?4, ?5, ?5)",
        params![table.version_id, table.id, table.created_id, table.system, table.created_at_ms],
    )?;
    attach_table_tx(ctx.conn, ctx.revision_id(), &table)?;
    bump_changelog_tx(ctx.conn, ctx.revision_id(), &table.created_id, ChangeCounter::Insert)?;

    tracing::debug!(table_id, system, version_id = %table.version_id, "table created");
    Ok(table)
}

/// Returns the draft's writable version of `table`, forking a readonly one.
///
/// The fork keeps `id` and `created_id`, shares every row version of the
/// source and replaces the source in the draft. Calling it again for the same
/// logical table returns the same version.
pub(in crate::store) fn get_or_create_draft_table_tx(
    ctx: &mut WriteCtx<'_>,
    table: &TableInfo,
) -> Result<TableInfo, StoreError> {
    if !table.readonly {
        return Ok(table.clone());
    }

    let version_id = generate_id();
    ctx.conn.execute(
        "INSERT INTO tables(version_id, id, created_id, readonly, system, created_at_ms, updated_at_ms) \
         VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6)",
        params![
            version_id,
            table.id,
            table.created_id,
            table.system,
            table.created_at_ms,
            ctx.now_ms
        ],
    )?;
    ctx.conn.execute(
        "INSERT INTO table_rows(table_version_id, row_version_id, row_id) \
         SELECT ?2, row_version_id, row_id FROM table_rows WHERE table_version_id=?1",
        params![table.version_id, version_id],
    )?;

    let forked = load_table_version_tx(ctx.conn, &version_id)?;
    detach_table_tx(ctx.conn, ctx.revision_id(), &table.version_id)?;
    attach_table_tx(ctx.conn, ctx.revision_id(), &forked)?;

    tracing::debug!(
        table_id = %table.id,
        from = %table.version_id,
        to = %forked.version_id,
        "forked table"
    );
    Ok(forked)
}

pub(in crate::store) fn ensure_table_writable(
    ctx: &WriteCtx<'_>,
    table: &TableInfo,
) -> Result<(), StoreError> {
    if table.system && !ctx.can_write_system() {
        return Err(StoreError::SystemTableWrite(table.id.clone()));
    }
    Ok(())
}

/// Renames the draft's writable table version.
pub(in crate::store) fn rename_table_version_tx(
    ctx: &mut WriteCtx<'_>,
    table: &TableInfo,
    next_table_id: &str,
) -> Result<TableInfo, StoreError> {
    debug_assert!(!table.readonly);
    if find_table_tx(ctx.conn, ctx.revision_id(), next_table_id)?.is_some() {
        return Err(StoreError::TableAlreadyExists(next_table_id.to_string()));
    }
    ctx.conn.execute(
        "UPDATE tables SET id=?2, updated_at_ms=?3 WHERE version_id=?1 AND readonly=0",
        params![table.version_id, next_table_id, ctx.now_ms],
    )?;
    ctx.conn.execute(
        "UPDATE revision_tables SET table_id=?3 WHERE revision_id=?1 AND table_version_id=?2",
        params![ctx.revision_id(), table.version_id, next_table_id],
    )?;
    bump_changelog_tx(ctx.conn, ctx.revision_id(), &table.created_id, ChangeCounter::Update)?;
    load_table_version_tx(ctx.conn, &table.version_id)
}

/// Removes a table from the draft, deleting it if the draft owned it.
pub(in crate::store) fn drop_table_from_draft_tx(
    ctx: &mut WriteCtx<'_>,
    table: &TableInfo,
) -> Result<(), StoreError> {
    detach_table_tx(ctx.conn, ctx.revision_id(), &table.version_id)?;
    if !table.readonly {
        delete_writable_table_version_tx(ctx.conn, &table.version_id)?;
    }
    bump_changelog_tx(ctx.conn, ctx.revision_id(), &table.created_id, ChangeCounter::Delete)?;
    Ok(())
}

/// Deletes a detached writable table version and its writable rows.
pub(in crate::store) fn delete_writable_table_version_tx(
    conn: &Connection,
    version_id: &str,
) -> Result<(), StoreError> {
    let writable_rows = {
        let mut stmt = conn.prepare(
            "SELECT tr.row_version_id FROM table_rows tr \
             JOIN rows r ON r.version_id = tr.row_version_id \
             WHERE tr.table_version_id=?1 AND r.readonly=0",
        )?;
        let rows = stmt.query_map(params![version_id], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    conn.execute(
        "DELETE FROM table_rows WHERE table_version_id=?1",
        params![version_id],
    )?;
    for row_version_id in writable_rows {
        conn.execute(
            "DELETE FROM rows WHERE version_id=?1 AND readonly=0 \
               AND NOT EXISTS (SELECT 1 FROM table_rows WHERE row_version_id=?1)",
            params![row_version_id],
        )?;
    }
    conn.execute(
        "DELETE FROM tables WHERE version_id=?1 AND readonly=0",
        params![version_id],
    )?;
    Ok(())
}

/// Reattaches head's version of a table when the draft's fork has become
/// identical to it. Returns whether a revert happened.
pub(in crate::store) fn revert_table_if_unchanged_tx(
    ctx: &mut WriteCtx<'_>,
    created_id: &str,
) -> Result<bool, StoreError> {
    let Some(draft_table) = find_table_by_created_id_tx(ctx.conn, ctx.revision_id(), created_id)?
    else {
        return Ok(false);
    };
    let Some(head_table) =
        find_table_by_created_id_tx(ctx.conn, &ctx.draft.head_revision_id, created_id)?
    else {
        return Ok(false);
    };

    if draft_table.version_id == head_table.version_id
        || draft_table.readonly
        || draft_table.id != head_table.id
        || table_versions_differ_tx(ctx.conn, &draft_table.version_id, &head_table.version_id)?
    {
        return Ok(false);
    }

    detach_table_tx(ctx.conn, ctx.revision_id(), &draft_table.version_id)?;
    delete_writable_table_version_tx(ctx.conn, &draft_table.version_id)?;
    attach_table_tx(ctx.conn, ctx.revision_id(), &head_table)?;
    clear_changelog_tx(ctx.conn, ctx.revision_id(), Some(created_id))?;

    tracing::debug!(
        table_id = %head_table.id,
        version_id = %head_table.version_id,
        "reverted no-op table fork"
    );
    Ok(true)
}

/// Deletes every writable version owned by a draft and detaches all tables.
pub(in crate::store) fn discard_draft_versions_tx(
    conn: &Connection,
    revision_id: &str,
) -> Result<(), StoreError> {
    let writable_tables = {
        let mut stmt = conn.prepare(
            "SELECT t.version_id FROM revision_tables rt \
             JOIN tables t ON t.version_id = rt.table_version_id \
             WHERE rt.revision_id=?1 AND t.readonly=0",
        )?;
        let rows = stmt.query_map(params![revision_id], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    conn.execute(
        "DELETE FROM revision_tables WHERE revision_id=?1",
        params![revision_id],
    )?;
    for version_id in writable_tables {
        delete_writable_table_version_tx(conn, &version_id)?;
    }
    clear_changelog_tx(conn, revision_id, None)
}

/// Deletes table and row versions no revision reaches any more. Returns the
/// number of table and row versions removed.
pub(in crate::store) fn sweep_unattached_versions_tx(
    conn: &Connection,
) -> Result<(usize, usize), StoreError> {
    // table_rows follow their table version through ON DELETE CASCADE.
    let tables = conn.execute(
        "DELETE FROM tables WHERE NOT EXISTS \
         (SELECT 1 FROM revision_tables rt WHERE rt.table_version_id = tables.version_id)",
        [],
    )?;
    let rows = conn.execute(
        "DELETE FROM rows WHERE NOT EXISTS \
         (SELECT 1 FROM table_rows tr WHERE tr.row_version_id = rows.version_id)",
        [],
    )?;
    Ok((tables, rows))
}
