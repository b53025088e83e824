#![forbid(unsafe_code)]

use super::super::{RowRecord, StoreError, TableInfo, is_constraint_violation};
use super::{ChangeCounter, WriteCtx, bump_changelog_tx, json_column, opt_json_column};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::collections::BTreeMap;
use tg_core::{generate_id, hash_json};

pub(in crate::store) const ROW_COLUMNS: &str = "r.version_id, r.id, r.created_id, r.readonly, r.data, r.hash, \
     r.schema_hash, r.meta, r.created_at_ms, r.updated_at_ms, r.published_at_ms";

pub(in crate::store) fn row_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RowRecord> {
    Ok(RowRecord {
        version_id: row.get(0)?,
        id: row.get(1)?,
        created_id: row.get(2)?,
        readonly: row.get(3)?,
        data: json_column(row, 4)?,
        hash: row.get(5)?,
        schema_hash: row.get(6)?,
        meta: opt_json_column(row, 7)?,
        created_at_ms: row.get(8)?,
        updated_at_ms: row.get(9)?,
        published_at_ms: row.get(10)?,
    })
}

pub(in crate::store) fn find_row_tx(
    conn: &Connection,
    table_version_id: &str,
    row_id: &str,
) -> Result<Option<RowRecord>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {ROW_COLUMNS} FROM table_rows tr \
                 JOIN rows r ON r.version_id = tr.row_version_id \
                 WHERE tr.table_version_id=?1 AND tr.row_id=?2"
            ),
            params![table_version_id, row_id],
            row_from_row,
        )
        .optional()?)
}

pub(in crate::store) fn require_row_tx(
    conn: &Connection,
    table: &TableInfo,
    row_id: &str,
) -> Result<RowRecord, StoreError> {
    find_row_tx(conn, &table.version_id, row_id)?.ok_or_else(|| {
        StoreError::not_found("row", format!("{}/{row_id}", table.id))
    })
}

pub(in crate::store) fn list_rows_tx(
    conn: &Connection,
    table_version_id: &str,
) -> Result<Vec<RowRecord>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ROW_COLUMNS} FROM table_rows tr \
         JOIN rows r ON r.version_id = tr.row_version_id \
         WHERE tr.table_version_id=?1 \
         ORDER BY r.created_at_ms ASC, r.id ASC"
    ))?;
    let rows = stmt.query_map(params![table_version_id], row_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// `created_id -> version_id` of every row of a table version.
pub(in crate::store) fn row_versions_tx(
    conn: &Connection,
    table_version_id: &str,
) -> Result<BTreeMap<String, String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT r.created_id, r.version_id FROM table_rows tr \
         JOIN rows r ON r.version_id = tr.row_version_id \
         WHERE tr.table_version_id=?1",
    )?;
    let rows = stmt.query_map(params![table_version_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    Ok(rows.collect::<Result<BTreeMap<_, _>, _>>()?)
}

pub(in crate::store) struct NewRowVersion<'a> {
    pub(in crate::store) row_id: &'a str,
    pub(in crate::store) data: &'a Value,
    pub(in crate::store) schema_hash: &'a str,
    pub(in crate::store) meta: Option<&'a Value>,
}

/// Inserts a brand-new logical row into a writable table version.
pub(in crate::store) fn insert_row_tx(
    ctx: &mut WriteCtx<'_>,
    table: &TableInfo,
    row: NewRowVersion<'_>,
) -> Result<RowRecord, StoreError> {
    debug_assert!(!table.readonly);
    let version_id = generate_id();
    let data = serde_json::to_string(row.data)?;
    let meta = row.meta.map(serde_json::to_string).transpose()?;

    ctx.conn.execute(
        "INSERT INTO rows(version_id, id, created_id, readonly, data, hash, schema_hash, meta, created_at_ms, updated_at_ms, published_at_ms) \
         VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?7, ?8, ?8, ?8)",
        params![
            version_id,
            row.row_id,
            generate_id(),
            data,
            hash_json(row.data),
            row.schema_hash,
            meta,
            ctx.now_ms
        ],
    )?;
    ctx.conn
        .execute(
            "INSERT INTO table_rows(table_version_id, row_version_id, row_id) VALUES (?1, ?2, ?3)",
            params![table.version_id, version_id, row.row_id],
        )
        .map_err(|err| {
            if is_constraint_violation(&err) {
                StoreError::DuplicateRow {
                    table_id: table.id.clone(),
                    row_id: row.row_id.to_string(),
                }
            } else {
                StoreError::Sql(err)
            }
        })?;
    bump_changelog_tx(ctx.conn, ctx.revision_id(), &table.created_id, ChangeCounter::Insert)?;

    load_row_version_tx(ctx.conn, &version_id)
}

fn load_row_version_tx(conn: &Connection, version_id: &str) -> Result<RowRecord, StoreError> {
    conn.query_row(
        &format!("SELECT {ROW_COLUMNS} FROM rows r WHERE r.version_id=?1"),
        params![version_id],
        row_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::Corrupt(format!("row version '{version_id}' vanished")))
}

/// Returns the writable version of `row` inside the writable `table`,
/// forking a readonly one (same `id`/`created_id`/`meta`).
pub(in crate::store) fn get_or_create_draft_row_tx(
    ctx: &mut WriteCtx<'_>,
    table: &TableInfo,
    row: &RowRecord,
) -> Result<RowRecord, StoreError> {
    debug_assert!(!table.readonly);
    if !row.readonly {
        return Ok(row.clone());
    }

    let version_id = generate_id();
    ctx.conn.execute(
        "INSERT INTO rows(version_id, id, created_id, readonly, data, hash, schema_hash, meta, created_at_ms, updated_at_ms, published_at_ms) \
         SELECT ?2, id, created_id, 0, data, hash, schema_hash, meta, created_at_ms, ?3, published_at_ms \
         FROM rows WHERE version_id=?1",
        params![row.version_id, version_id, ctx.now_ms],
    )?;
    ctx.conn.execute(
        "UPDATE table_rows SET row_version_id=?3 WHERE table_version_id=?1 AND row_version_id=?2",
        params![table.version_id, row.version_id, version_id],
    )?;

    tracing::debug!(
        table_id = %table.id,
        row_id = %row.id,
        from = %row.version_id,
        to = %version_id,
        "forked row"
    );
    load_row_version_tx(ctx.conn, &version_id)
}

/// Overwrites data of a writable row version and recomputes its hashes.
pub(in crate::store) fn write_row_data_tx(
    ctx: &mut WriteCtx<'_>,
    table: &TableInfo,
    row: &RowRecord,
    data: &Value,
    schema_hash: &str,
) -> Result<RowRecord, StoreError> {
    debug_assert!(!row.readonly);
    ctx.conn.execute(
        "UPDATE rows SET data=?2, hash=?3, schema_hash=?4, updated_at_ms=?5 \
         WHERE version_id=?1 AND readonly=0",
        params![
            row.version_id,
            serde_json::to_string(data)?,
            hash_json(data),
            schema_hash,
            ctx.now_ms
        ],
    )?;
    bump_changelog_tx(ctx.conn, ctx.revision_id(), &table.created_id, ChangeCounter::Update)?;
    load_row_version_tx(ctx.conn, &row.version_id)
}

pub(in crate::store) fn rename_row_version_tx(
    ctx: &mut WriteCtx<'_>,
    table: &TableInfo,
    row: &RowRecord,
    next_row_id: &str,
) -> Result<RowRecord, StoreError> {
    debug_assert!(!row.readonly);
    let already_exists = || StoreError::RowAlreadyExists {
        table_id: table.id.clone(),
        row_id: next_row_id.to_string(),
    };
    if find_row_tx(ctx.conn, &table.version_id, next_row_id)?.is_some() {
        return Err(already_exists());
    }

    ctx.conn
        .execute(
            "UPDATE table_rows SET row_id=?3 WHERE table_version_id=?1 AND row_version_id=?2",
            params![table.version_id, row.version_id, next_row_id],
        )
        .map_err(|err| {
            if is_constraint_violation(&err) {
                already_exists()
            } else {
                StoreError::Sql(err)
            }
        })?;
    ctx.conn.execute(
        "UPDATE rows SET id=?2, updated_at_ms=?3 WHERE version_id=?1 AND readonly=0",
        params![row.version_id, next_row_id, ctx.now_ms],
    )?;
    bump_changelog_tx(ctx.conn, ctx.revision_id(), &table.created_id, ChangeCounter::Update)?;
    load_row_version_tx(ctx.conn, &row.version_id)
}

/// Removes a row from a writable table version; a writable row version is
/// deleted outright.
pub(in crate::store) fn delete_row_tx(
    ctx: &mut WriteCtx<'_>,
    table: &TableInfo,
    row: &RowRecord,
) -> Result<(), StoreError> {
    debug_assert!(!table.readonly);
    ctx.conn.execute(
        "DELETE FROM table_rows WHERE table_version_id=?1 AND row_version_id=?2",
        params![table.version_id, row.version_id],
    )?;
    if !row.readonly {
        ctx.conn.execute(
            "DELETE FROM rows WHERE version_id=?1 AND readonly=0",
            params![row.version_id],
        )?;
    }
    bump_changelog_tx(ctx.conn, ctx.revision_id(), &table.created_id, ChangeCounter::Delete)?;
    Ok(())
}
