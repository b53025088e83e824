#![forbid(unsafe_code)]

use super::super::{RowRecord, StoreError, TableInfo, TableSchema};
use super::{
    NewRowVersion, WriteCtx, delete_row_tx, ensure_table_writable, find_row_tx, find_table_tx,
    get_or_create_draft_row_tx, get_or_create_draft_table_tx, insert_row_tx, insert_table_tx,
    list_rows_tx, rename_row_version_tx, write_row_data_tx,
};
use rusqlite::Connection;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tg_core::ids::{SCHEMA_TABLE_ID, SHARED_SCHEMAS_TABLE_ID};
use tg_core::{SchemaNode, compile_schema, hash_json};

/// `schema_hash` stamped on rows of a system table.
pub(in crate::store) fn system_schema_hash(system_table_id: &str) -> String {
    hash_json(&json!({ "systemTable": system_table_id }))
}

/// Writable draft version of a system table, created on first use.
pub(in crate::store) fn ensure_system_table_tx(
    ctx: &mut WriteCtx<'_>,
    system_table_id: &str,
) -> Result<TableInfo, StoreError> {
    ctx.as_system(|ctx| {
        let table = match find_table_tx(ctx.conn, ctx.revision_id(), system_table_id)? {
            Some(table) => get_or_create_draft_table_tx(ctx, &table)?,
            None => insert_table_tx(ctx, system_table_id, true)?,
        };
        ensure_table_writable(ctx, &table)?;
        Ok(table)
    })
}

pub(in crate::store) fn read_system_entry_tx(
    conn: &Connection,
    revision_id: &str,
    system_table_id: &str,
    row_id: &str,
) -> Result<Option<RowRecord>, StoreError> {
    let Some(table) = find_table_tx(conn, revision_id, system_table_id)? else {
        return Ok(None);
    };
    find_row_tx(conn, &table.version_id, row_id)
}

pub(in crate::store) fn list_system_entries_tx(
    conn: &Connection,
    revision_id: &str,
    system_table_id: &str,
) -> Result<Vec<RowRecord>, StoreError> {
    match find_table_tx(conn, revision_id, system_table_id)? {
        Some(table) => list_rows_tx(conn, &table.version_id),
        None => Ok(Vec::new()),
    }
}

/// Creates or overwrites one entry of a system table in the draft.
pub(in crate::store) fn put_system_entry_tx(
    ctx: &mut WriteCtx<'_>,
    system_table_id: &str,
    row_id: &str,
    data: &Value,
) -> Result<RowRecord, StoreError> {
    let schema_hash = system_schema_hash(system_table_id);
    if let Some(existing) = read_system_entry_tx(ctx.conn, ctx.revision_id(), system_table_id, row_id)?
        && existing.hash == hash_json(data)
    {
        return Ok(existing);
    }

    let table = ensure_system_table_tx(ctx, system_table_id)?;
    match find_row_tx(ctx.conn, &table.version_id, row_id)? {
        Some(row) => {
            let row = get_or_create_draft_row_tx(ctx, &table, &row)?;
            write_row_data_tx(ctx, &table, &row, data, &schema_hash)
        }
        None => insert_row_tx(
            ctx,
            &table,
            NewRowVersion {
                row_id,
                data,
                schema_hash: &schema_hash,
                meta: None,
            },
        ),
    }
}

/// Renames a system table entry if present. Returns whether it existed.
pub(in crate::store) fn rename_system_entry_tx(
    ctx: &mut WriteCtx<'_>,
    system_table_id: &str,
    row_id: &str,
    next_row_id: &str,
) -> Result<bool, StoreError> {
    if read_system_entry_tx(ctx.conn, ctx.revision_id(), system_table_id, row_id)?.is_none() {
        return Ok(false);
    }
    let table = ensure_system_table_tx(ctx, system_table_id)?;
    let Some(row) = find_row_tx(ctx.conn, &table.version_id, row_id)? else {
        return Ok(false);
    };
    let row = get_or_create_draft_row_tx(ctx, &table, &row)?;
    rename_row_version_tx(ctx, &table, &row, next_row_id)?;
    Ok(true)
}

pub(in crate::store) fn remove_system_entry_tx(
    ctx: &mut WriteCtx<'_>,
    system_table_id: &str,
    row_id: &str,
) -> Result<bool, StoreError> {
    if read_system_entry_tx(ctx.conn, ctx.revision_id(), system_table_id, row_id)?.is_none() {
        return Ok(false);
    }
    let table = ensure_system_table_tx(ctx, system_table_id)?;
    let Some(row) = find_row_tx(ctx.conn, &table.version_id, row_id)? else {
        return Ok(false);
    };
    delete_row_tx(ctx, &table, &row)?;
    Ok(true)
}

pub(in crate::store) fn read_table_schema_tx(
    conn: &Connection,
    revision_id: &str,
    table_id: &str,
) -> Result<Option<TableSchema>, StoreError> {
    Ok(
        read_system_entry_tx(conn, revision_id, SCHEMA_TABLE_ID, table_id)?.map(|row| TableSchema {
            table_id: row.id,
            schema: row.data,
            hash: row.hash,
        }),
    )
}

pub(in crate::store) fn require_table_schema_tx(
    conn: &Connection,
    revision_id: &str,
    table_id: &str,
) -> Result<TableSchema, StoreError> {
    read_table_schema_tx(conn, revision_id, table_id)?
        .ok_or_else(|| StoreError::Corrupt(format!("table '{table_id}' has no schema entry")))
}

pub(in crate::store) fn all_table_schemas_tx(
    conn: &Connection,
    revision_id: &str,
) -> Result<Vec<TableSchema>, StoreError> {
    Ok(list_system_entries_tx(conn, revision_id, SCHEMA_TABLE_ID)?
        .into_iter()
        .map(|row| TableSchema {
            table_id: row.id,
            schema: row.data,
            hash: row.hash,
        })
        .collect())
}

pub(in crate::store) fn shared_schemas_tx(
    conn: &Connection,
    revision_id: &str,
) -> Result<BTreeMap<String, Value>, StoreError> {
    Ok(list_system_entries_tx(conn, revision_id, SHARED_SCHEMAS_TABLE_ID)?
        .into_iter()
        .map(|row| (row.id, row.data))
        .collect())
}

pub(in crate::store) fn compile_schema_tx(
    conn: &Connection,
    revision_id: &str,
    schema: &Value,
) -> Result<SchemaNode, StoreError> {
    let shared = shared_schemas_tx(conn, revision_id)?;
    Ok(compile_schema(schema, &shared)?)
}

/// A table's schema document, its hash and its compiled tree.
pub(in crate::store) struct CompiledTableSchema {
    pub(in crate::store) schema: Value,
    pub(in crate::store) hash: String,
    pub(in crate::store) node: SchemaNode,
}

pub(in crate::store) fn compile_table_schema_tx(
    conn: &Connection,
    revision_id: &str,
    table_id: &str,
) -> Result<CompiledTableSchema, StoreError> {
    let entry = require_table_schema_tx(conn, revision_id, table_id)?;
    let node = compile_schema_tx(conn, revision_id, &entry.schema)?;
    Ok(CompiledTableSchema {
        schema: entry.schema,
        hash: entry.hash,
        node,
    })
}
