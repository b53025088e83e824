#![forbid(unsafe_code)]

mod create;
mod patch;
mod query;
mod remove;
mod rename;
mod update;

use super::*;
use serde_json::Value;
use std::collections::BTreeSet;
use tg_core::{SchemaNode, hash_json};

/// A user table that row commands may write, with its compiled schema.
struct WritableTable {
    table: TableInfo,
    schema: CompiledTableSchema,
}

fn writable_table_tx(ctx: &WriteCtx<'_>, table_id: &str) -> Result<WritableTable, StoreError> {
    let table = require_table_tx(ctx.conn, ctx.revision_id(), table_id)?;
    ensure_table_writable(ctx, &table)?;
    let schema = compile_table_schema_tx(ctx.conn, ctx.revision_id(), &table.id)?;
    Ok(WritableTable { table, schema })
}

fn validate_row_data(
    table_id: &str,
    row_id: &str,
    schema: &SchemaNode,
    data: &Value,
) -> Result<(), StoreError> {
    let details = schema.validate(data);
    if details.is_empty() {
        return Ok(());
    }
    Err(StoreError::DataNotValid {
        table_id: table_id.to_string(),
        row_id: Some(row_id.to_string()),
        details,
    })
}

/// Canonical row ids of a batch; a repeated id is a `DuplicateRow`.
fn unique_row_ids<'a>(
    table_id: &str,
    row_ids: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<String>, StoreError> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for row_id in row_ids {
        let row_id = canonicalize_row_id(row_id)?;
        if !seen.insert(row_id.clone()) {
            return Err(StoreError::DuplicateRow {
                table_id: table_id.to_string(),
                row_id,
            });
        }
        out.push(row_id);
    }
    Ok(out)
}

/// Writes already validated documents over existing rows. Rows whose data
/// and schema hash are unchanged are reported without a fork.
fn write_row_updates_tx(
    ctx: &mut WriteCtx<'_>,
    target: &WritableTable,
    updates: Vec<(String, Value)>,
) -> Result<Vec<RowUpdate>, StoreError> {
    let mut draft_table: Option<TableInfo> = None;
    let mut out = Vec::with_capacity(updates.len());
    let mut written = Vec::new();

    for (row_id, data) in updates {
        let table = draft_table.as_ref().unwrap_or(&target.table);
        let current = require_row_tx(ctx.conn, table, &row_id)?;
        if current.hash == hash_json(&data) && current.schema_hash == target.schema.hash {
            out.push(RowUpdate {
                previous_version_id: current.version_id.clone(),
                row: current,
                changed: false,
            });
            continue;
        }

        let table = match &draft_table {
            Some(table) => table.clone(),
            None => {
                let forked = get_or_create_draft_table_tx(ctx, &target.table)?;
                draft_table = Some(forked.clone());
                forked
            }
        };
        let draft_row = get_or_create_draft_row_tx(ctx, &table, &current)?;
        let row = write_row_data_tx(ctx, &table, &draft_row, &data, &target.schema.hash)?;
        written.push(row.id.clone());
        out.push(RowUpdate {
            row,
            previous_version_id: current.version_id,
            changed: true,
        });
    }

    for update in out.iter().filter(|update| update.changed) {
        validate_row_references_tx(
            ctx.conn,
            ctx.revision_id(),
            &target.schema.node,
            &update.row.data,
        )?;
    }
    for row_id in written {
        ctx.emit_row(RowEventKind::Updated, &target.table.id, &row_id, None);
    }
    Ok(out)
}
