#![forbid(unsafe_code)]

use super::super::{RowEventKind, StoreError, TableInfo};
use super::{
    WriteCtx, all_table_schemas_tx, apply_schema_change_tx, compile_schema_tx, find_row_tx,
    find_table_tx, get_or_create_draft_row_tx, get_or_create_draft_table_tx, list_rows_tx,
    next_migration_id_tx, record_migration_tx, write_row_data_tx,
};
use rusqlite::Connection;
use serde_json::Value;
use std::collections::BTreeMap;
use tg_core::{ForeignKeyField, JsonPatch, Migration, SchemaNode, apply_json_patches};

/// Fields of one table that reference a target table.
#[derive(Clone, Debug)]
pub(in crate::store) struct ForeignKeyRef {
    pub(in crate::store) table_id: String,
    pub(in crate::store) fields: Vec<ForeignKeyField>,
}

/// Scans every table schema of a revision for `foreignKey = target`.
pub(in crate::store) fn referencing_tables_tx(
    conn: &Connection,
    revision_id: &str,
    target_table_id: &str,
) -> Result<Vec<ForeignKeyRef>, StoreError> {
    let mut out = Vec::new();
    for entry in all_table_schemas_tx(conn, revision_id)? {
        let node = compile_schema_tx(conn, revision_id, &entry.schema)?;
        let fields = node
            .foreign_keys()
            .into_iter()
            .filter(|field| field.table_id == target_table_id)
            .collect::<Vec<_>>();
        if !fields.is_empty() {
            out.push(ForeignKeyRef {
                table_id: entry.table_id,
                fields,
            });
        }
    }
    Ok(out)
}

fn references_value(fields: &[ForeignKeyField], data: &Value, row_id: &str) -> bool {
    fields.iter().any(|field| {
        field
            .path
            .select(data)
            .into_iter()
            .any(|value| value.as_str() == Some(row_id))
    })
}

/// Rows referencing `target_table_id/row_id`; a row's reference to itself
/// does not count.
pub(in crate::store) fn count_row_references_tx(
    conn: &Connection,
    revision_id: &str,
    target_table_id: &str,
    row_id: &str,
) -> Result<usize, StoreError> {
    let mut count = 0;
    for reference in referencing_tables_tx(conn, revision_id, target_table_id)? {
        let Some(table) = find_table_tx(conn, revision_id, &reference.table_id)? else {
            continue;
        };
        for row in list_rows_tx(conn, &table.version_id)? {
            if reference.table_id == target_table_id && row.id == row_id {
                continue;
            }
            if references_value(&reference.fields, &row.data, row_id) {
                count += 1;
            }
        }
    }
    Ok(count)
}

/// Every non-empty foreign-key value of `data` must name an existing row.
pub(in crate::store) fn validate_row_references_tx(
    conn: &Connection,
    revision_id: &str,
    schema: &SchemaNode,
    data: &Value,
) -> Result<(), StoreError> {
    let mut tables: BTreeMap<String, Option<TableInfo>> = BTreeMap::new();
    for field in schema.foreign_keys() {
        for value in field.path.select(data) {
            let Some(row_id) = value.as_str().filter(|row_id| !row_id.is_empty()) else {
                continue;
            };
            let table = match tables.get(&field.table_id) {
                Some(table) => table.clone(),
                None => {
                    let table = find_table_tx(conn, revision_id, &field.table_id)?;
                    tables.insert(field.table_id.clone(), table.clone());
                    table
                }
            };
            let exists = match &table {
                Some(table) => find_row_tx(conn, &table.version_id, row_id)?.is_some(),
                None => false,
            };
            if !exists {
                return Err(StoreError::ForeignKeyNotFound {
                    path: field.path.to_string(),
                    table_id: field.table_id.clone(),
                    row_id: row_id.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Rewrites every reference to `target_table_id/old_row_id` into
/// `new_row_id`. Returns the number of rows rewritten.
pub(in crate::store) fn rewrite_row_references_tx(
    ctx: &mut WriteCtx<'_>,
    target_table_id: &str,
    old_row_id: &str,
    new_row_id: &str,
) -> Result<usize, StoreError> {
    let mut rewritten = 0;
    for reference in referencing_tables_tx(ctx.conn, ctx.revision_id(), target_table_id)? {
        let Some(table) = find_table_tx(ctx.conn, ctx.revision_id(), &reference.table_id)? else {
            continue;
        };
        let mut draft_table: Option<TableInfo> = None;
        for row in list_rows_tx(ctx.conn, &table.version_id)? {
            let mut data = row.data.clone();
            let mut changed = false;
            for field in &reference.fields {
                for value in field.path.select_mut(&mut data) {
                    if value.as_str() == Some(old_row_id) {
                        *value = Value::String(new_row_id.to_string());
                        changed = true;
                    }
                }
            }
            if !changed {
                continue;
            }

            let target = match &draft_table {
                Some(target) => target.clone(),
                None => {
                    let forked = get_or_create_draft_table_tx(ctx, &table)?;
                    draft_table = Some(forked.clone());
                    forked
                }
            };
            let draft_row = get_or_create_draft_row_tx(ctx, &target, &row)?;
            write_row_data_tx(ctx, &target, &draft_row, &data, &row.schema_hash)?;
            ctx.emit_row(RowEventKind::Updated, &target.id, &row.id, None);
            rewritten += 1;
        }
    }
    Ok(rewritten)
}

/// Points `foreignKey` annotations at a renamed table. Each referencing
/// table gets an `update` migration recorded after the rename. Returns the
/// rewritten table ids.
pub(in crate::store) fn rewrite_schema_references_tx(
    ctx: &mut WriteCtx<'_>,
    old_table_id: &str,
    new_table_id: &str,
) -> Result<Vec<String>, StoreError> {
    let mut updated = Vec::new();
    for reference in referencing_tables_tx(ctx.conn, ctx.revision_id(), old_table_id)? {
        let Some(table) = find_table_tx(ctx.conn, ctx.revision_id(), &reference.table_id)? else {
            continue;
        };
        let Some(entry) = super::read_table_schema_tx(ctx.conn, ctx.revision_id(), &table.id)?
        else {
            continue;
        };

        let patches = reference
            .fields
            .iter()
            .map(|field| JsonPatch::Replace {
                path: format!("{}/foreignKey", field.pointer),
                value: Value::String(new_table_id.to_string()),
            })
            .collect::<Vec<_>>();
        let next_schema = apply_json_patches(&entry.schema, &patches)?;
        let hash = apply_schema_change_tx(ctx, &table, &next_schema, &[])?;

        let id = next_migration_id_tx(ctx.conn, ctx.revision_id(), ctx.now_ms)?;
        record_migration_tx(
            ctx,
            &Migration::Update {
                id,
                table_id: table.id.clone(),
                hash,
                patches,
            },
        )?;
        updated.push(table.id);
    }
    Ok(updated)
}
