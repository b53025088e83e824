#![forbid(unsafe_code)]

use super::super::{RowEventKind, StoreError, TableInfo};
use super::{
    WriteCtx, compile_schema_tx, get_or_create_draft_row_tx, get_or_create_draft_table_tx,
    list_rows_tx, put_system_entry_tx, validate_row_references_tx, write_row_data_tx,
};
use serde_json::Value;
use tg_core::ids::SCHEMA_TABLE_ID;
use tg_core::schema::pointer_to_data_path;
use tg_core::{DataPath, JsonPatch, PathSegment, SchemaNode, hash_json};

/// Data paths moved by the `move` operations of a schema patch list.
pub(in crate::store) fn data_moves(patches: &[JsonPatch]) -> Vec<(DataPath, DataPath)> {
    patches
        .iter()
        .filter_map(|patch| match patch {
            JsonPatch::Move { from, path } => {
                let from = pointer_to_data_path(from)?;
                let to = pointer_to_data_path(path)?;
                (!from.has_wildcard() && !to.has_wildcard()).then_some((from, to))
            }
            _ => None,
        })
        .collect()
}

/// Moves the value at `from` to `to` inside a row document. Missing sources
/// and non-object parents leave the document unchanged.
fn move_value(data: &mut Value, from: &DataPath, to: &DataPath) {
    let Some((from_parent, PathSegment::Key(from_key))) = from.parent() else {
        return;
    };
    let Some((to_parent, PathSegment::Key(to_key))) = to.parent() else {
        return;
    };

    let taken = from_parent
        .select_mut(data)
        .into_iter()
        .next()
        .and_then(|parent| parent.as_object_mut())
        .and_then(|object| object.remove(from_key.as_str()));
    let Some(taken) = taken else {
        return;
    };

    if let Some(object) = to_parent
        .select_mut(data)
        .into_iter()
        .next()
        .and_then(|parent| parent.as_object_mut())
    {
        object.insert(to_key.clone(), taken);
    }
}

/// Installs `next_schema` for a user table: every row is migrated (moves,
/// then conform) and re-stamped with the new schema hash, and the schema
/// entry is rewritten. Returns the new schema hash.
pub(in crate::store) fn apply_schema_change_tx(
    ctx: &mut WriteCtx<'_>,
    table: &TableInfo,
    next_schema: &Value,
    moves: &[(DataPath, DataPath)],
) -> Result<String, StoreError> {
    let node = compile_schema_tx(ctx.conn, ctx.revision_id(), next_schema)?;
    let next_hash = hash_json(next_schema);
    ensure_foreign_key_targets_tx(ctx, &table.id, &node)?;

    let draft_table = get_or_create_draft_table_tx(ctx, table)?;
    for row in list_rows_tx(ctx.conn, &draft_table.version_id)? {
        let mut data = row.data.clone();
        for (from, to) in moves {
            move_value(&mut data, from, to);
        }
        let data = node.conform(&data);
        validate_row_references_tx(ctx.conn, ctx.revision_id(), &node, &data)?;

        if hash_json(&data) == row.hash && row.schema_hash == next_hash {
            continue;
        }
        let draft_row = get_or_create_draft_row_tx(ctx, &draft_table, &row)?;
        write_row_data_tx(ctx, &draft_table, &draft_row, &data, &next_hash)?;
        ctx.emit_row(RowEventKind::Updated, &draft_table.id, &row.id, None);
    }

    put_system_entry_tx(ctx, SCHEMA_TABLE_ID, &table.id, next_schema)?;
    ctx.mark_structural();
    Ok(next_hash)
}

/// Every `foreignKey` of `node` must name an existing table (or the table
/// itself).
pub(in crate::store) fn ensure_foreign_key_targets_tx(
    ctx: &WriteCtx<'_>,
    table_id: &str,
    node: &SchemaNode,
) -> Result<(), StoreError> {
    for field in node.foreign_keys() {
        if field.table_id == table_id {
            continue;
        }
        if super::find_table_tx(ctx.conn, ctx.revision_id(), &field.table_id)?.is_none() {
            return Err(StoreError::not_found("table", field.table_id));
        }
    }
    Ok(())
}
