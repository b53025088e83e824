#![forbid(unsafe_code)]

use super::super::*;
use super::{unique_row_ids, writable_table_tx, write_row_updates_tx};
use tg_core::create_value_store;

impl SqliteStore {
    /// Applies path-addressed patches to rows. Every patched document is
    /// validated against the table schema before anything is written.
    pub fn patch_rows(&mut self, request: PatchRowsRequest) -> Result<Vec<RowUpdate>, StoreError> {
        self.write("patch_rows", &request.revision_id, request.origin, |ctx| {
            patch_rows_tx(ctx, &request.table_id, &request.rows)
        })
    }
}

fn patch_rows_tx(
    ctx: &mut WriteCtx<'_>,
    table_id: &str,
    rows: &[RowPatches],
) -> Result<Vec<RowUpdate>, StoreError> {
    if rows.is_empty() {
        return Err(StoreError::InvalidInput("rows must not be empty"));
    }
    let target = writable_table_tx(ctx, table_id)?;
    let table_id = target.table.id.as_str();
    let row_ids = unique_row_ids(table_id, rows.iter().map(|row| row.row_id.as_str()))?;

    let mut updates = Vec::with_capacity(rows.len());
    for (row, row_id) in rows.iter().zip(row_ids) {
        let current = require_row_tx(ctx.conn, &target.table, &row_id)?;
        let as_store_error = |err| StoreError::from_patch(table_id, Some(row_id.as_str()), err);

        let mut store =
            create_value_store(&target.schema.node, &current.data).map_err(as_store_error)?;
        store.apply_patches(&row.patches).map_err(as_store_error)?;
        let data = store.into_validated_value().map_err(as_store_error)?;
        updates.push((row_id, data));
    }
    write_row_updates_tx(ctx, &target, updates)
}
