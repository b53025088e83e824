#![forbid(unsafe_code)]

use super::super::*;
use super::{unique_row_ids, validate_row_data, writable_table_tx, write_row_updates_tx};

impl SqliteStore {
    /// Replaces a row's document.
    pub fn update_row(&mut self, request: UpdateRowRequest) -> Result<RowUpdate, StoreError> {
        let UpdateRowRequest {
            revision_id,
            table_id,
            row_id,
            data,
            origin,
        } = request;
        let rows = vec![RowData { row_id, data }];
        let mut updated = self.write("update_row", &revision_id, origin, |ctx| {
            update_rows_tx(ctx, &table_id, rows)
        })?;
        updated
            .pop()
            .ok_or_else(|| StoreError::Corrupt("row update returned nothing".to_string()))
    }

    pub fn update_rows(&mut self, request: UpdateRowsRequest) -> Result<Vec<RowUpdate>, StoreError> {
        let UpdateRowsRequest {
            revision_id,
            table_id,
            rows,
            origin,
        } = request;
        self.write("update_rows", &revision_id, origin, |ctx| {
            update_rows_tx(ctx, &table_id, rows)
        })
    }
}

fn update_rows_tx(
    ctx: &mut WriteCtx<'_>,
    table_id: &str,
    rows: Vec<RowData>,
) -> Result<Vec<RowUpdate>, StoreError> {
    if rows.is_empty() {
        return Err(StoreError::InvalidInput("rows must not be empty"));
    }
    let target = writable_table_tx(ctx, table_id)?;
    let row_ids = unique_row_ids(&target.table.id, rows.iter().map(|row| row.row_id.as_str()))?;

    let mut updates = Vec::with_capacity(rows.len());
    for (row, row_id) in rows.into_iter().zip(row_ids) {
        validate_row_data(&target.table.id, &row_id, &target.schema.node, &row.data)?;
        require_row_tx(ctx.conn, &target.table, &row_id)?;
        updates.push((row_id, row.data));
    }
    write_row_updates_tx(ctx, &target, updates)
}
