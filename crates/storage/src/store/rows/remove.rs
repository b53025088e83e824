#![forbid(unsafe_code)]

use super::super::*;
use std::collections::BTreeSet;

impl SqliteStore {
    /// Deletes a row. Fails without any change while other rows reference it.
    pub fn remove_row(&mut self, request: RemoveRowRequest) -> Result<(), StoreError> {
        let RemoveRowRequest {
            revision_id,
            table_id,
            row_id,
        } = request;
        self.write("remove_row", &revision_id, WriteOrigin::User, |ctx| {
            remove_rows_tx(ctx, &table_id, &[row_id])
        })
    }

    pub fn remove_rows(&mut self, request: RemoveRowsRequest) -> Result<(), StoreError> {
        self.write("remove_rows", &request.revision_id, WriteOrigin::User, |ctx| {
            remove_rows_tx(ctx, &request.table_id, &request.row_ids)
        })
    }
}

fn remove_rows_tx(
    ctx: &mut WriteCtx<'_>,
    table_id: &str,
    row_ids: &[String],
) -> Result<(), StoreError> {
    if row_ids.is_empty() {
        return Err(StoreError::InvalidInput("row_ids must not be empty"));
    }
    let table = require_table_tx(ctx.conn, ctx.revision_id(), table_id)?;
    ensure_table_writable(ctx, &table)?;

    let mut seen = BTreeSet::new();
    let mut rows = Vec::new();
    for row_id in row_ids {
        if !seen.insert(row_id.as_str()) {
            continue;
        }
        let row = require_row_tx(ctx.conn, &table, row_id)?;
        let references = count_row_references_tx(ctx.conn, ctx.revision_id(), &table.id, &row.id)?;
        if references > 0 {
            return Err(StoreError::RowIsReferenced {
                table_id: table.id,
                row_id: row.id,
                references,
            });
        }
        rows.push(row);
    }

    let draft_table = get_or_create_draft_table_tx(ctx, &table)?;
    for row in &rows {
        let row = require_row_tx(ctx.conn, &draft_table, &row.id)?;
        delete_row_tx(ctx, &draft_table, &row)?;
        ctx.emit_row(RowEventKind::Deleted, &draft_table.id, &row.id, None);
    }
    let reverted = revert_table_if_unchanged_tx(ctx, &table.created_id)?;

    tracing::debug!(table_id = %table.id, rows = rows.len(), reverted, "rows removed");
    Ok(())
}
