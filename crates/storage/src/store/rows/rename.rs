#![forbid(unsafe_code)]

use super::super::*;

impl SqliteStore {
    /// Renames a row; foreign-key values pointing at the old id follow.
    pub fn rename_row(&mut self, request: RenameRowRequest) -> Result<RowRecord, StoreError> {
        self.write("rename_row", &request.revision_id, WriteOrigin::User, |ctx| {
            rename_row_tx(ctx, &request.table_id, &request.row_id, &request.next_row_id)
        })
    }
}

fn rename_row_tx(
    ctx: &mut WriteCtx<'_>,
    table_id: &str,
    row_id: &str,
    next_row_id: &str,
) -> Result<RowRecord, StoreError> {
    let next_row_id = canonicalize_row_id(next_row_id)?;
    let table = require_table_tx(ctx.conn, ctx.revision_id(), table_id)?;
    ensure_table_writable(ctx, &table)?;
    let row = require_row_tx(ctx.conn, &table, row_id)?;
    if row.id == next_row_id {
        return Err(StoreError::InvalidInput("next_row_id must differ from row_id"));
    }
    if find_row_tx(ctx.conn, &table.version_id, &next_row_id)?.is_some() {
        return Err(StoreError::RowAlreadyExists {
            table_id: table.id,
            row_id: next_row_id,
        });
    }

    let draft_table = get_or_create_draft_table_tx(ctx, &table)?;
    let draft_row = get_or_create_draft_row_tx(ctx, &draft_table, &row)?;
    rename_row_version_tx(ctx, &draft_table, &draft_row, &next_row_id)?;
    ctx.emit_row(RowEventKind::Renamed, &table.id, &next_row_id, Some(&row.id));

    let rewritten = rewrite_row_references_tx(ctx, &table.id, &row.id, &next_row_id)?;
    revert_table_if_unchanged_tx(ctx, &table.created_id)?;

    tracing::debug!(
        table_id = %table.id,
        from = %row.id,
        to = %next_row_id,
        references = rewritten,
        "row renamed"
    );
    let table = require_table_tx(ctx.conn, ctx.revision_id(), &table.id)?;
    require_row_tx(ctx.conn, &table, &next_row_id)
}
