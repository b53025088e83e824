#![forbid(unsafe_code)]

use super::super::*;
use super::{unique_row_ids, validate_row_data, writable_table_tx};

impl SqliteStore {
    pub fn create_row(&mut self, request: CreateRowRequest) -> Result<RowRecord, StoreError> {
        let CreateRowRequest {
            revision_id,
            table_id,
            row_id,
            data,
            meta,
            origin,
        } = request;
        let rows = vec![NewRow { row_id, data, meta }];
        let mut created = self.write("create_row", &revision_id, origin, |ctx| {
            create_rows_tx(ctx, &table_id, &rows)
        })?;
        created
            .pop()
            .ok_or_else(|| StoreError::Corrupt("row insert returned nothing".to_string()))
    }

    /// Inserts a batch of rows. Any invalid row fails the whole batch.
    pub fn create_rows(&mut self, request: CreateRowsRequest) -> Result<Vec<RowRecord>, StoreError> {
        self.write("create_rows", &request.revision_id, request.origin, |ctx| {
            create_rows_tx(ctx, &request.table_id, &request.rows)
        })
    }
}

fn create_rows_tx(
    ctx: &mut WriteCtx<'_>,
    table_id: &str,
    rows: &[NewRow],
) -> Result<Vec<RowRecord>, StoreError> {
    if rows.is_empty() {
        return Err(StoreError::InvalidInput("rows must not be empty"));
    }
    let target = writable_table_tx(ctx, table_id)?;
    let table_id = target.table.id.as_str();

    let row_ids = unique_row_ids(table_id, rows.iter().map(|row| row.row_id.as_str()))?;
    for (row, row_id) in rows.iter().zip(&row_ids) {
        validate_row_data(table_id, row_id, &target.schema.node, &row.data)?;
        if find_row_tx(ctx.conn, &target.table.version_id, row_id)?.is_some() {
            return Err(StoreError::DuplicateRow {
                table_id: table_id.to_string(),
                row_id: row_id.clone(),
            });
        }
    }

    let table = get_or_create_draft_table_tx(ctx, &target.table)?;
    let mut created = Vec::with_capacity(rows.len());
    for (row, row_id) in rows.iter().zip(&row_ids) {
        created.push(insert_row_tx(
            ctx,
            &table,
            NewRowVersion {
                row_id,
                data: &row.data,
                schema_hash: &target.schema.hash,
                meta: row.meta.as_ref(),
            },
        )?);
    }

    // References may point at rows of the same batch.
    for row in &created {
        validate_row_references_tx(ctx.conn, ctx.revision_id(), &target.schema.node, &row.data)?;
    }
    for row in &created {
        ctx.emit_row(RowEventKind::Created, &table.id, &row.id, None);
    }
    tracing::debug!(table_id = %table.id, rows = created.len(), "rows created");
    Ok(created)
}
