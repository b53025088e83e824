#![forbid(unsafe_code)]

use super::super::*;
use super::migration_id_for;
use tg_core::Migration;
use tg_core::ids::{SCHEMA_TABLE_ID, VIEWS_TABLE_ID};

impl SqliteStore {
    /// Renames a table. References held by other schemas follow the new id.
    pub fn rename_table(&mut self, request: RenameTableRequest) -> Result<TableInfo, StoreError> {
        self.write("rename_table", &request.revision_id, WriteOrigin::User, |ctx| {
            rename_table_tx(ctx, &request.table_id, &request.next_table_id, None)
                .map(|(table, _)| table)
        })
    }
}

pub(in crate::store) fn rename_table_tx(
    ctx: &mut WriteCtx<'_>,
    table_id: &str,
    next_table_id: &str,
    migration_id: Option<&str>,
) -> Result<(TableInfo, Migration), StoreError> {
    let next_table_id = canonicalize_table_id(next_table_id)?;
    let table = require_table_tx(ctx.conn, ctx.revision_id(), table_id)?;
    if table.system {
        return Err(StoreError::SystemTableWrite(table.id));
    }
    if table.id == next_table_id {
        return Err(StoreError::InvalidInput("next_table_id must differ from table_id"));
    }
    if find_table_tx(ctx.conn, ctx.revision_id(), &next_table_id)?.is_some() {
        return Err(StoreError::TableAlreadyExists(next_table_id));
    }

    let migration = Migration::Rename {
        id: migration_id_for(ctx, migration_id)?,
        table_id: table.id.clone(),
        next_table_id: next_table_id.clone(),
    };
    record_migration_tx(ctx, &migration)?;

    let draft_table = get_or_create_draft_table_tx(ctx, &table)?;
    let renamed = rename_table_version_tx(ctx, &draft_table, &next_table_id)?;
    rename_system_entry_tx(ctx, SCHEMA_TABLE_ID, &table.id, &next_table_id)?;
    rename_system_entry_tx(ctx, VIEWS_TABLE_ID, &table.id, &next_table_id)?;
    // A replayed history carries its own `update` items for referencing tables.
    let rewritten = match migration_id {
        Some(_) => Vec::new(),
        None => rewrite_schema_references_tx(ctx, &table.id, &next_table_id)?,
    };
    revert_table_if_unchanged_tx(ctx, &renamed.created_id)?;
    ctx.mark_structural();

    let table = require_table_tx(ctx.conn, ctx.revision_id(), &next_table_id)?;
    tracing::info!(
        from = %migration.table_id(),
        to = %table.id,
        revision_id = %ctx.revision_id(),
        referencing_tables = rewritten.len(),
        "table renamed"
    );
    Ok((table, migration))
}
