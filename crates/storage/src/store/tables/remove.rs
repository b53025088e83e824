#![forbid(unsafe_code)]

use super::super::*;
use super::migration_id_for;
use tg_core::Migration;
use tg_core::ids::{SCHEMA_TABLE_ID, VIEWS_TABLE_ID};

impl SqliteStore {
    /// Removes a table from a draft. Fails while other tables reference it.
    pub fn remove_table(&mut self, request: RemoveTableRequest) -> Result<(), StoreError> {
        self.write("remove_table", &request.revision_id, WriteOrigin::User, |ctx| {
            remove_table_tx(ctx, &request.table_id, None).map(|_| ())
        })
    }
}

pub(in crate::store) fn remove_table_tx(
    ctx: &mut WriteCtx<'_>,
    table_id: &str,
    migration_id: Option<&str>,
) -> Result<Migration, StoreError> {
    let table = require_table_tx(ctx.conn, ctx.revision_id(), table_id)?;
    if table.system {
        return Err(StoreError::SystemTableWrite(table.id));
    }

    let by = referencing_tables_tx(ctx.conn, ctx.revision_id(), &table.id)?
        .into_iter()
        .map(|reference| reference.table_id)
        .filter(|id| *id != table.id)
        .collect::<Vec<_>>();
    if !by.is_empty() {
        return Err(StoreError::TableIsReferenced {
            table_id: table.id,
            by,
        });
    }

    let migration = Migration::Remove {
        id: migration_id_for(ctx, migration_id)?,
        table_id: table.id.clone(),
    };
    record_migration_tx(ctx, &migration)?;

    drop_table_from_draft_tx(ctx, &table)?;
    remove_system_entry_tx(ctx, SCHEMA_TABLE_ID, &table.id)?;
    remove_system_entry_tx(ctx, VIEWS_TABLE_ID, &table.id)?;
    ctx.mark_structural();

    tracing::info!(
        table_id = %table.id,
        revision_id = %ctx.revision_id(),
        migration_id = migration.id(),
        "table removed"
    );
    Ok(migration)
}
