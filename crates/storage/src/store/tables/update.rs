#![forbid(unsafe_code)]

use super::super::*;
use super::migration_id_for;
use tg_core::{JsonPatch, Migration, MigrationError, apply_json_patches, hash_json};

impl SqliteStore {
    /// Applies JSON-Patch operations to a table's schema and migrates its
    /// rows to the result.
    pub fn update_table(&mut self, request: UpdateTableRequest) -> Result<TableInfo, StoreError> {
        self.write("update_table", &request.revision_id, WriteOrigin::User, |ctx| {
            update_table_tx(ctx, &request.table_id, &request.patches, None)
                .map(|(table, _)| table)
        })
    }
}

/// Replayed update migrations carry their id and the hash the patched
/// schema must reach.
pub(in crate::store) struct ReplayedUpdate<'a> {
    pub(in crate::store) id: &'a str,
    pub(in crate::store) hash: &'a str,
}

pub(in crate::store) fn update_table_tx(
    ctx: &mut WriteCtx<'_>,
    table_id: &str,
    patches: &[JsonPatch],
    replay: Option<ReplayedUpdate<'_>>,
) -> Result<(TableInfo, Migration), StoreError> {
    if patches.is_empty() {
        return Err(StoreError::InvalidInput("patches must not be empty"));
    }
    let table = require_table_tx(ctx.conn, ctx.revision_id(), table_id)?;
    if table.system {
        return Err(StoreError::SystemTableWrite(table.id));
    }

    let current = require_table_schema_tx(ctx.conn, ctx.revision_id(), &table.id)?;
    let next_schema = apply_json_patches(&current.schema, patches)?;
    let next_hash = hash_json(&next_schema);
    if let Some(replay) = &replay
        && replay.hash != next_hash
    {
        return Err(StoreError::InvalidMigration(MigrationError::InvalidShape(format!(
            "update '{}' of table '{}' produces hash {next_hash}, expected {}",
            replay.id, table.id, replay.hash
        ))));
    }

    let migration = Migration::Update {
        id: migration_id_for(ctx, replay.as_ref().map(|replay| replay.id))?,
        table_id: table.id.clone(),
        hash: next_hash,
        patches: patches.to_vec(),
    };
    record_migration_tx(ctx, &migration)?;
    apply_schema_change_tx(ctx, &table, &next_schema, &data_moves(patches))?;

    let table = require_table_tx(ctx.conn, ctx.revision_id(), &table.id)?;
    tracing::info!(
        table_id = %table.id,
        revision_id = %ctx.revision_id(),
        migration_id = migration.id(),
        patches = patches.len(),
        "table schema updated"
    );
    Ok((table, migration))
}
