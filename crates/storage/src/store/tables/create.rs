#![forbid(unsafe_code)]

use super::super::*;
use super::migration_id_for;
use serde_json::Value;
use tg_core::ids::SCHEMA_TABLE_ID;
use tg_core::{Migration, hash_json};

impl SqliteStore {
    /// Creates a user table in a draft and records its `init` migration.
    pub fn create_table(&mut self, request: CreateTableRequest) -> Result<TableInfo, StoreError> {
        self.write("create_table", &request.revision_id, WriteOrigin::User, |ctx| {
            create_table_tx(ctx, &request.table_id, &request.schema, None).map(|(table, _)| table)
        })
    }
}

pub(in crate::store) fn create_table_tx(
    ctx: &mut WriteCtx<'_>,
    table_id: &str,
    schema: &Value,
    migration_id: Option<&str>,
) -> Result<(TableInfo, Migration), StoreError> {
    let table_id = canonicalize_table_id(table_id)?;
    if find_table_tx(ctx.conn, ctx.revision_id(), &table_id)?.is_some() {
        return Err(StoreError::TableAlreadyExists(table_id));
    }

    let node = compile_schema_tx(ctx.conn, ctx.revision_id(), schema)?;
    ensure_foreign_key_targets_tx(ctx, &table_id, &node)?;

    let migration = Migration::Init {
        id: migration_id_for(ctx, migration_id)?,
        table_id: table_id.clone(),
        hash: hash_json(schema),
        schema: schema.clone(),
    };
    record_migration_tx(ctx, &migration)?;

    let table = insert_table_tx(ctx, &table_id, false)?;
    put_system_entry_tx(ctx, SCHEMA_TABLE_ID, &table_id, schema)?;
    ctx.mark_structural();

    tracing::info!(
        table_id = %table.id,
        revision_id = %ctx.revision_id(),
        migration_id = migration.id(),
        "table created"
    );
    Ok((table, migration))
}
