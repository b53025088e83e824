#![forbid(unsafe_code)]

use super::super::*;
use tg_core::{Migration, hash_json};

impl SqliteStore {
    /// Records an `init` migration carrying a table's current schema.
    pub fn create_init_migration(
        &mut self,
        request: CreateInitMigrationRequest,
    ) -> Result<Migration, StoreError> {
        self.write("create_init_migration", &request.revision_id, WriteOrigin::User, |ctx| {
            let table = require_user_table_tx(ctx, &request.table_id)?;
            let schema = require_table_schema_tx(ctx.conn, ctx.revision_id(), &table.id)?;
            let migration = Migration::Init {
                id: next_migration_id_tx(ctx.conn, ctx.revision_id(), ctx.now_ms)?,
                table_id: table.id,
                hash: hash_json(&schema.schema),
                schema: schema.schema,
            };
            record_migration_tx(ctx, &migration)?;
            Ok(migration)
        })
    }

    /// Records an `update` migration for patches already applied to the
    /// table's schema in this draft.
    pub fn create_update_migration(
        &mut self,
        request: CreateUpdateMigrationRequest,
    ) -> Result<Migration, StoreError> {
        if request.patches.is_empty() {
            return Err(StoreError::InvalidInput("patches must not be empty"));
        }
        self.write("create_update_migration", &request.revision_id, WriteOrigin::User, |ctx| {
            let table = require_user_table_tx(ctx, &request.table_id)?;
            let schema = require_table_schema_tx(ctx.conn, ctx.revision_id(), &table.id)?;
            let migration = Migration::Update {
                id: next_migration_id_tx(ctx.conn, ctx.revision_id(), ctx.now_ms)?,
                table_id: table.id,
                hash: schema.hash,
                patches: request.patches.clone(),
            };
            record_migration_tx(ctx, &migration)?;
            Ok(migration)
        })
    }

    /// Records a `rename` migration; `next_table_id` must already exist in
    /// the draft.
    pub fn create_rename_migration(
        &mut self,
        request: CreateRenameMigrationRequest,
    ) -> Result<Migration, StoreError> {
        self.write("create_rename_migration", &request.revision_id, WriteOrigin::User, |ctx| {
            let table_id = canonicalize_table_id(&request.table_id)?;
            let next = require_user_table_tx(ctx, &request.next_table_id)?;
            let migration = Migration::Rename {
                id: next_migration_id_tx(ctx.conn, ctx.revision_id(), ctx.now_ms)?,
                table_id,
                next_table_id: next.id,
            };
            record_migration_tx(ctx, &migration)?;
            Ok(migration)
        })
    }

    /// Records a `remove` migration for a table no longer in the draft.
    pub fn create_remove_migration(
        &mut self,
        request: CreateRemoveMigrationRequest,
    ) -> Result<Migration, StoreError> {
        self.write("create_remove_migration", &request.revision_id, WriteOrigin::User, |ctx| {
            let table_id = canonicalize_table_id(&request.table_id)?;
            if find_table_tx(ctx.conn, ctx.revision_id(), &table_id)?.is_some() {
                return Err(StoreError::InvalidInput(
                    "a remove migration needs the table to be gone from the draft",
                ));
            }
            let migration = Migration::Remove {
                id: next_migration_id_tx(ctx.conn, ctx.revision_id(), ctx.now_ms)?,
                table_id,
            };
            record_migration_tx(ctx, &migration)?;
            Ok(migration)
        })
    }
}

fn require_user_table_tx(ctx: &WriteCtx<'_>, table_id: &str) -> Result<TableInfo, StoreError> {
    let table = require_table_tx(ctx.conn, ctx.revision_id(), table_id)?;
    if table.system {
        return Err(StoreError::SystemTableWrite(table.id));
    }
    Ok(table)
}
