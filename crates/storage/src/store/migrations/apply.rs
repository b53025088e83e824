#![forbid(unsafe_code)]

use super::super::tables::{
    ReplayedUpdate, create_table_tx, remove_table_tx, rename_table_tx, update_table_tx,
};
use super::super::*;
use tg_core::{Migration, MigrationError, MigrationReport, MigrationStatus, hash_json};

impl SqliteStore {
    /// Replays migrations into a draft, one savepoint per item.
    ///
    /// A bad item is reported as `failed` and leaves no trace; the others
    /// still apply. Only backing-store failures abort the batch.
    pub fn apply_migrations(
        &mut self,
        request: ApplyMigrationsRequest,
    ) -> Result<Vec<MigrationReport>, StoreError> {
        self.write("apply_migrations", &request.revision_id, WriteOrigin::User, |ctx| {
            let mut reports = Vec::with_capacity(request.migrations.len());
            for migration in &request.migrations {
                let report = match ctx.savepoint(|ctx| apply_migration_tx(ctx, migration)) {
                    Ok(MigrationStatus::Skipped) => {
                        tracing::debug!(id = migration.id(), table_id = migration.table_id(), "migration skipped");
                        MigrationReport::skipped(migration.id())
                    }
                    Ok(_) => {
                        tracing::info!(
                            id = migration.id(),
                            table_id = migration.table_id(),
                            change_type = migration.change_type().as_str(),
                            "migration applied"
                        );
                        MigrationReport::applied(migration.id())
                    }
                    Err(err) if err.kind() == ErrorKind::Internal => return Err(err),
                    Err(err) => {
                        tracing::warn!(
                            id = migration.id(),
                            table_id = migration.table_id(),
                            code = err.code(),
                            error = %err,
                            "migration failed"
                        );
                        MigrationReport::failed(migration.id(), err.to_string())
                    }
                };
                reports.push(report);
            }
            Ok(reports)
        })
    }
}

fn apply_migration_tx(
    ctx: &mut WriteCtx<'_>,
    migration: &Migration,
) -> Result<MigrationStatus, StoreError> {
    migration.validate()?;
    if migration_recorded_tx(ctx.conn, ctx.revision_id(), migration)? {
        return Ok(MigrationStatus::Skipped);
    }

    if let Migration::Init {
        table_id,
        hash,
        schema,
        ..
    } = migration
    {
        if hash_json(schema) != *hash {
            return Err(MigrationError::InvalidShape(format!(
                "init hash of table '{table_id}' does not match its schema"
            ))
            .into());
        }
        if let Some(current) = read_table_schema_tx(ctx.conn, ctx.revision_id(), table_id)?
            && current.hash == *hash
        {
            return Ok(MigrationStatus::Skipped);
        }
    }

    check_migration_order_tx(ctx.conn, ctx.revision_id(), migration)?;
    match migration {
        Migration::Init {
            id,
            table_id,
            schema,
            ..
        } => {
            create_table_tx(ctx, table_id, schema, Some(id.as_str()))?;
        }
        Migration::Update {
            id,
            table_id,
            hash,
            patches,
        } => {
            update_table_tx(ctx, table_id, patches, Some(ReplayedUpdate { id, hash }))?;
        }
        Migration::Rename {
            id,
            table_id,
            next_table_id,
        } => {
            rename_table_tx(ctx, table_id, next_table_id, Some(id.as_str()))?;
        }
        Migration::Remove { id, table_id } => {
            remove_table_tx(ctx, table_id, Some(id.as_str()))?;
        }
    }
    Ok(MigrationStatus::Applied)
}
