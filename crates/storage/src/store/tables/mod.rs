#![forbid(unsafe_code)]

mod create;
mod query;
mod remove;
mod rename;
mod update;

pub(super) use create::create_table_tx;
pub(super) use remove::remove_table_tx;
pub(super) use rename::rename_table_tx;
pub(super) use update::{ReplayedUpdate, update_table_tx};

use super::{StoreError, WriteCtx, next_migration_id_tx};

/// The supplied id when replaying a migration, a fresh one otherwise.
fn migration_id_for(ctx: &WriteCtx<'_>, supplied: Option<&str>) -> Result<String, StoreError> {
    match supplied {
        Some(id) => Ok(id.to_string()),
        None => next_migration_id_tx(ctx.conn, ctx.revision_id(), ctx.now_ms),
    }
}
