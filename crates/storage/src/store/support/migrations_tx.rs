#![forbid(unsafe_code)]

use super::super::StoreError;
use super::{WriteCtx, list_system_entries_tx, put_system_entry_tx};
use rusqlite::Connection;
use tg_core::Migration;
use tg_core::ids::MIGRATION_TABLE_ID;
use tg_core::time::ts_ms_to_rfc3339;

/// Width of the zero-padded sequence keying `__migration` rows, so that
/// row ids sort in recording order.
const MIGRATION_SEQ_WIDTH: usize = 12;

fn migration_seq(row_id: &str) -> Option<u64> {
    row_id.parse().ok()
}

/// Every recorded migration of a revision, in recording order.
pub(in crate::store) fn recorded_migrations_tx(
    conn: &Connection,
    revision_id: &str,
) -> Result<Vec<Migration>, StoreError> {
    let mut rows = list_system_entries_tx(conn, revision_id, MIGRATION_TABLE_ID)?;
    rows.sort_by(|a, b| a.id.cmp(&b.id));
    let mut out = rows
        .into_iter()
        .map(|row| {
            serde_json::from_value::<Migration>(row.data).map_err(|err| {
                StoreError::Corrupt(format!("migration row '{}' is malformed: {err}", row.id))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    out.sort_by_key(|migration| migration.timestamp_ms().unwrap_or(i64::MAX));
    Ok(out)
}

/// Latest recorded migration touching `table_id`, renames into it included.
pub(in crate::store) fn last_migration_tx(
    conn: &Connection,
    revision_id: &str,
    table_id: &str,
) -> Result<Option<(String, i64)>, StoreError> {
    let mut last: Option<(String, i64)> = None;
    for migration in recorded_migrations_tx(conn, revision_id)? {
        if !migration.touches(table_id) {
            continue;
        }
        let ts = migration.timestamp_ms()?;
        if last.as_ref().is_none_or(|(_, last_ts)| ts > *last_ts) {
            last = Some((migration.id().to_string(), ts));
        }
    }
    Ok(last)
}

fn migration_tables(migration: &Migration) -> Vec<&str> {
    match migration {
        Migration::Rename {
            table_id,
            next_table_id,
            ..
        } => vec![table_id.as_str(), next_table_id.as_str()],
        other => vec![other.table_id()],
    }
}

/// Fails with `InvalidMigrationOrder` unless `migration` is strictly after
/// the last migration of every table it touches.
pub(in crate::store) fn check_migration_order_tx(
    conn: &Connection,
    revision_id: &str,
    migration: &Migration,
) -> Result<(), StoreError> {
    let ts = migration.validate()?;
    for table_id in migration_tables(migration) {
        if let Some((last_id, last_ts)) = last_migration_tx(conn, revision_id, table_id)?
            && ts <= last_ts
        {
            return Err(StoreError::InvalidMigrationOrder {
                table_id: table_id.to_string(),
                id: migration.id().to_string(),
                last_id,
            });
        }
    }
    Ok(())
}

/// `max(now, last + 1ms)` over every migration of the revision, as an
/// RFC 3339 id. Generated ids never tie, so the date-sorted history keeps
/// cross-table causality (a rename lands after the inits it depends on and
/// before the updates it triggers).
pub(in crate::store) fn next_migration_id_tx(
    conn: &Connection,
    revision_id: &str,
    now_ms: i64,
) -> Result<String, StoreError> {
    let mut ts = now_ms;
    for migration in recorded_migrations_tx(conn, revision_id)? {
        ts = ts.max(migration.timestamp_ms()? + 1);
    }
    Ok(ts_ms_to_rfc3339(ts))
}

/// Exact replay check on `(id, tableId, changeType)`.
pub(in crate::store) fn migration_recorded_tx(
    conn: &Connection,
    revision_id: &str,
    migration: &Migration,
) -> Result<bool, StoreError> {
    Ok(recorded_migrations_tx(conn, revision_id)?.iter().any(|recorded| {
        recorded.id() == migration.id()
            && recorded.table_id() == migration.table_id()
            && recorded.change_type() == migration.change_type()
    }))
}

pub(in crate::store) fn record_migration_tx(
    ctx: &mut WriteCtx<'_>,
    migration: &Migration,
) -> Result<(), StoreError> {
    check_migration_order_tx(ctx.conn, ctx.revision_id(), migration)?;
    let data = serde_json::to_value(migration)?;
    let seq = list_system_entries_tx(ctx.conn, ctx.revision_id(), MIGRATION_TABLE_ID)?
        .iter()
        .filter_map(|row| migration_seq(&row.id))
        .max()
        .map_or(1, |last| last + 1);
    let row_id = format!("{seq:0width$}", width = MIGRATION_SEQ_WIDTH);
    put_system_entry_tx(ctx, MIGRATION_TABLE_ID, &row_id, &data)?;
    tracing::debug!(
        seq,
        id = migration.id(),
        table_id = migration.table_id(),
        change_type = migration.change_type().as_str(),
        "migration recorded"
    );
    Ok(())
}
