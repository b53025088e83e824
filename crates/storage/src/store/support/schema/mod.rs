#![forbid(unsafe_code)]

mod sql;

use super::super::StoreError;
use rusqlite::{Connection, params};

pub(in crate::store) const STORE_SCHEMA_VERSION: i64 = 1;

pub(in crate::store) const REQUIRED_TABLES: [&str; 10] = [
    "store_state",
    "organizations",
    "projects",
    "branches",
    "revisions",
    "tables",
    "revision_tables",
    "rows",
    "table_rows",
    "changelog",
];

pub(in crate::store) fn install_schema(conn: &Connection, now_ms: i64) -> Result<(), StoreError> {
    conn.execute_batch(&sql::full_schema_sql())?;

    conn.execute(
        "INSERT OR IGNORE INTO store_state(singleton, schema_version, created_at_ms, updated_at_ms) \
         VALUES (1, ?1, ?2, ?2)",
        params![STORE_SCHEMA_VERSION, now_ms],
    )?;

    Ok(())
}
