#![forbid(unsafe_code)]

mod config;
mod diff;
mod error;
mod migrations;
mod observers;
mod requests;
mod revisions;
mod rows;
mod support;
mod system;
mod tables;
mod types;

pub use config::{JournalMode, StoreConfig, SyncMode};
pub use error::{ErrorKind, StoreError};
pub use observers::{MutationObserver, ObserverError};
pub use requests::*;
pub use types::*;

use rusqlite::{Connection, ErrorCode, OptionalExtension, Transaction};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use support::*;
use tg_core::{IdError, RowId, TableId};

const DEFAULT_BRANCH: &str = "master";

pub struct SqliteStore {
    conn: Connection,
    storage_dir: Option<PathBuf>,
    config: StoreConfig,
    observers: Vec<Box<dyn MutationObserver>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("storage_dir", &self.storage_dir)
            .field("config", &self.config)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_config(storage_dir, StoreConfig::default())
    }

    pub fn open_with_config(
        storage_dir: impl AsRef<Path>,
        config: StoreConfig,
    ) -> Result<Self, StoreError> {
        config.validate()?;
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(&config.db_file_name);
        let conn = Connection::open(&db_path)?;
        tracing::debug!(path = %db_path.display(), "opening store");
        Self::init(conn, Some(storage_dir), config)
    }

    /// A private in-memory database; nothing outlives the store.
    pub fn open_in_memory(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None, config)
    }

    fn init(
        conn: Connection,
        storage_dir: Option<PathBuf>,
        config: StoreConfig,
    ) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        conn.execute_batch(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA synchronous = {};",
            config.sync_mode.pragma_value(),
        ))?;
        // journal_mode answers with the resulting mode ("memory" for in-memory databases).
        let journal_mode = conn.query_row(
            &format!("PRAGMA journal_mode = {}", config.journal_mode.pragma_value()),
            [],
            |row| row.get::<_, String>(0),
        )?;
        tracing::debug!(journal_mode = %journal_mode, "sqlite pragmas applied");

        preflight_gate(&conn)?;
        install_schema(&conn, now_ms())?;

        Ok(Self {
            conn,
            storage_dir,
            config,
            observers: Vec::new(),
        })
    }

    /// `None` for in-memory stores.
    pub fn storage_dir(&self) -> Option<&Path> {
        self.storage_dir.as_deref()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn default_branch_name(&self) -> &'static str {
        DEFAULT_BRANCH
    }

    /// Registers an observer notified after every committed mutation.
    pub fn add_observer(&mut self, observer: Box<dyn MutationObserver>) {
        self.observers.push(observer);
    }

    /// Runs a draft-scoped command in one transaction and publishes its
    /// events after commit.
    fn write<T>(
        &mut self,
        command: &'static str,
        revision_id: &str,
        origin: WriteOrigin,
        body: impl FnOnce(&mut WriteCtx<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        match write_tx(&mut self.conn, revision_id, origin, body) {
            Ok((value, events)) => {
                self.dispatch(&events);
                Ok(value)
            }
            Err(err) => {
                log_command_failure(command, &err);
                Err(err)
            }
        }
    }

    /// Runs a command that is not scoped to a draft in one transaction.
    fn transact<T>(
        &mut self,
        command: &'static str,
        body: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        transact_tx(&mut self.conn, body).inspect_err(|err| log_command_failure(command, err))
    }

    fn dispatch(&self, events: &[MutationEvent]) {
        for observer in &self.observers {
            for event in events {
                let outcome = match event {
                    MutationEvent::Row(row) => observer.on_row(row),
                    MutationEvent::Endpoint(endpoint) => observer.on_endpoint(endpoint),
                };
                if let Err(err) = outcome {
                    tracing::warn!(observer = observer.name(), error = %err, "observer failed");
                }
            }
        }
    }
}

fn write_tx<T>(
    conn: &mut Connection,
    revision_id: &str,
    origin: WriteOrigin,
    body: impl FnOnce(&mut WriteCtx<'_>) -> Result<T, StoreError>,
) -> Result<(T, Vec<MutationEvent>), StoreError> {
    let tx = conn.transaction()?;
    let mut ctx = WriteCtx::open(&tx, revision_id, origin)?;
    let value = body(&mut ctx)?;
    let events = ctx.finish()?;
    tx.commit()?;
    Ok((value, events))
}

fn transact_tx<T>(
    conn: &mut Connection,
    body: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let tx = conn.transaction()?;
    let value = body(&tx)?;
    tx.commit()?;
    Ok(value)
}

fn log_command_failure(command: &'static str, err: &StoreError) {
    if err.kind() == ErrorKind::Internal {
        tracing::error!(command, code = err.code(), error = %err, "command failed");
    } else {
        tracing::debug!(command, code = err.code(), error = %err, "command rejected");
    }
}

fn preflight_gate(conn: &Connection) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let mut rows = stmt.query([])?;
    let mut tables = BTreeSet::new();
    while let Some(row) = rows.next()? {
        tables.insert(row.get::<_, String>(0)?);
    }

    if tables.is_empty() {
        return Ok(());
    }

    if tables
        .iter()
        .any(|table| !REQUIRED_TABLES.contains(&table.as_str()))
    {
        return Err(StoreError::InvalidInput(
            "RESET_REQUIRED: unsupported tables detected",
        ));
    }

    for table in REQUIRED_TABLES {
        if !tables.contains(table) {
            return Err(StoreError::InvalidInput(
                "RESET_REQUIRED: required table is missing",
            ));
        }
    }

    let version = conn
        .query_row(
            "SELECT schema_version FROM store_state WHERE singleton=1",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;

    match version {
        Some(v) if v == STORE_SCHEMA_VERSION => Ok(()),
        Some(_) => Err(StoreError::InvalidInput(
            "RESET_REQUIRED: schema version mismatch",
        )),
        None => Err(StoreError::InvalidInput(
            "RESET_REQUIRED: schema state row is missing",
        )),
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                || message.as_deref().is_some_and(|value| {
                    value.contains("UNIQUE constraint failed")
                        || value.contains("PRIMARY KEY constraint failed")
                })
        }
        _ => false,
    }
}

fn map_insert_conflict(err: rusqlite::Error, conflict: impl FnOnce() -> StoreError) -> StoreError {
    if is_constraint_violation(&err) {
        return conflict();
    }
    StoreError::Sql(err)
}

fn to_sqlite_i64(value: usize) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidInput("numeric overflow"))
}

fn invalid_identifier(kind: &'static str, value: &str, source: IdError) -> StoreError {
    StoreError::InvalidIdentifier {
        kind,
        value: value.to_string(),
        source,
    }
}

fn canonicalize_table_id(value: &str) -> Result<String, StoreError> {
    TableId::try_new(value)
        .map(TableId::into_string)
        .map_err(|source| invalid_identifier("table id", value, source))
}

fn canonicalize_row_id(value: &str) -> Result<String, StoreError> {
    RowId::try_new(value)
        .map(RowId::into_string)
        .map_err(|source| invalid_identifier("row id", value, source))
}

fn require_non_empty(value: &str, message: &'static str) -> Result<String, StoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidInput(message));
    }
    Ok(trimmed.to_string())
}
