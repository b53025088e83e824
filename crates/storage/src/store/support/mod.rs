#![forbid(unsafe_code)]

mod changelog;
mod context;
mod diff_tx;
mod foreign_keys_tx;
mod json;
mod migrations_tx;
mod revisions_tx;
mod rows_tx;
mod schema_change_tx;
mod schema;
mod system_tx;
mod tables_tx;

pub(super) use changelog::*;
pub(super) use context::*;
pub(super) use diff_tx::*;
pub(super) use foreign_keys_tx::*;
pub(super) use json::*;
pub(super) use migrations_tx::*;
pub(super) use revisions_tx::*;
pub(super) use rows_tx::*;
pub(super) use schema_change_tx::*;
pub(super) use schema::{REQUIRED_TABLES, STORE_SCHEMA_VERSION, install_schema};
pub(super) use system_tx::*;
pub(super) use tables_tx::*;
pub(super) use tg_core::time::now_ms;
