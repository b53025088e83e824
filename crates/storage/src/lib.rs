#![forbid(unsafe_code)]

//! SQLite-backed versioned document engine: projects, branches and
//! revisions over copy-on-write tables and rows.

mod store;

pub use store::*;
pub use tg_core::{
    ChangeType, JsonPatch, Migration, MigrationReport, MigrationStatus, RowPatch, ValidationIssue,
};
