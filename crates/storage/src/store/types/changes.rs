#![forbid(unsafe_code)]

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableChangeKind {
    Added,
    Removed,
    Renamed,
    Modified,
}

/// One logical table (by `created_id`) that differs between two revisions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableChange {
    pub created_id: String,
    pub table_id: String,
    pub previous_table_id: Option<String>,
    pub kind: TableChangeKind,
    /// Rows present in only one side or with differing versions.
    pub rows_changed: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RevisionChanges {
    pub from_revision_id: String,
    pub to_revision_id: String,
    pub tables: Vec<TableChange>,
}

impl RevisionChanges {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
