#![forbid(unsafe_code)]

use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RowRecord {
    pub version_id: String,
    pub id: String,
    pub created_id: String,
    pub readonly: bool,
    pub data: Value,
    pub hash: String,
    pub schema_hash: String,
    pub meta: Option<Value>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub published_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RowsPage {
    pub rows: Vec<RowRecord>,
    pub total_count: usize,
    /// Offset of the next page, present when `has_more`.
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Result of one row of an update batch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RowUpdate {
    pub row: RowRecord,
    pub previous_version_id: String,
    /// `false` when the data was identical and nothing was written.
    pub changed: bool,
}
