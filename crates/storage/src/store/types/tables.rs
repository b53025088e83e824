#![forbid(unsafe_code)]

use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub version_id: String,
    pub id: String,
    pub created_id: String,
    pub readonly: bool,
    pub system: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TableSchema {
    pub table_id: String,
    pub schema: Value,
    pub hash: String,
}
