#![forbid(unsafe_code)]

use crate::json_patch::JsonPatch;
use crate::time::rfc3339_to_ts_ms;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A recorded structural change of one table.
///
/// Serialized with a `changeType` tag; this is also the data format of rows
/// in the `Migration` system table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "changeType", rename_all = "lowercase")]
pub enum Migration {
    #[serde(rename_all = "camelCase")]
    Init {
        id: String,
        table_id: String,
        hash: String,
        schema: Value,
    },
    #[serde(rename_all = "camelCase")]
    Update {
        id: String,
        table_id: String,
        hash: String,
        patches: Vec<JsonPatch>,
    },
    #[serde(rename_all = "camelCase")]
    Rename {
        id: String,
        table_id: String,
        next_table_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Remove { id: String, table_id: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Init,
    Update,
    Rename,
    Remove,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Update => "update",
            Self::Rename => "rename",
            Self::Remove => "remove",
        }
    }
}

impl Migration {
    pub fn id(&self) -> &str {
        match self {
            Self::Init { id, .. }
            | Self::Update { id, .. }
            | Self::Rename { id, .. }
            | Self::Remove { id, .. } => id,
        }
    }

    pub fn table_id(&self) -> &str {
        match self {
            Self::Init { table_id, .. }
            | Self::Update { table_id, .. }
            | Self::Rename { table_id, .. }
            | Self::Remove { table_id, .. } => table_id,
        }
    }

    pub fn change_type(&self) -> ChangeType {
        match self {
            Self::Init { .. } => ChangeType::Init,
            Self::Update { .. } => ChangeType::Update,
            Self::Rename { .. } => ChangeType::Rename,
            Self::Remove { .. } => ChangeType::Remove,
        }
    }

    /// Timestamp of the migration id in unix milliseconds.
    pub fn timestamp_ms(&self) -> Result<i64, MigrationError> {
        parse_migration_id(self.id())
    }

    /// Table ids whose history this migration belongs to.
    pub fn touches(&self, table_id: &str) -> bool {
        match self {
            Self::Rename {
                table_id: from,
                next_table_id,
                ..
            } => from == table_id || next_table_id == table_id,
            other => other.table_id() == table_id,
        }
    }

    /// Checks the shape of a migration parsed from untrusted input.
    pub fn validate(&self) -> Result<i64, MigrationError> {
        let ts = self.timestamp_ms()?;
        if self.table_id().trim().is_empty() {
            return Err(MigrationError::InvalidShape("tableId must not be empty".to_string()));
        }
        match self {
            Self::Init { hash, schema, .. } => {
                if hash.trim().is_empty() {
                    return Err(MigrationError::InvalidShape("hash must not be empty".to_string()));
                }
                if !schema.is_object() {
                    return Err(MigrationError::InvalidShape("schema must be an object".to_string()));
                }
            }
            Self::Update { hash, patches, .. } => {
                if hash.trim().is_empty() {
                    return Err(MigrationError::InvalidShape("hash must not be empty".to_string()));
                }
                if patches.is_empty() {
                    return Err(MigrationError::InvalidShape("patches must not be empty".to_string()));
                }
            }
            Self::Rename { next_table_id, .. } => {
                if next_table_id.trim().is_empty() {
                    return Err(MigrationError::InvalidShape(
                        "nextTableId must not be empty".to_string(),
                    ));
                }
            }
            Self::Remove { .. } => {}
        }
        Ok(ts)
    }
}

pub fn parse_migration_id(id: &str) -> Result<i64, MigrationError> {
    rfc3339_to_ts_ms(id).ok_or_else(|| MigrationError::InvalidId(id.to_string()))
}

/// Outcome of one item of an apply batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Applied,
    Skipped,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub id: String,
    pub status: MigrationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MigrationReport {
    pub fn applied(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: MigrationStatus::Applied,
            error: None,
        }
    }

    pub fn skipped(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: MigrationStatus::Skipped,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: MigrationStatus::Failed,
            error: Some(error.into()),
        }
    }
}

/// Merges per-table histories into one sequence ordered by timestamp.
///
/// The sort is stable: equal timestamps keep their per-table order, and
/// tables keep the order in which they were given.
pub fn flatten_histories(histories: Vec<Vec<Migration>>) -> Vec<Migration> {
    let mut keyed = histories
        .into_iter()
        .flatten()
        .map(|migration| (migration.timestamp_ms().unwrap_or(i64::MAX), migration))
        .collect::<Vec<_>>();
    keyed.sort_by_key(|(ts, _)| *ts);
    keyed.into_iter().map(|(_, migration)| migration).collect()
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum MigrationError {
    #[error("migration id '{0}' is not an RFC 3339 timestamp")]
    InvalidId(String),
    #[error("invalid migration: {0}")]
    InvalidShape(String),
}
