#![forbid(unsafe_code)]

use rusqlite::ErrorCode;
use tg_core::{IdError, JsonPatchError, MigrationError, PatchError, SchemaError, ValidationIssue};

/// Coarse classification of a [`StoreError`], stable across releases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Integrity,
    NotFound,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt store: {0}")]
    Corrupt(String),

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("invalid {kind} '{value}': {source}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        source: IdError,
    },
    #[error("data is not valid for table '{table_id}'")]
    DataNotValid {
        table_id: String,
        row_id: Option<String>,
        details: Vec<ValidationIssue>,
    },
    #[error("path '{path}' not found")]
    PathNotFound { path: String },
    #[error("invalid schema: {0}")]
    InvalidSchema(#[from] SchemaError),
    #[error("invalid patch: {0}")]
    InvalidPatch(String),
    #[error("foreign key '{path}' references missing row '{row_id}' in table '{table_id}'")]
    ForeignKeyNotFound {
        path: String,
        table_id: String,
        row_id: String,
    },

    #[error("row '{row_id}' is duplicated in table '{table_id}'")]
    DuplicateRow { table_id: String, row_id: String },
    #[error("row '{row_id}' already exists in table '{table_id}'")]
    RowAlreadyExists { table_id: String, row_id: String },
    #[error("table '{0}' already exists")]
    TableAlreadyExists(String),
    #[error("branch '{0}' already exists")]
    BranchAlreadyExists(String),
    #[error("project '{0}' already exists")]
    ProjectAlreadyExists(String),
    #[error("migration '{id}' for table '{table_id}' must be after '{last_id}'")]
    InvalidMigrationOrder {
        table_id: String,
        id: String,
        last_id: String,
    },
    #[error("invalid migration: {0}")]
    InvalidMigration(#[from] MigrationError),
    #[error("revision '{0}' is not the draft revision of its branch")]
    NotDraftRevision(String),
    #[error("there are no changes to commit")]
    NoChanges,
    #[error("table '{0}' is a system table")]
    SystemTableWrite(String),

    #[error("row '{row_id}' in table '{table_id}' is referenced by {references} row(s)")]
    RowIsReferenced {
        table_id: String,
        row_id: String,
        references: usize,
    },
    #[error("table '{table_id}' is referenced by {}", .by.join(", "))]
    TableIsReferenced { table_id: String, by: Vec<String> },
    #[error("the root branch cannot be deleted")]
    CannotDeleteRootBranch,
    #[error("branch '{0}' has dependent branches")]
    BranchHasDependents(String),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_)
            | Self::InvalidIdentifier { .. }
            | Self::DataNotValid { .. }
            | Self::PathNotFound { .. }
            | Self::InvalidSchema(_)
            | Self::InvalidPatch(_)
            | Self::InvalidMigration(_)
            | Self::ForeignKeyNotFound { .. } => ErrorKind::Validation,
            Self::DuplicateRow { .. }
            | Self::RowAlreadyExists { .. }
            | Self::TableAlreadyExists(_)
            | Self::BranchAlreadyExists(_)
            | Self::ProjectAlreadyExists(_)
            | Self::InvalidMigrationOrder { .. }
            | Self::NotDraftRevision(_)
            | Self::NoChanges
            | Self::SystemTableWrite(_) => ErrorKind::Conflict,
            Self::RowIsReferenced { .. }
            | Self::TableIsReferenced { .. }
            | Self::CannotDeleteRootBranch
            | Self::BranchHasDependents(_) => ErrorKind::Integrity,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Io(_) | Self::Sql(_) | Self::Json(_) | Self::Corrupt(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO",
            Self::Sql(_) => "STORAGE",
            Self::Json(_) => "JSON",
            Self::Corrupt(_) => "CORRUPT",
            Self::InvalidInput(message) if message.starts_with("RESET_REQUIRED") => {
                "RESET_REQUIRED"
            }
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidIdentifier { .. } => "INVALID_IDENTIFIER",
            Self::DataNotValid { .. } => "DATA_NOT_VALID",
            Self::PathNotFound { .. } => "PATH_NOT_FOUND",
            Self::InvalidSchema(_) => "INVALID_SCHEMA",
            Self::InvalidPatch(_) => "INVALID_PATCH",
            Self::InvalidMigration(_) => "INVALID_MIGRATION",
            Self::ForeignKeyNotFound { .. } => "FOREIGN_KEY_NOT_FOUND",
            Self::DuplicateRow { .. } => "DUPLICATE_ROW",
            Self::RowAlreadyExists { .. } => "ROW_ALREADY_EXISTS",
            Self::TableAlreadyExists(_) => "TABLE_ALREADY_EXISTS",
            Self::BranchAlreadyExists(_) => "BRANCH_ALREADY_EXISTS",
            Self::ProjectAlreadyExists(_) => "PROJECT_ALREADY_EXISTS",
            Self::InvalidMigrationOrder { .. } => "INVALID_MIGRATION_ORDER",
            Self::NotDraftRevision(_) => "NOT_DRAFT_REVISION",
            Self::NoChanges => "NO_CHANGES",
            Self::SystemTableWrite(_) => "SYSTEM_TABLE_WRITE",
            Self::RowIsReferenced { .. } => "ROW_IS_REFERENCED",
            Self::TableIsReferenced { .. } => "TABLE_IS_REFERENCED",
            Self::CannotDeleteRootBranch => "CANNOT_DELETE_ROOT_BRANCH",
            Self::BranchHasDependents(_) => "BRANCH_HAS_DEPENDENTS",
            Self::NotFound { .. } => "NOT_FOUND",
        }
    }

    /// Path-qualified validation details, empty for non-validation errors.
    pub fn details(&self) -> &[ValidationIssue] {
        match self {
            Self::DataNotValid { details, .. } => details,
            _ => &[],
        }
    }

    /// Busy/locked backing store; the whole command can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Sql(rusqlite::Error::SqliteFailure(code, _)) => matches!(
                code.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    pub(crate) fn from_patch(table_id: &str, row_id: Option<&str>, err: PatchError) -> Self {
        match err {
            PatchError::PathNotFound { path } => Self::PathNotFound { path },
            PatchError::InvalidPath { path, reason } => {
                Self::InvalidPatch(format!("{path}: {reason}"))
            }
            PatchError::UnsupportedOperation { .. } => Self::InvalidPatch(err.to_string()),
            other => Self::DataNotValid {
                table_id: table_id.to_string(),
                row_id: row_id.map(str::to_string),
                details: other.issues(),
            },
        }
    }
}

impl From<JsonPatchError> for StoreError {
    fn from(value: JsonPatchError) -> Self {
        Self::InvalidPatch(value.to_string())
    }
}
