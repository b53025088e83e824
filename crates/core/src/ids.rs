#![forbid(unsafe_code)]

pub const MAX_ID_LEN: usize = 64;

pub const SCHEMA_TABLE_ID: &str = "__schema";
pub const MIGRATION_TABLE_ID: &str = "__migration";
pub const VIEWS_TABLE_ID: &str = "__views";
pub const SHARED_SCHEMAS_TABLE_ID: &str = "__shared_schemas";

const RESERVED_PREFIX: &str = "__";

pub const SYSTEM_TABLE_IDS: [&str; 4] = [
    SCHEMA_TABLE_ID,
    MIGRATION_TABLE_ID,
    VIEWS_TABLE_ID,
    SHARED_SCHEMAS_TABLE_ID,
];

pub fn is_system_table_id(value: &str) -> bool {
    SYSTEM_TABLE_IDS.contains(&value)
}

/// Random identifier used for `versionId`, `createdId`, revisions and branches.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RowId(String);

impl RowId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        validate_row_id(&value)?;
        Ok(Self(value))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TableId(String);

impl TableId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        validate_table_id(&value)?;
        Ok(Self(value))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdError {
    Empty,
    TooLong,
    ContainsControl,
    InvalidChar { ch: char, index: usize },
    Reserved,
}

impl IdError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "id must not be empty",
            Self::TooLong => "id must be at most 64 characters",
            Self::ContainsControl => "id contains control characters",
            Self::InvalidChar { .. } => "id may only contain [A-Za-z0-9_-]",
            Self::Reserved => "ids starting with '__' are reserved",
        }
    }
}

impl std::fmt::Display for IdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidChar { ch, index } => {
                write!(f, "{} (found {ch:?} at {index})", self.message())
            }
            other => f.write_str(other.message()),
        }
    }
}

impl std::error::Error for IdError {}

fn validate_row_id(value: &str) -> Result<(), IdError> {
    let len = value.chars().count();
    if len == 0 {
        return Err(IdError::Empty);
    }
    if len > MAX_ID_LEN {
        return Err(IdError::TooLong);
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(IdError::ContainsControl);
    }
    Ok(())
}

fn validate_table_id(value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty);
    }
    if value.len() > MAX_ID_LEN {
        return Err(IdError::TooLong);
    }
    if value.starts_with(RESERVED_PREFIX) {
        return Err(IdError::Reserved);
    }
    for (index, ch) in value.chars().enumerate() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-') {
            continue;
        }
        return Err(IdError::InvalidChar { ch, index });
    }
    Ok(())
}
