#![forbid(unsafe_code)]

use serde::Deserialize;

const DEFAULT_DB_FILE_NAME: &str = "tablegraph.db";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_PAGE_SIZE: usize = 100;
const MAX_PAGE_SIZE: usize = 1_000;

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
}

impl JournalMode {
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// SQLite synchronous mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Full,
    Normal,
}

impl SyncMode {
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// File name of the database inside the storage directory.
    pub db_file_name: String,
    pub busy_timeout_ms: u64,
    pub journal_mode: JournalMode,
    pub sync_mode: SyncMode,
    /// Page size used by `get_rows` when the request does not set one.
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_file_name: DEFAULT_DB_FILE_NAME.to_string(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: JournalMode::default(),
            sync_mode: SyncMode::default(),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl StoreConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, super::StoreError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub(super) fn validate(&self) -> Result<(), super::StoreError> {
        if self.db_file_name.trim().is_empty() {
            return Err(super::StoreError::InvalidInput(
                "db_file_name must not be empty",
            ));
        }
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(super::StoreError::InvalidInput(
                "page sizes must be positive",
            ));
        }
        if self.default_page_size > self.max_page_size {
            return Err(super::StoreError::InvalidInput(
                "default_page_size must not exceed max_page_size",
            ));
        }
        Ok(())
    }

    /// Clamps a requested page size into `1..=max_page_size`.
    pub(super) fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }
}
