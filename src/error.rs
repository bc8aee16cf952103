use thiserror::Error;

#[derive(Debug, Error)]
pub enum WikiError {
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("MALFORMED_JSON: {0}")]
    Json(String),
    #[error("MIGRATION_FAILED: {0}")]
    Migration(String),
    #[error("UNSUPPORTED_VERSION: stored blob is version {found}, newest known is {supported}")]
    UnsupportedVersion { found: u64, supported: u64 },
    #[error("EMPTY_TITLE: an entry needs a title")]
    EmptyTitle,
    #[error("UNKNOWN_CATEGORY: {0}")]
    UnknownCategory(String),
    #[error("UNKNOWN_ENTRY: {category}/{entry}")]
    UnknownEntry { category: String, entry: String },
    #[error("DUPLICATE_ENTRY: {category}/{entry} already exists")]
    DuplicateEntry { category: String, entry: String },
}

impl From<std::io::Error> for WikiError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for WikiError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value.to_string())
    }
}

pub type WikiResult<T> = Result<T, WikiError>;
