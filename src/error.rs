use thiserror::Error;

use crate::session::ConfigValidation;

/// Failures at the persistence boundary
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sqlite backend failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unsupported schema version {found} for key {key}")]
    UnsupportedVersion { key: String, found: u32 },
}

/// Failures of admin operations that change session configuration
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("invalid session configuration: {0}")]
    Invalid(ConfigValidation),
    #[error("invalid session id {0:?}, expected session-N")]
    InvalidSessionId(String),
    #[error("session {0} not found")]
    UnknownSession(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
