use thiserror::Error;

use crate::DocumentKey;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {0} not found")]
    NotFound(DocumentKey),
    #[error("document {0} already exists")]
    AlreadyExists(DocumentKey),
    #[error("version conflict on {key}: expected {expected}, found {actual}")]
    VersionConflict {
        key: DocumentKey,
        expected: u64,
        actual: u64,
    },
    #[error("invalid field path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// True for failures caused by the backend itself rather than by the request.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Migrate(_) | Self::Io(_))
    }
}
