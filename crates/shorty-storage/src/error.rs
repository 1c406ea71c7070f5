use shorty_core::StorageError;
use thiserror::Error;

/// Errors raised while reading or writing a snapshot file.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SnapshotError> for StorageError {
    fn from(value: SnapshotError) -> Self {
        StorageError::Persistence(value.to_string())
    }
}
