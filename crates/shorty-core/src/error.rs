use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Outcomes every storage backend reports identically.
///
/// `NotFound`, `Deleted` and `AlreadyExists` are distinct so the request
/// layer can map them to different responses. Deletes of records owned by
/// another principal are not errors at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("short id not found: {0}")]
    NotFound(String),
    #[error("short id has been deleted: {0}")]
    Deleted(String),
    #[error("original url already shortened as: {short_id}")]
    AlreadyExists { short_id: String },
    #[error("snapshot persistence failed: {0}")]
    Persistence(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
}
