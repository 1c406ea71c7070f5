use shorty_core::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("batch request is empty")]
    EmptyBatch,
    #[error("owner id is required")]
    MissingOwner,
    #[error("short id not found: {0}")]
    NotFound(String),
    #[error("short id has been deleted: {0}")]
    Deleted(String),
    #[error("no free short id after {0} attempts")]
    IdsExhausted(usize),
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(short_id) => Self::NotFound(short_id),
            StorageError::Deleted(short_id) => Self::Deleted(short_id),
            other => Self::Storage(other),
        }
    }
}
