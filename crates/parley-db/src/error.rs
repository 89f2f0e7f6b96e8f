use parley_types::events::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Empty or malformed input. Rejects the single operation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced user id does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage is unavailable or returned something unusable.
    #[error("storage unavailable: {0}")]
    Persistence(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}
