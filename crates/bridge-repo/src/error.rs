use bridge_index::IndexError;
use bridge_store::StoreError;
use bridge_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// No entity or resource at the path, or no entity with the identifier.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unset, malformed or conflicting path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The object store failed; a commit in flight is aborted.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<TypeError> for RepositoryError {
    fn from(e: TypeError) -> Self {
        Self::InvalidPath(e.to_string())
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
