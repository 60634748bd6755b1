use bridge_types::TypeError;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No object (or container, where one is accepted) exists at the path.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The path cannot be mapped onto the backend.
    #[error("invalid store path: {0}")]
    InvalidPath(#[from] TypeError),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
