use bridge_store::StoreError;

/// Errors from virtual directory operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// A handle was requested for a file with no underlying object.
    #[error("file not accessible: {0}")]
    FileNotAccessible(String),

    /// The name cannot be used as a file name.
    #[error("invalid file name: {0}")]
    InvalidName(#[from] bridge_types::TypeError),

    /// The underlying store failed.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    /// Positional I/O on an in-memory handle failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
