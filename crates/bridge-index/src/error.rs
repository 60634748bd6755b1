//! Error types for the index crate.

use bridge_types::TypeError;

/// Errors that can occur when talking to the index engine.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The engine failed to answer a query.
    #[error("index engine error: {0}")]
    Engine(String),

    /// A stored field value could not be interpreted.
    #[error("invalid value in field {field}: {source}")]
    InvalidField {
        field: String,
        #[source]
        source: TypeError,
    },
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
