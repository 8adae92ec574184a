use thiserror::Error;

/// Faults surfaced by a store backend.
///
/// The service maps `NotFound` to the bus `NoSuchObject` error and the other
/// kinds to `NotSupported`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named collection, item, or alias does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backing tool failed or produced unparseable output.
    #[error("store backend failure: {0}")]
    Backend(String),

    /// The operation was cancelled before completion.
    #[error("operation cancelled")]
    Cancelled,
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}
