//! Error types for storage backends

/// Errors from storage backends.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("store parse error: {0}")]
    Parse(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;
