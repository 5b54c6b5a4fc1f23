//! Error types for lodcrate

use thiserror::Error;

/// Main error type for lodcrate operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The collapse log does not reach far enough down to produce the
    /// requested vertex count.
    #[error("Vertex count {requested} is not available, simplification data only reaches {reached}")]
    LevelUnavailable { requested: usize, reached: usize },
}

/// Result type alias for lodcrate operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::collections::TryReserveError> for Error {
    fn from(e: std::collections::TryReserveError) -> Self {
        Error::ResourceExhausted(e.to_string())
    }
}
