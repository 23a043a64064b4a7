//! Error types for CHS Archive.

use thiserror::Error;

/// Common error type for CHS Archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O error (disk full, permission denied, unexpected filesystem failure).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for user input (oversized file, disallowed extension).
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for CHS Archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;
