//! Common error types for Stellar crates

use thiserror::Error;

/// Common result type for Stellar operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the Stellar crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timestamp text that could not be parsed
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
