//! Error types for stellar-interview
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//!
//! Failure scopes:
//! - Transcript errors only disable line highlighting, playback continues
//! - Backend errors abort the single command that hit them
//! - `EngineStopped` means the player task is gone and the handle is dead

use crate::playback::backend::BackendError;
use crate::transcript::MalformedTranscript;
use thiserror::Error;

/// Main error type for stellar-interview
#[derive(Error, Debug)]
pub enum Error {
    /// Transcript content could not be indexed
    #[error("Malformed transcript: {0}")]
    MalformedTranscript(#[from] MalformedTranscript),

    /// Transcript file is not valid TOML or has the wrong layout
    #[error("Unreadable transcript file: {0}")]
    TranscriptFile(String),

    /// Command issued before an audio backend was attached
    ///
    /// Recoverable: the command is dropped and may be resubmitted.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend rejected an operation
    #[error("Backend {operation} failed: {source}")]
    BackendOperation {
        /// Operation name ("prepare", "play", "pause", "seek", "restart")
        operation: &'static str,
        #[source]
        source: BackendError,
    },

    /// The player task has shut down
    #[error("Playback engine stopped")]
    EngineStopped,

    /// File I/O error
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),
}

/// Convenience Result type using stellar-interview Error
pub type Result<T> = std::result::Result<T, Error>;
