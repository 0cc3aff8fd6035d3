//! Audio backend abstraction
//!
//! The engine never touches audio directly. It drives an `AudioBackend`
//! through prepare/play/pause/seek and listens to the backend's periodic
//! time updates to learn the playback position.
//!
//! **Contract:**
//! - At most one operation is in flight per backend (enforced by
//!   `CommandSerializer`, not by implementations)
//! - `prepare()` is idempotent; a prepared backend may skip the work
//! - Time updates are broadcast; a lagging listener skips stale updates

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

/// Failure reported by a backend operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Periodic position report from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeUpdate {
    /// Current playback position (milliseconds)
    pub current_ms: u64,
    /// Content duration (milliseconds); 0 while unknown
    pub duration_ms: u64,
}

/// Audio device or media element driven by the playback engine
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Load the content so that play/seek can take effect
    async fn prepare(&self) -> Result<(), BackendError>;

    /// Start or resume playback
    async fn play(&self) -> Result<(), BackendError>;

    /// Pause playback, keeping the position
    async fn pause(&self) -> Result<(), BackendError>;

    /// Move to `position_ms`
    async fn seek(&self, position_ms: u64) -> Result<(), BackendError>;

    /// Whether a previous `prepare()` already completed
    fn is_prepared(&self) -> bool;

    /// Content duration, valid once prepared
    async fn duration_ms(&self) -> Result<u64, BackendError>;

    /// Subscribe to time updates
    fn time_updates(&self) -> broadcast::Receiver<TimeUpdate>;
}
