//! Event types for the Stellar interview player
//!
//! Provides shared event definitions and EventBus for all Stellar crates.

mod playback_types;

pub use playback_types::{InstanceId, LineId, PlaybackState};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Interview player event types
///
/// Events are broadcast via EventBus and can be serialized for SSE transmission.
/// Every event carries the `InstanceId` of the player that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InterviewEvent {
    /// Playback state changed (e.g. Loading → Ready, Playing ↔ Paused)
    ///
    /// Triggers:
    /// - SSE: Update play/pause/loading controls
    PlaybackStateChanged {
        /// Player that changed state
        instance_id: InstanceId,
        /// Playback state before change
        old_state: PlaybackState,
        /// Playback state after change
        new_state: PlaybackState,
        /// When state changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Clock moved (time update from the backend or completed seek)
    ///
    /// Triggers:
    /// - SSE: Update progress bar and current/duration labels
    PlaybackProgress {
        instance_id: InstanceId,
        /// Current playback position (milliseconds)
        current_ms: u64,
        /// Total content duration (milliseconds, 0 while unknown)
        duration_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The highlighted transcript line changed
    ///
    /// `line` is None when the clock sits in a gap, before the first line
    /// or after the last line.
    ActiveLineChanged {
        instance_id: InstanceId,
        line: Option<LineId>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A backend command failed and was dropped
    ///
    /// The playback state is left as it was before the command.
    CommandFailed {
        instance_id: InstanceId,
        /// Command name ("prepare", "play", "pause", "seek")
        command: String,
        /// Error message reported by the backend
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Transcript content could not be indexed
    ///
    /// Playback continues without line highlighting.
    TranscriptRejected {
        instance_id: InstanceId,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Hosting element entered or left the viewport
    VisibilityChanged {
        instance_id: InstanceId,
        visible: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl InterviewEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            InterviewEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            InterviewEvent::PlaybackProgress { .. } => "PlaybackProgress",
            InterviewEvent::ActiveLineChanged { .. } => "ActiveLineChanged",
            InterviewEvent::CommandFailed { .. } => "CommandFailed",
            InterviewEvent::TranscriptRejected { .. } => "TranscriptRejected",
            InterviewEvent::VisibilityChanged { .. } => "VisibilityChanged",
        }
    }

    /// Player instance that emitted the event
    pub fn instance_id(&self) -> InstanceId {
        match self {
            InterviewEvent::PlaybackStateChanged { instance_id, .. }
            | InterviewEvent::PlaybackProgress { instance_id, .. }
            | InterviewEvent::ActiveLineChanged { instance_id, .. }
            | InterviewEvent::CommandFailed { instance_id, .. }
            | InterviewEvent::TranscriptRejected { instance_id, .. }
            | InterviewEvent::VisibilityChanged { instance_id, .. } => *instance_id,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use stellar_common::events::{EventBus, InstanceId, InterviewEvent, PlaybackState};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit(InterviewEvent::PlaybackStateChanged {
///     instance_id: InstanceId::new(),
///     old_state: PlaybackState::Paused,
///     new_state: PlaybackState::Playing,
///     timestamp: chrono::Utc::now(),
/// }).ok();
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<InterviewEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<InterviewEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: InterviewEvent,
    ) -> Result<usize, broadcast::error::SendError<InterviewEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Progress and line events are fine to lose when nobody is rendering.
    pub fn emit_lossy(&self, event: InterviewEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
