//! Playback-related type definitions
//!
//! Supporting types for playback state, player identity and transcript lines.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Playback state enumeration
///
/// The lifecycle is `Idle → Loading → Ready → Playing ⇄ Paused`. Once a
/// player has left `Idle` it never returns to `Idle` except when a failed
/// preparation is rolled back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Backend not prepared, nothing requested yet
    #[default]
    Idle,
    /// Backend preparation in flight
    Loading,
    /// Backend prepared, playback never started
    Ready,
    /// Audio playing
    Playing,
    /// Audio paused (also reported at end of content)
    Paused,
}

impl PlaybackState {
    /// True once the backend has finished preparing
    pub fn is_prepared(self) -> bool {
        matches!(
            self,
            PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Paused
        )
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::Ready => write!(f, "ready"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// Identifier of one interview player instance
///
/// Assigned once at construction and carried through snapshots, events,
/// log spans and visibility subscriptions so sibling players on the same
/// host can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short form used for display disambiguation (first 8 hex chars)
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle of a transcript line
///
/// The value is the line's position inside the transcript index that
/// created it; it is only meaningful for that index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(pub usize);

impl LineId {
    /// Position of the line in its index
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line#{}", self.0)
    }
}
