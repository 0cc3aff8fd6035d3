//! Playback control
//!
//! - `backend`: async `AudioBackend` trait implemented by audio pipelines
//! - `state_machine`: canonical state and clock
//! - `serializer`: one backend operation in flight, single coalescing slot
//! - `engine`: player task and `PlayerHandle`
//! - `simulated`: timer-driven backend for headless runs

pub mod backend;
pub mod engine;
pub mod serializer;
pub mod simulated;
pub mod state_machine;

pub use backend::{AudioBackend, BackendError, TimeUpdate};
pub use engine::{CommandOutcome, CommandReply, PlayerHandle, PlayerOptions, PlayerSnapshot};
pub use simulated::{SimulatedBackend, SimulatedConfig};
pub use state_machine::{Clock, PlaybackStateMachine};
