//! # Stellar Common Library
//!
//! Shared code for the Stellar interview player crates:
//! - Event types (`InterviewEvent`) and the `EventBus`
//! - Playback identifiers (`InstanceId`, `LineId`) and `PlaybackState`
//! - Timestamp parsing and display formatting
//! - TOML configuration file resolution

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;

pub use error::{Error, Result};
pub use events::{EventBus, InstanceId, InterviewEvent, LineId, PlaybackState};
