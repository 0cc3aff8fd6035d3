//! # Stellar Interview Player Library (stellar-interview)
//!
//! Playback and transcript synchronization for interview recordings.
//!
//! **Purpose:** Lazily prepare an audio backend once the player is visible,
//! serialize play/pause/seek commands against it, and keep the active
//! transcript line in sync with the playback clock.
//!
//! **Architecture:** One tokio task per player owns the state machine, the
//! command serializer, the active-line cache and the visibility gate;
//! `PlayerHandle`s talk to it over channels.

pub mod api;
pub mod config;
pub mod error;
pub mod playback;
pub mod transcript;
pub mod visibility;

pub use error::{Error, Result};
pub use playback::{PlayerHandle, PlayerOptions, PlayerSnapshot};
