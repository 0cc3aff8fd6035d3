//! Interview player engine
//!
//! **Module Structure:**
//! - `handle.rs`: `PlayerHandle` public API, options, snapshots, replies
//! - `core.rs`: player task owning state machine, serializer, cache and gate

mod core;
mod handle;

pub use handle::{CommandOutcome, CommandReply, PlayerHandle, PlayerOptions, PlayerSnapshot};
