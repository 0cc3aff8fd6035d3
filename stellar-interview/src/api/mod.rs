//! HTTP control surface
//!
//! Lets a host page (or curl) drive the player, report visibility and
//! follow state changes over SSE.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{router, run, AppContext};
