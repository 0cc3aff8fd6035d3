//! Test helper modules for stellar-interview integration tests
//!
//! - MockBackend: scriptable `AudioBackend` (call log, holds, failures)
//! - Player helpers: spawn players and wait for snapshot conditions

#![allow(dead_code)]

pub mod mock_backend;

pub use mock_backend::{Call, MockBackend};

use std::sync::Arc;
use std::time::Duration;
use stellar_common::PlaybackState;
use stellar_interview::config::PlayerConfig;
use stellar_interview::playback::{PlayerHandle, PlayerOptions, PlayerSnapshot};
use stellar_interview::transcript::RawLine;
use stellar_interview::visibility::ManualVisibility;

/// Upper bound for any single wait in a test
pub const WAIT: Duration = Duration::from_secs(5);

/// Lines `[0, 1000)` and `[1000, 2000)`
pub fn two_lines() -> Vec<RawLine> {
    vec![
        RawLine::new(0, 1000, "First line").with_speaker("Host"),
        RawLine::new(1000, 2000, "Second line").with_speaker("Guest"),
    ]
}

/// Player with a backend attached and no visibility support
pub fn player_with(backend: &Arc<MockBackend>, transcript: Vec<RawLine>) -> PlayerHandle {
    PlayerHandle::spawn(PlayerOptions::new(transcript).with_backend(backend.clone()))
}

/// Player with a backend attached and a manual visibility source
pub fn visible_player(
    backend: &Arc<MockBackend>,
    config: PlayerConfig,
) -> (PlayerHandle, Arc<ManualVisibility>) {
    let visibility = Arc::new(ManualVisibility::new());
    let player = PlayerHandle::spawn(
        PlayerOptions::new(two_lines())
            .with_config(config)
            .with_backend(backend.clone())
            .with_visibility(visibility.clone()),
    );
    (player, visibility)
}

/// Wait until the snapshot satisfies `predicate`
pub async fn wait_until(
    player: &PlayerHandle,
    predicate: impl FnMut(&PlayerSnapshot) -> bool,
) -> PlayerSnapshot {
    let mut watch = player.watch();
    let result = tokio::time::timeout(WAIT, watch.wait_for(predicate)).await;
    match result {
        Ok(Ok(snapshot)) => snapshot.clone(),
        Ok(Err(_)) => panic!("player stopped while waiting"),
        Err(_) => panic!("timed out; last snapshot: {:?}", player.snapshot()),
    }
}

pub async fn wait_for_state(player: &PlayerHandle, state: PlaybackState) -> PlayerSnapshot {
    wait_until(player, |s| s.state == state).await
}

/// Activate and wait for `Ready`
pub async fn ready_player(backend: &Arc<MockBackend>, transcript: Vec<RawLine>) -> PlayerHandle {
    let player = player_with(backend, transcript);
    player.activate().await.expect("activation failed");
    wait_for_state(&player, PlaybackState::Ready).await;
    player
}

/// Give the player task a chance to process queued messages
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
