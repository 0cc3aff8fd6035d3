//! Integration tests for the player engine
//!
//! Drives `PlayerHandle` against the mock backend and checks state
//! transitions, command serialization and failure handling.

mod helpers;

use futures::StreamExt;
use helpers::*;
use stellar_common::{InterviewEvent, PlaybackState};
use stellar_interview::config::PlayerConfig;
use stellar_interview::playback::{CommandOutcome, PlayerHandle, PlayerOptions};
use stellar_interview::Error;

/// Collect state transitions seen on the event bus so far
fn drain_transitions(
    rx: &mut tokio::sync::broadcast::Receiver<InterviewEvent>,
) -> Vec<(PlaybackState, PlaybackState)> {
    let mut transitions = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let InterviewEvent::PlaybackStateChanged {
            old_state,
            new_state,
            ..
        } = event
        {
            transitions.push((old_state, new_state));
        }
    }
    transitions
}

#[tokio::test]
async fn test_play_from_idle_passes_through_loading_and_ready() {
    let backend = MockBackend::new(10_000);
    let player = player_with(&backend, two_lines());
    let mut events = player.events();

    let outcome = player.play().await.unwrap();
    assert_eq!(outcome, CommandOutcome::Completed);
    assert_eq!(player.snapshot().state, PlaybackState::Playing);

    assert_eq!(
        drain_transitions(&mut events),
        vec![
            (PlaybackState::Idle, PlaybackState::Loading),
            (PlaybackState::Loading, PlaybackState::Ready),
            (PlaybackState::Ready, PlaybackState::Playing),
        ]
    );
}

#[tokio::test]
async fn test_slow_prepare_then_exactly_one_prepare_and_one_play() {
    let backend = MockBackend::new(10_000);
    backend.hold("prepare");
    let player = player_with(&backend, two_lines());

    let reply = player.play();
    backend.wait_for(Call::Prepare, 1).await;
    assert_eq!(player.snapshot().state, PlaybackState::Loading);

    // More play requests while loading do not add backend calls
    let second = player.play();

    backend.release("prepare");
    assert_eq!(second.await.unwrap(), CommandOutcome::Completed);
    assert_eq!(reply.await.unwrap(), CommandOutcome::Superseded);

    let snapshot = wait_for_state(&player, PlaybackState::Playing).await;
    assert_eq!(snapshot.duration_ms, 10_000);
    assert_eq!(backend.transport_calls(), vec![Call::Prepare, Call::Play]);
}

#[tokio::test]
async fn test_pause_before_ready_is_noop() {
    let backend = MockBackend::new(10_000);
    let player = player_with(&backend, two_lines());

    // Idle
    assert_eq!(player.pause().await.unwrap(), CommandOutcome::NoOp);
    assert_eq!(player.snapshot().state, PlaybackState::Idle);

    // Loading
    backend.hold("prepare");
    let activation = player.activate();
    backend.wait_for(Call::Prepare, 1).await;
    assert_eq!(player.pause().await.unwrap(), CommandOutcome::NoOp);
    assert_eq!(player.snapshot().state, PlaybackState::Loading);

    backend.release("prepare");
    assert_eq!(activation.await.unwrap(), CommandOutcome::Completed);
    assert_eq!(player.snapshot().state, PlaybackState::Ready);
    assert_eq!(backend.count(Call::Pause), 0);
}

#[tokio::test]
async fn test_pause_while_loading_cancels_deferred_play() {
    let backend = MockBackend::new(10_000);
    backend.hold("prepare");
    let player = player_with(&backend, two_lines());

    let play = player.play();
    backend.wait_for(Call::Prepare, 1).await;
    let pause = player.pause();

    backend.release("prepare");
    assert_eq!(play.await.unwrap(), CommandOutcome::Superseded);
    assert_eq!(pause.await.unwrap(), CommandOutcome::NoOp);

    wait_for_state(&player, PlaybackState::Ready).await;
    settle().await;
    assert_eq!(player.snapshot().state, PlaybackState::Ready);
    assert_eq!(backend.count(Call::Play), 0);
}

#[tokio::test]
async fn test_seeks_behind_in_flight_command_coalesce() {
    let backend = MockBackend::new(10_000);
    let player = ready_player(&backend, two_lines()).await;

    backend.hold("play");
    let play = player.play();
    backend.wait_for(Call::Play, 1).await;

    let first = player.seek(10);
    let second = player.seek(20);
    assert_eq!(first.await.unwrap(), CommandOutcome::Superseded);

    backend.release("play");
    assert_eq!(play.await.unwrap(), CommandOutcome::Completed);
    assert_eq!(second.await.unwrap(), CommandOutcome::Completed);

    assert_eq!(backend.seeks(), vec![20]);
    let snapshot = player.snapshot();
    assert_eq!(snapshot.current_ms, 20);
    assert_eq!(snapshot.state, PlaybackState::Playing);
}

#[tokio::test]
async fn test_latest_pending_command_of_any_kind_wins() {
    let backend = MockBackend::new(10_000);
    let player = ready_player(&backend, two_lines()).await;

    backend.hold("seek");
    let seek = player.seek(500);
    backend.wait_for(Call::Seek(500), 1).await;

    let play = player.play();
    let pause = player.pause();
    assert_eq!(play.await.unwrap(), CommandOutcome::Superseded);

    backend.release("seek");
    assert_eq!(seek.await.unwrap(), CommandOutcome::Completed);
    // Dequeued while Ready: nothing to pause
    assert_eq!(pause.await.unwrap(), CommandOutcome::NoOp);

    assert_eq!(
        backend.transport_calls(),
        vec![Call::Prepare, Call::Seek(500)]
    );
    assert_eq!(player.snapshot().state, PlaybackState::Ready);
}

#[tokio::test]
async fn test_toggle_resolves_against_state_when_started() {
    let backend = MockBackend::new(10_000);
    let player = ready_player(&backend, two_lines()).await;

    assert_eq!(player.toggle().await.unwrap(), CommandOutcome::Completed);
    assert_eq!(player.snapshot().state, PlaybackState::Playing);
    assert_eq!(player.toggle().await.unwrap(), CommandOutcome::Completed);
    assert_eq!(player.snapshot().state, PlaybackState::Paused);

    assert_eq!(
        backend.transport_calls(),
        vec![Call::Prepare, Call::Play, Call::Pause]
    );
}

#[tokio::test]
async fn test_deferred_seek_applies_latest_target_once_ready() {
    let backend = MockBackend::new(10_000);
    backend.hold("prepare");
    let player = player_with(&backend, two_lines());

    let early = player.seek(100);
    let late = player.seek(1500);
    assert_eq!(early.await.unwrap(), CommandOutcome::Superseded);

    let play = player.play();
    backend.wait_for(Call::Prepare, 1).await;
    backend.release("prepare");

    assert_eq!(late.await.unwrap(), CommandOutcome::Completed);
    assert_eq!(play.await.unwrap(), CommandOutcome::Completed);

    assert_eq!(
        backend.transport_calls(),
        vec![Call::Prepare, Call::Seek(1500), Call::Play]
    );
    let snapshot = player.snapshot();
    assert_eq!(snapshot.current_ms, 1500);
    assert_eq!(snapshot.state, PlaybackState::Playing);
}

#[tokio::test]
async fn test_seek_from_idle_activates_and_lands() {
    let backend = MockBackend::new(10_000);
    let player = player_with(&backend, two_lines());

    assert_eq!(player.seek(500).await.unwrap(), CommandOutcome::Completed);

    let snapshot = player.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Ready);
    assert_eq!(snapshot.current_ms, 500);
    assert_eq!(backend.transport_calls(), vec![Call::Prepare, Call::Seek(500)]);
}

#[tokio::test]
async fn test_seek_after_failed_prepare_retries_activation() {
    let backend = MockBackend::new(10_000);
    backend.fail("prepare", "decoder missing");
    let player = player_with(&backend, two_lines());

    assert!(matches!(
        player.seek(500).await,
        Err(Error::BackendOperation { operation: "prepare", .. })
    ));
    assert_eq!(player.snapshot().state, PlaybackState::Idle);

    backend.clear_failure("prepare");
    assert_eq!(player.seek(700).await.unwrap(), CommandOutcome::Completed);
    assert_eq!(player.snapshot().current_ms, 700);
    assert_eq!(backend.count(Call::Prepare), 2);
}

#[tokio::test]
async fn test_seek_is_clamped_to_duration() {
    let backend = MockBackend::new(3_000);
    let player = ready_player(&backend, two_lines()).await;

    player.seek(9_000).await.unwrap();
    assert_eq!(backend.seeks(), vec![3_000]);
    assert_eq!(player.snapshot().current_ms, 3_000);
}

#[tokio::test]
async fn test_end_of_content_pauses_without_reset() {
    let backend = MockBackend::new(4_000);
    let player = ready_player(&backend, two_lines()).await;
    player.play().await.unwrap();

    backend.emit(3_000, 4_000);
    wait_until(&player, |s| s.current_ms == 3_000).await;
    assert_eq!(player.snapshot().state, PlaybackState::Playing);

    backend.emit(4_000, 4_000);
    let snapshot = wait_for_state(&player, PlaybackState::Paused).await;
    assert_eq!(snapshot.current_ms, 4_000);

    settle().await;
    assert_eq!(player.snapshot().current_ms, 4_000);
    assert_eq!(backend.seeks(), Vec::<u64>::new());
}

#[tokio::test]
async fn test_click_at_end_restarts() {
    let backend = MockBackend::new(4_000);
    let player = ready_player(&backend, two_lines()).await;
    player.play().await.unwrap();
    backend.emit(4_000, 4_000);
    wait_for_state(&player, PlaybackState::Paused).await;

    assert_eq!(player.click().await.unwrap(), CommandOutcome::Completed);

    let snapshot = player.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(snapshot.current_ms, 0);
    assert_eq!(
        backend.transport_calls(),
        vec![Call::Prepare, Call::Play, Call::Seek(0), Call::Play]
    );
}

#[tokio::test]
async fn test_click_toggles_mid_content() {
    let backend = MockBackend::new(4_000);
    let player = ready_player(&backend, two_lines()).await;

    player.click().await.unwrap();
    assert_eq!(player.snapshot().state, PlaybackState::Playing);
    player.click().await.unwrap();
    assert_eq!(player.snapshot().state, PlaybackState::Paused);
}

#[tokio::test]
async fn test_restart_before_ready_starts_from_zero() {
    let backend = MockBackend::new(4_000);
    let player = player_with(&backend, two_lines());

    assert_eq!(player.restart().await.unwrap(), CommandOutcome::Completed);
    let snapshot = player.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(snapshot.current_ms, 0);
}

#[tokio::test]
async fn test_commands_before_backend_are_unavailable() {
    let player = PlayerHandle::spawn(PlayerOptions::new(two_lines()));

    let result = player.play().await;
    assert!(matches!(result, Err(Error::BackendUnavailable(_))));
    assert_eq!(player.snapshot().state, PlaybackState::Idle);

    // Dropped, not queued: attaching later does not replay it
    let backend = MockBackend::new(1_000);
    player.attach(backend.clone()).await.unwrap();
    settle().await;
    assert!(backend.calls().is_empty());

    // Resubmission works
    player.play().await.unwrap();
    assert_eq!(player.snapshot().state, PlaybackState::Playing);
}

#[tokio::test]
async fn test_prepare_failure_returns_to_idle_and_recovers() {
    let backend = MockBackend::new(1_000);
    backend.fail("prepare", "decoder missing");
    let player = player_with(&backend, two_lines());
    let mut events = player.events();

    let result = player.play().await;
    match result {
        Err(Error::BackendOperation { operation, source }) => {
            assert_eq!(operation, "prepare");
            assert_eq!(source.to_string(), "decoder missing");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(player.snapshot().state, PlaybackState::Idle);

    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        if let InterviewEvent::CommandFailed { command, error, .. } = event {
            assert_eq!(command, "prepare");
            assert_eq!(error, "decoder missing");
            saw_failure = true;
        }
    }
    assert!(saw_failure);

    backend.clear_failure("prepare");
    player.play().await.unwrap();
    assert_eq!(player.snapshot().state, PlaybackState::Playing);
}

#[tokio::test]
async fn test_play_failure_leaves_state_unchanged() {
    let backend = MockBackend::new(1_000);
    let player = ready_player(&backend, two_lines()).await;

    backend.fail("play", "device busy");
    assert!(matches!(
        player.play().await,
        Err(Error::BackendOperation { operation: "play", .. })
    ));
    assert_eq!(player.snapshot().state, PlaybackState::Ready);

    // Still responsive
    backend.clear_failure("play");
    player.play().await.unwrap();
    assert_eq!(player.snapshot().state, PlaybackState::Playing);
}

#[tokio::test]
async fn test_prepare_skipped_when_backend_already_prepared() {
    let backend = MockBackend::new(1_000);
    backend.prepare_now();
    let player = player_with(&backend, two_lines());

    player.activate().await.unwrap();
    assert_eq!(player.snapshot().state, PlaybackState::Ready);
    assert_eq!(backend.count(Call::Prepare), 0);
    assert_eq!(backend.count(Call::Duration), 1);
}

#[tokio::test]
async fn test_activate_is_idempotent() {
    let backend = MockBackend::new(1_000);
    let player = player_with(&backend, two_lines());

    assert_eq!(player.activate().await.unwrap(), CommandOutcome::Completed);
    assert_eq!(player.activate().await.unwrap(), CommandOutcome::NoOp);
    assert_eq!(backend.count(Call::Prepare), 1);
}

#[tokio::test]
async fn test_snapshot_stream_follows_state_changes() {
    let backend = MockBackend::new(1_000);
    let player = player_with(&backend, two_lines());
    let mut snapshots = player.snapshots();

    let first = snapshots.next().await.expect("stream ended");
    assert_eq!(first.state, PlaybackState::Idle);

    player.activate().await.unwrap();
    let ready = tokio::time::timeout(WAIT, async {
        while let Some(snapshot) = snapshots.next().await {
            if snapshot.state == PlaybackState::Ready {
                return snapshot;
            }
        }
        panic!("stream ended before Ready");
    })
    .await
    .expect("timed out waiting for Ready");
    assert_eq!(ready.duration_ms, 1_000);
}

#[tokio::test]
async fn test_event_bus_uses_configured_capacity() {
    let config = PlayerConfig {
        event_capacity: 16,
        ..PlayerConfig::default()
    };
    let player = PlayerHandle::spawn(PlayerOptions::new(two_lines()).with_config(config));
    assert_eq!(player.event_bus().capacity(), 16);
}

#[tokio::test]
async fn test_shutdown_stops_player() {
    let backend = MockBackend::new(1_000);
    let player = player_with(&backend, two_lines());

    player.shutdown().await.unwrap();
    settle().await;
    assert!(!player.is_running());
    assert!(matches!(player.play().await, Err(Error::EngineStopped)));
}
