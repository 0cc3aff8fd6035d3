//! Public player API
//!
//! `PlayerHandle` is a cheap, cloneable front for one player task. Commands
//! are sent the moment they are called, so calls made in sequence reach the
//! player in that order even when their replies are awaited later (or never).

use super::core::{PlayerCore, Request, Responder};
use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::playback::backend::AudioBackend;
use crate::playback::serializer::{Command, CommandSerializer};
use crate::playback::state_machine::PlaybackStateMachine;
use crate::transcript::{ActiveLineCache, RawLine, TranscriptIndex};
use crate::visibility::{Unobservable, VisibilityGate, VisibilitySource};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use stellar_common::{EventBus, InstanceId, InterviewEvent, LineId, PlaybackState};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{info_span, warn, Instrument};

/// How a command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    /// The backend confirmed the operation and the state was updated
    Completed,
    /// Nothing to do in the state the command was applied to
    NoOp,
    /// Replaced by a newer command before it started
    Superseded,
}

/// State published to renderers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerSnapshot {
    pub instance_id: InstanceId,
    pub state: PlaybackState,
    pub current_ms: u64,
    pub duration_ms: u64,
    pub active_line: Option<LineId>,
}

impl PlayerSnapshot {
    fn initial(instance_id: InstanceId) -> Self {
        Self {
            instance_id,
            state: PlaybackState::Idle,
            current_ms: 0,
            duration_ms: 0,
            active_line: None,
        }
    }
}

/// Pending reply to a request
///
/// Resolves to `Error::EngineStopped` if the player task is gone.
#[must_use = "dropping the reply does not cancel the command"]
pub struct CommandReply<T = CommandOutcome> {
    rx: Option<oneshot::Receiver<Result<T>>>,
}

impl<T> Future for CommandReply<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.get_mut().rx.as_mut() {
            Some(rx) => Pin::new(rx)
                .poll(cx)
                .map(|reply| reply.unwrap_or(Err(Error::EngineStopped))),
            None => Poll::Ready(Err(Error::EngineStopped)),
        }
    }
}

/// Everything needed to start a player
pub struct PlayerOptions {
    pub instance_id: InstanceId,
    pub config: PlayerConfig,
    pub transcript: Vec<RawLine>,
    pub visibility: Arc<dyn VisibilitySource>,
    pub backend: Option<Arc<dyn AudioBackend>>,
}

impl PlayerOptions {
    /// Defaults: fresh instance id, no visibility support, no backend yet
    pub fn new(transcript: Vec<RawLine>) -> Self {
        Self {
            instance_id: InstanceId::new(),
            config: PlayerConfig::default(),
            transcript,
            visibility: Arc::new(Unobservable),
            backend: None,
        }
    }

    pub fn with_config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_visibility(mut self, visibility: Arc<dyn VisibilitySource>) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn AudioBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_instance_id(mut self, instance_id: InstanceId) -> Self {
        self.instance_id = instance_id;
        self
    }
}

#[derive(Clone)]
pub struct PlayerHandle {
    instance_id: InstanceId,
    requests: mpsc::UnboundedSender<Request>,
    snapshots: watch::Receiver<PlayerSnapshot>,
    events: EventBus,
    transcript: Option<Arc<TranscriptIndex>>,
    transcript_error: Option<Arc<str>>,
}

impl PlayerHandle {
    /// Build the transcript index and start the player task
    ///
    /// A malformed transcript does not prevent playback; the player runs
    /// without line highlighting and reports the problem as an event.
    /// Must be called from within a tokio runtime.
    pub fn spawn(options: PlayerOptions) -> Self {
        let PlayerOptions {
            instance_id,
            config,
            transcript,
            visibility,
            backend,
        } = options;

        let events = EventBus::new(config.event_capacity.max(1));

        let (transcript, transcript_error) = match TranscriptIndex::build(transcript) {
            Ok(index) => (Some(Arc::new(index)), None),
            Err(e) => {
                warn!(
                    "Transcript rejected for player {}: {}; highlighting disabled",
                    instance_id.short(),
                    e
                );
                events.emit_lossy(InterviewEvent::TranscriptRejected {
                    instance_id,
                    reason: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                (None, Some(Arc::from(e.to_string())))
            }
        };

        let visibility_rx = visibility.subscribe(instance_id);
        let gate = VisibilityGate::new(visibility_rx.is_some(), config.activate_on_visible);

        let (requests, request_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshots) = watch::channel(PlayerSnapshot::initial(instance_id));

        let mut core = PlayerCore {
            instance_id,
            config,
            machine: PlaybackStateMachine::new(),
            serializer: CommandSerializer::new(),
            cache: transcript.clone().map(ActiveLineCache::new),
            gate,
            visibility,
            visibility_rx,
            time_rx: None,
            requests: request_rx,
            events: events.clone(),
            snapshot_tx,
            active_line: None,
            deferred_seek_reply: None,
            deferred_action_reply: None,
            outbox: Vec::new(),
        };
        if let Some(backend) = backend {
            core.attach(backend);
        }

        let span = info_span!("interview", instance = %instance_id.short());
        tokio::spawn(core.run().instrument(span));

        Self {
            instance_id,
            requests,
            snapshots,
            events,
            transcript,
            transcript_error,
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// Attach the audio backend; commands before this fail as unavailable
    pub fn attach(&self, backend: Arc<dyn AudioBackend>) -> CommandReply<()> {
        self.request(|reply| Request::Attach { backend, reply })
    }

    /// Prepare the backend without starting playback
    pub fn activate(&self) -> CommandReply {
        self.request(Request::Activate)
    }

    pub fn play(&self) -> CommandReply {
        self.command(Command::Play)
    }

    pub fn pause(&self) -> CommandReply {
        self.command(Command::Pause)
    }

    pub fn toggle(&self) -> CommandReply {
        self.command(Command::Toggle)
    }

    pub fn seek(&self, position_ms: u64) -> CommandReply {
        self.command(Command::Seek(position_ms))
    }

    /// Rewind to the start and play
    pub fn restart(&self) -> CommandReply {
        self.command(Command::Restart)
    }

    /// User click on the player: restart at end of content, otherwise toggle
    pub fn click(&self) -> CommandReply {
        self.request(Request::Click)
    }

    /// Stop the player task
    pub fn shutdown(&self) -> CommandReply<()> {
        self.request(Request::Shutdown)
    }

    /// Latest published state
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Watch receiver for snapshot changes
    pub fn watch(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshots.clone()
    }

    /// Snapshot changes as a stream (starts with the current snapshot)
    pub fn snapshots(&self) -> WatchStream<PlayerSnapshot> {
        WatchStream::new(self.snapshots.clone())
    }

    /// Subscribe to player events
    pub fn events(&self) -> broadcast::Receiver<InterviewEvent> {
        self.events.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    /// Transcript index, None when the transcript was rejected
    pub fn transcript(&self) -> Option<&Arc<TranscriptIndex>> {
        self.transcript.as_ref()
    }

    /// Why the transcript was rejected, if it was
    pub fn transcript_error(&self) -> Option<&str> {
        self.transcript_error.as_deref()
    }

    /// Whether the player task is still running
    pub fn is_running(&self) -> bool {
        !self.requests.is_closed()
    }

    fn command(&self, command: Command) -> CommandReply {
        self.request(|reply| Request::Command { command, reply })
    }

    fn request<T>(&self, make: impl FnOnce(Responder<T>) -> Request) -> CommandReply<T> {
        let (tx, rx) = oneshot::channel();
        match self.requests.send(make(tx)) {
            Ok(()) => CommandReply { rx: Some(rx) },
            Err(_) => CommandReply { rx: None },
        }
    }
}
