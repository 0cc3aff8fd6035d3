//! Player task - owns all mutable playback state
//!
//! **Responsibilities:**
//! - Receives requests from `PlayerHandle`s over a channel
//! - Drives the backend through `CommandSerializer` (one op in flight)
//! - Applies completions and time updates to `PlaybackStateMachine`
//! - Reacts to visibility signals through `VisibilityGate`
//! - Publishes state/clock/line changes as events and watch snapshots
//!
//! Nothing else mutates the state machine or the clock: every change flows
//! through `run()`, one event at a time.

use super::handle::{CommandOutcome, PlayerSnapshot};
use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::playback::backend::{AudioBackend, BackendError, TimeUpdate};
use crate::playback::serializer::{
    Ack, BackendOp, Command, CommandSerializer, Completed, Submission, Unavailable,
};
use crate::playback::state_machine::{DeferredAction, PlaybackStateMachine, StateChange};
use crate::transcript::ActiveLineCache;
use crate::visibility::{GateAction, VisibilityGate, VisibilitySource};
use std::sync::Arc;
use stellar_common::{EventBus, InstanceId, InterviewEvent, LineId, PlaybackState};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};

pub(super) type Responder<T> = oneshot::Sender<Result<T>>;

/// Reply channel travelling with a command; None for internal commands
type Reply = Option<Responder<CommandOutcome>>;

/// Messages from handles to the player task
pub(super) enum Request {
    Attach {
        backend: Arc<dyn AudioBackend>,
        reply: Responder<()>,
    },
    Activate(Responder<CommandOutcome>),
    Command {
        command: Command,
        reply: Responder<CommandOutcome>,
    },
    Click(Responder<CommandOutcome>),
    Shutdown(Responder<()>),
}

pub(super) struct PlayerCore {
    pub(super) instance_id: InstanceId,
    pub(super) config: PlayerConfig,
    pub(super) machine: PlaybackStateMachine,
    pub(super) serializer: CommandSerializer<Reply>,
    pub(super) cache: Option<ActiveLineCache>,
    pub(super) gate: VisibilityGate,
    pub(super) visibility: Arc<dyn VisibilitySource>,
    pub(super) visibility_rx: Option<mpsc::UnboundedReceiver<bool>>,
    pub(super) time_rx: Option<broadcast::Receiver<TimeUpdate>>,
    pub(super) requests: mpsc::UnboundedReceiver<Request>,
    pub(super) events: EventBus,
    pub(super) snapshot_tx: watch::Sender<PlayerSnapshot>,
    pub(super) active_line: Option<LineId>,
    pub(super) deferred_seek_reply: Reply,
    pub(super) deferred_action_reply: Reply,
    /// Replies held back until the snapshot reflects their effect
    pub(super) outbox: Vec<(Responder<CommandOutcome>, Result<CommandOutcome>)>,
}

impl PlayerCore {
    /// Event loop; returns when shut down or when every handle is dropped
    pub(super) async fn run(mut self) {
        info!(
            "Interview player started (visibility {})",
            if self.gate.degraded() { "unsupported" } else { "observed" }
        );
        self.publish();

        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(Request::Shutdown(reply)) => {
                        let _ = reply.send(Ok(()));
                        break;
                    }
                    Some(request) => self.handle_request(request),
                    None => {
                        debug!("All player handles dropped");
                        break;
                    }
                },
                completed = self.serializer.next_completion() => self.on_completed(completed),
                update = next_time_update(&mut self.time_rx) => match update {
                    Some(update) => self.on_time_update(update),
                    None => {
                        warn!("Backend time updates closed");
                        self.time_rx = None;
                    }
                },
                signal = next_signal(&mut self.visibility_rx) => match signal {
                    Some(visible) => self.on_visibility(visible),
                    None => {
                        debug!("Visibility source closed");
                        self.visibility_rx = None;
                    }
                },
            }

            self.publish();
        }

        self.visibility.unsubscribe(self.instance_id);
        info!("Interview player stopped");
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Attach { backend, reply } => {
                self.attach(backend);
                let _ = reply.send(Ok(()));
            }
            Request::Activate(reply) => self.begin_activation(Some(reply)),
            Request::Command { command, reply } => self.submit_user(command, reply),
            Request::Click(reply) => self.click(reply),
            Request::Shutdown(reply) => {
                // Handled by run(); answered here only if routed directly
                let _ = reply.send(Ok(()));
            }
        }
    }

    /// Install the backend and start listening to its time updates
    ///
    /// Activation requested before the backend existed starts now.
    pub(super) fn attach(&mut self, backend: Arc<dyn AudioBackend>) {
        if let Some(op) = self.serializer.in_flight() {
            match self.serializer.queued() {
                Some(next) => warn!(
                    "Backend replaced while {} is in flight ({} queued)",
                    op.name(),
                    next.kind()
                ),
                None => warn!("Backend replaced while {} is in flight", op.name()),
            }
        }
        self.time_rx = Some(backend.time_updates());
        self.serializer.attach(backend);
        info!("Audio backend attached");

        if self.gate.activation_requested() && self.machine.state() == PlaybackState::Idle {
            debug!("Starting activation requested before attach");
            self.begin_activation(None);
        }
    }

    /// `Idle → Loading` and submit the backend prepare
    fn begin_activation(&mut self, reply: Reply) {
        if self.serializer.backend().is_none() {
            self.respond(reply, Err(unavailable(Command::Prepare)));
            return;
        }

        if self.machine.state() != PlaybackState::Idle {
            self.respond(reply, Ok(CommandOutcome::NoOp));
            return;
        }

        self.machine.activate();
        self.gate.note_activation();
        info!("Activating audio backend");
        self.submit(Command::Prepare, reply);
    }

    /// Explicit play/pause/toggle/seek/restart from a handle
    fn submit_user(&mut self, command: Command, reply: Responder<CommandOutcome>) {
        if self.serializer.backend().is_none() {
            self.respond(Some(reply), Err(unavailable(command)));
            return;
        }

        if command == Command::Prepare {
            self.begin_activation(Some(reply));
        } else if self.machine.state().is_prepared() {
            self.submit(command, Some(reply));
        } else {
            self.defer(command, reply);
        }
    }

    /// Record a command issued before the backend is ready
    ///
    /// Only the latest deferred seek and the latest deferred play/toggle
    /// survive; replies of superseded ones are answered right away.
    fn defer(&mut self, command: Command, reply: Responder<CommandOutcome>) {
        let was_idle = self.machine.state() == PlaybackState::Idle;

        match command {
            Command::Pause => {
                self.machine.pause();
                let cancelled = self.deferred_action_reply.take();
                self.supersede(cancelled);
                self.respond(Some(reply), Ok(CommandOutcome::NoOp));
                return;
            }
            Command::Seek(position_ms) => {
                self.machine.seek(position_ms);
                let previous = self.deferred_seek_reply.replace(reply);
                self.supersede(previous);
                if was_idle {
                    self.on_interaction();
                }
                return;
            }
            Command::Play => {
                self.machine.play();
            }
            Command::Toggle => {
                self.machine.toggle();
            }
            Command::Restart => {
                self.machine.seek(0);
                let previous = self.deferred_seek_reply.take();
                self.supersede(previous);
                self.machine.play();
            }
            Command::Prepare => {
                self.begin_activation(Some(reply));
                return;
            }
        }

        debug!("{} deferred until backend is ready", command.kind());
        let previous = self.deferred_action_reply.replace(reply);
        self.supersede(previous);

        if was_idle {
            // play()/toggle() moved the machine to Loading
            self.gate.note_activation();
            info!("Activating audio backend");
            self.submit(Command::Prepare, None);
        }
    }

    fn click(&mut self, reply: Responder<CommandOutcome>) {
        if self.serializer.backend().is_none() {
            self.respond(Some(reply), Err(unavailable(Command::Toggle)));
            return;
        }

        let command = if self.config.restart_at_end
            && self.machine.state().is_prepared()
            && self.machine.at_end()
        {
            Command::Restart
        } else {
            Command::Toggle
        };
        self.submit_user(command, reply);
    }

    /// Explicit user request that does not start activation by itself
    ///
    /// The first interaction activates a player nobody else activated; a later
    /// one retries after a failed prepare left the player `Idle`.
    fn on_interaction(&mut self) {
        let action = self.gate.on_interaction();
        let idle = self.machine.state() == PlaybackState::Idle;
        match action {
            GateAction::Activate => {
                debug!("User interaction activates the player");
                self.begin_activation(None);
            }
            GateAction::None if idle => {
                debug!("User interaction retries activation");
                self.begin_activation(None);
            }
            GateAction::None | GateAction::Pause => {}
        }
    }

    /// Hand a command to the serializer
    fn submit(&mut self, command: Command, reply: Reply) {
        match self.serializer.submit(command, reply) {
            Ok(Submission::Start(command, reply)) => self.start(command, reply),
            Ok(Submission::Queued { displaced }) => {
                if let Some(displaced) = displaced {
                    self.supersede(displaced.payload);
                }
            }
            Err(Unavailable(command, reply)) => self.respond(reply, Err(unavailable(command))),
        }
    }

    /// Resolve a command against the current state and begin it
    fn start(&mut self, command: Command, reply: Reply) {
        let Some(op) = self.resolve(command) else {
            debug!(
                "{} is a no-op in state {}",
                command.kind(),
                self.machine.state()
            );
            self.respond(reply, Ok(CommandOutcome::NoOp));
            return;
        };

        if let Err(reply) = self.serializer.begin(op, command, reply) {
            self.respond(reply, Err(unavailable(command)));
        }
    }

    /// Backend operation for a command, or None when it would change nothing
    fn resolve(&self, command: Command) -> Option<BackendOp> {
        let state = self.machine.state();
        if command != Command::Prepare && !state.is_prepared() {
            return None;
        }

        match command {
            Command::Prepare => Some(BackendOp::Prepare),
            Command::Play => (state != PlaybackState::Playing).then_some(BackendOp::Play),
            Command::Pause => (state == PlaybackState::Playing).then_some(BackendOp::Pause),
            Command::Toggle if state == PlaybackState::Playing => Some(BackendOp::Pause),
            Command::Toggle => Some(BackendOp::Play),
            Command::Seek(position_ms) => Some(BackendOp::Seek(self.machine.clamp(position_ms))),
            Command::Restart => Some(BackendOp::Restart),
        }
    }

    fn on_completed(&mut self, completed: Completed<Reply>) {
        let Completed {
            op,
            command,
            payload,
            result,
        } = completed;

        match result {
            Ok(Ack::Prepared { duration_ms }) => {
                self.machine.mark_prepared(duration_ms);
                info!("Audio backend ready ({}ms)", duration_ms);
                self.respond(payload, Ok(CommandOutcome::Completed));
                self.apply_deferred();
            }
            Ok(Ack::Done) => {
                trace!("Backend {} acknowledged", op.name());
                self.apply(op);
                self.respond(payload, Ok(CommandOutcome::Completed));
            }
            Err(error) => {
                warn!("Backend {} failed ({}): {}", op.name(), command.kind(), error);
                self.events.emit_lossy(InterviewEvent::CommandFailed {
                    instance_id: self.instance_id,
                    command: op.name().to_string(),
                    error: error.to_string(),
                    timestamp: chrono::Utc::now(),
                });

                if op == BackendOp::Prepare {
                    self.machine.activation_failed();
                    let seek_reply = self.deferred_seek_reply.take();
                    let action_reply = self.deferred_action_reply.take();
                    self.fail(seek_reply, op, &error);
                    self.fail(action_reply, op, &error);
                }

                self.respond(
                    payload,
                    Err(Error::BackendOperation {
                        operation: op.name(),
                        source: error,
                    }),
                );
            }
        }

        if let Some((command, reply)) = self.serializer.take_queued() {
            self.start(command, reply);
        }
    }

    /// Submit the seek and play/toggle recorded while loading
    fn apply_deferred(&mut self) {
        let (seek, action) = self.machine.take_deferred();

        if let Some(position_ms) = seek {
            let reply = self.deferred_seek_reply.take();
            self.submit(Command::Seek(position_ms), reply);
        }
        if let Some(action) = action {
            let command = match action {
                DeferredAction::Play => Command::Play,
                DeferredAction::Toggle => Command::Toggle,
            };
            let reply = self.deferred_action_reply.take();
            self.submit(command, reply);
        }

        let leftover = (self.deferred_seek_reply.take(), self.deferred_action_reply.take());
        self.respond(leftover.0, Ok(CommandOutcome::NoOp));
        self.respond(leftover.1, Ok(CommandOutcome::NoOp));
    }

    /// Advance the state machine for a confirmed operation
    fn apply(&mut self, op: BackendOp) {
        match op {
            BackendOp::Prepare => {}
            BackendOp::Play => {
                self.machine.play();
            }
            BackendOp::Pause => {
                self.machine.pause();
            }
            BackendOp::Seek(position_ms) => {
                self.machine.seek(position_ms);
            }
            BackendOp::Restart => {
                self.machine.seek(0);
                self.machine.play();
            }
        }
    }

    fn on_time_update(&mut self, update: TimeUpdate) {
        trace!("Time update {}ms / {}ms", update.current_ms, update.duration_ms);
        self.machine.time_update(update.current_ms, update.duration_ms);
    }

    fn on_visibility(&mut self, visible: bool) {
        let changed = self.gate.visible() != Some(visible);
        let action = self.gate.on_signal(visible);

        if changed {
            debug!("Visibility changed: {}", visible);
            self.events.emit_lossy(InterviewEvent::VisibilityChanged {
                instance_id: self.instance_id,
                visible,
                timestamp: chrono::Utc::now(),
            });
        }

        match action {
            GateAction::Activate if self.serializer.backend().is_none() => {
                debug!("Visible before backend attach; activation pending");
            }
            GateAction::Activate => self.begin_activation(None),
            GateAction::Pause if self.machine.state() == PlaybackState::Playing => {
                debug!("Hidden while playing; pausing");
                self.submit(Command::Pause, None);
            }
            GateAction::Pause | GateAction::None => {}
        }
    }

    /// Emit events for recorded changes and refresh the snapshot
    fn publish(&mut self) {
        let now = chrono::Utc::now();

        for change in self.machine.take_changes() {
            match change {
                StateChange::State { old, new } => {
                    info!("Playback state: {} -> {}", old, new);
                    self.events.emit_lossy(InterviewEvent::PlaybackStateChanged {
                        instance_id: self.instance_id,
                        old_state: old,
                        new_state: new,
                        timestamp: now,
                    });
                }
                StateChange::Clock(clock) => {
                    self.events.emit_lossy(InterviewEvent::PlaybackProgress {
                        instance_id: self.instance_id,
                        current_ms: clock.current_ms,
                        duration_ms: clock.duration_ms,
                        timestamp: now,
                    });
                }
            }
        }

        let clock = self.machine.clock();
        let active_line = match self.cache.as_mut() {
            Some(cache) => {
                cache.set_content_end(clock.duration_ms);
                cache.active_line(clock.current_ms)
            }
            None => None,
        };

        if active_line != self.active_line {
            debug!(
                "Active line: {}",
                active_line.map_or_else(|| "none".to_string(), |l| l.to_string())
            );
            self.active_line = active_line;
            self.events.emit_lossy(InterviewEvent::ActiveLineChanged {
                instance_id: self.instance_id,
                line: active_line,
                timestamp: now,
            });
        }

        let snapshot = PlayerSnapshot {
            instance_id: self.instance_id,
            state: self.machine.state(),
            current_ms: clock.current_ms,
            duration_ms: clock.duration_ms,
            active_line,
        };
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });

        for (reply, result) in self.outbox.drain(..) {
            let _ = reply.send(result);
        }
    }

    fn respond(&mut self, reply: Reply, result: Result<CommandOutcome>) {
        if let Some(reply) = reply {
            self.outbox.push((reply, result));
        }
    }

    fn supersede(&mut self, reply: Reply) {
        self.respond(reply, Ok(CommandOutcome::Superseded));
    }

    fn fail(&mut self, reply: Reply, op: BackendOp, error: &BackendError) {
        self.respond(
            reply,
            Err(Error::BackendOperation {
                operation: op.name(),
                source: error.clone(),
            }),
        );
    }
}

/// Next time update; skips lag notices, None once the backend is gone
async fn next_time_update(rx: &mut Option<broadcast::Receiver<TimeUpdate>>) -> Option<TimeUpdate> {
    let Some(rx) = rx.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match rx.recv().await {
            Ok(update) => return Some(update),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Skipped {} stale time updates", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

async fn next_signal(rx: &mut Option<mpsc::UnboundedReceiver<bool>>) -> Option<bool> {
    match rx.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn unavailable(command: Command) -> Error {
    Error::BackendUnavailable(format!(
        "{} issued before an audio backend was attached",
        command.kind()
    ))
}
