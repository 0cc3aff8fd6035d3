//! Backend command serializer
//!
//! Guarantees that at most one backend operation runs at a time. While an
//! operation is in flight, newly submitted commands wait in a single queue
//! slot; a later command always takes the slot, so two rapid seeks collapse
//! into one seek to the latest target and only the most recent pending
//! command survives.
//!
//! The serializer does not know the playback state. The engine decides which
//! `BackendOp` a command turns into when it is dequeued (a toggle becomes a
//! play or a pause depending on the state at that moment) and calls `begin`.
//!
//! Each command carries an opaque payload (the engine's reply channel) that
//! comes back with its completion or with the displaced notice.

use super::backend::{AudioBackend, BackendError};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Request as submitted by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Prepare,
    Play,
    Pause,
    Toggle,
    Seek(u64),
    Restart,
}

impl Command {
    pub fn kind(self) -> CommandKind {
        match self {
            Command::Prepare => CommandKind::Prepare,
            Command::Play => CommandKind::Play,
            Command::Pause => CommandKind::Pause,
            Command::Toggle => CommandKind::Toggle,
            Command::Seek(_) => CommandKind::Seek,
            Command::Restart => CommandKind::Restart,
        }
    }
}

/// Command without its argument, used for coalescing and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Prepare,
    Play,
    Pause,
    Toggle,
    Seek,
    Restart,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Prepare => "prepare",
            CommandKind::Play => "play",
            CommandKind::Pause => "pause",
            CommandKind::Toggle => "toggle",
            CommandKind::Seek => "seek",
            CommandKind::Restart => "restart",
        };
        f.write_str(name)
    }
}

/// Concrete backend operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOp {
    /// `prepare()` (skipped when already prepared) then `duration_ms()`
    Prepare,
    Play,
    Pause,
    Seek(u64),
    /// `seek(0)` then `play()`
    Restart,
}

impl BackendOp {
    pub fn name(self) -> &'static str {
        match self {
            BackendOp::Prepare => "prepare",
            BackendOp::Play => "play",
            BackendOp::Pause => "pause",
            BackendOp::Seek(_) => "seek",
            BackendOp::Restart => "restart",
        }
    }
}

/// Backend acknowledgement of a completed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Prepared { duration_ms: u64 },
    Done,
}

/// Finished operation, handed back to the engine
pub struct Completed<T> {
    pub op: BackendOp,
    pub command: Command,
    pub payload: T,
    pub result: Result<Ack, BackendError>,
}

/// Queued command pushed out of the slot by a newer one
pub struct Displaced<T> {
    pub command: Command,
    pub payload: T,
    /// Same kind as its replacement
    pub coalesced: bool,
}

/// Outcome of `submit`
pub enum Submission<T> {
    /// Nothing in flight: the caller resolves the command and calls `begin`
    Start(Command, T),
    /// Waiting behind the in-flight operation
    Queued { displaced: Option<Displaced<T>> },
}

/// `submit` before any backend was attached
///
/// Hands the payload back so the caller can answer it.
pub struct Unavailable<T>(pub Command, pub T);

pub struct CommandSerializer<T> {
    backend: Option<Arc<dyn AudioBackend>>,
    in_flight: Option<BoxFuture<'static, Completed<T>>>,
    in_flight_op: Option<BackendOp>,
    queued: Option<(Command, T)>,
}

impl<T: Send + 'static> CommandSerializer<T> {
    pub fn new() -> Self {
        Self {
            backend: None,
            in_flight: None,
            in_flight_op: None,
            queued: None,
        }
    }

    /// Install the backend handle
    pub fn attach(&mut self, backend: Arc<dyn AudioBackend>) {
        self.backend = Some(backend);
    }

    pub fn backend(&self) -> Option<&Arc<dyn AudioBackend>> {
        self.backend.as_ref()
    }

    /// Operation currently executing, if any
    pub fn in_flight(&self) -> Option<BackendOp> {
        self.in_flight_op
    }

    /// Command waiting in the queue slot, if any
    pub fn queued(&self) -> Option<Command> {
        self.queued.as_ref().map(|(command, _)| *command)
    }

    /// Offer a command for execution
    pub fn submit(&mut self, command: Command, payload: T) -> Result<Submission<T>, Unavailable<T>> {
        if self.backend.is_none() {
            return Err(Unavailable(command, payload));
        }

        if self.in_flight.is_none() {
            return Ok(Submission::Start(command, payload));
        }

        let displaced = self
            .queued
            .replace((command, payload))
            .map(|(previous, payload)| Displaced {
                command: previous,
                payload,
                coalesced: previous.kind() == command.kind(),
            });

        if let Some(d) = &displaced {
            if d.coalesced {
                debug!("Coalesced queued {:?} into {:?}", d.command, command);
            } else {
                debug!("Queued {:?} replaced by {:?}", d.command, command);
            }
        }

        Ok(Submission::Queued { displaced })
    }

    /// Take the queued command once nothing is in flight
    pub fn take_queued(&mut self) -> Option<(Command, T)> {
        if self.in_flight.is_some() {
            return None;
        }
        self.queued.take()
    }

    /// Start `op` on the backend
    ///
    /// Must only be called when nothing is in flight and a backend is
    /// attached; otherwise the payload is handed back.
    pub fn begin(&mut self, op: BackendOp, command: Command, payload: T) -> Result<(), T> {
        let backend = match (&self.backend, &self.in_flight) {
            (Some(backend), None) => Arc::clone(backend),
            _ => return Err(payload),
        };

        debug!("Backend {} started", op.name());
        self.in_flight_op = Some(op);
        self.in_flight = Some(
            async move {
                let result = execute(backend.as_ref(), op).await;
                Completed {
                    op,
                    command,
                    payload,
                    result,
                }
            }
            .boxed(),
        );
        Ok(())
    }

    /// Wait for the in-flight operation to finish
    ///
    /// Pending forever while idle. Cancel safe: dropping the returned future
    /// leaves the operation in flight.
    pub async fn next_completion(&mut self) -> Completed<T> {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return std::future::pending().await;
        };
        let completed = in_flight.await;
        self.in_flight = None;
        self.in_flight_op = None;
        completed
    }
}

impl<T: Send + 'static> Default for CommandSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

async fn execute(backend: &dyn AudioBackend, op: BackendOp) -> Result<Ack, BackendError> {
    match op {
        BackendOp::Prepare => {
            if backend.is_prepared() {
                debug!("Backend already prepared");
            } else {
                backend.prepare().await?;
            }
            let duration_ms = backend.duration_ms().await?;
            Ok(Ack::Prepared { duration_ms })
        }
        BackendOp::Play => backend.play().await.map(|_| Ack::Done),
        BackendOp::Pause => backend.pause().await.map(|_| Ack::Done),
        BackendOp::Seek(position_ms) => backend.seek(position_ms).await.map(|_| Ack::Done),
        BackendOp::Restart => {
            backend.seek(0).await?;
            backend.play().await?;
            Ok(Ack::Done)
        }
    }
}
