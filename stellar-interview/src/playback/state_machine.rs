//! Playback state machine
//!
//! Owns the canonical `PlaybackState` and the playback clock. It performs no
//! I/O: the engine calls it when the backend confirms an operation or
//! reports a time update, then drains the recorded changes into events.
//!
//! ```text
//! Idle ──activate──▶ Loading ──prepared──▶ Ready ──play──▶ Playing
//!   ▲                   │                                  │    ▲
//!   └──prepare failed───┘                             pause│    │play
//!                                                          ▼    │
//!                                                          Paused
//! ```
//!
//! Commands issued before `Ready` never jump ahead: a play request in `Idle`
//! starts activation and is kept as a deferred action, applied once the
//! backend is prepared. The same holds for seeks (latest target wins).

use stellar_common::PlaybackState;
use tracing::debug;

/// Playback clock in milliseconds
///
/// `current_ms <= duration_ms` whenever the duration is known (non-zero).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clock {
    pub current_ms: u64,
    pub duration_ms: u64,
}

/// Play-type request recorded before the backend was ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    Play,
    Toggle,
}

/// Result of applying a request to the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// State or clock changed
    Applied,
    /// Nothing to do in the current state
    NoOp,
    /// Stored until the machine reaches `Ready`
    Deferred,
}

/// Recorded change, drained by the engine after each step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    State {
        old: PlaybackState,
        new: PlaybackState,
    },
    Clock(Clock),
}

#[derive(Debug, Default)]
pub struct PlaybackStateMachine {
    state: PlaybackState,
    clock: Clock,
    deferred_seek: Option<u64>,
    deferred_action: Option<DeferredAction>,
    changes: Vec<StateChange>,
}

impl PlaybackStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// `Idle → Loading`; no-op once activation has started
    pub fn activate(&mut self) -> Transition {
        if self.state != PlaybackState::Idle {
            return Transition::NoOp;
        }
        self.set_state(PlaybackState::Loading);
        Transition::Applied
    }

    /// Backend finished preparing: `Loading → Ready`
    pub fn mark_prepared(&mut self, duration_ms: u64) -> Transition {
        if self.state != PlaybackState::Loading {
            return Transition::NoOp;
        }
        if duration_ms > 0 {
            self.set_clock(self.clock.current_ms.min(duration_ms), duration_ms);
        }
        self.set_state(PlaybackState::Ready);
        Transition::Applied
    }

    /// Backend preparation failed: `Loading → Idle`
    ///
    /// Deferred requests are dropped so a later activation starts clean.
    pub fn activation_failed(&mut self) -> Transition {
        if self.state != PlaybackState::Loading {
            return Transition::NoOp;
        }
        self.deferred_seek = None;
        self.deferred_action = None;
        self.set_state(PlaybackState::Idle);
        Transition::Applied
    }

    /// `Ready | Paused → Playing`
    ///
    /// Before `Ready` the request is deferred and activation is started.
    pub fn play(&mut self) -> Transition {
        match self.state {
            PlaybackState::Idle | PlaybackState::Loading => self.defer(DeferredAction::Play),
            PlaybackState::Playing => Transition::NoOp,
            PlaybackState::Ready | PlaybackState::Paused => {
                self.set_state(PlaybackState::Playing);
                Transition::Applied
            }
        }
    }

    /// `Playing → Paused`; no-op in every other state
    ///
    /// A pause before `Ready` cancels a deferred play or toggle.
    pub fn pause(&mut self) -> Transition {
        match self.state {
            PlaybackState::Playing => {
                self.set_state(PlaybackState::Paused);
                Transition::Applied
            }
            PlaybackState::Idle | PlaybackState::Loading => {
                if self.deferred_action.take().is_some() {
                    debug!("Pause cancelled deferred play request");
                }
                Transition::NoOp
            }
            PlaybackState::Ready | PlaybackState::Paused => Transition::NoOp,
        }
    }

    /// Play when not playing, pause when playing
    pub fn toggle(&mut self) -> Transition {
        match self.state {
            PlaybackState::Idle | PlaybackState::Loading => self.defer(DeferredAction::Toggle),
            PlaybackState::Playing => self.pause(),
            PlaybackState::Ready | PlaybackState::Paused => self.play(),
        }
    }

    /// Move the clock; deferred (latest wins) until the backend is prepared
    ///
    /// Seeking to the end while playing is end of content.
    pub fn seek(&mut self, position_ms: u64) -> Transition {
        if !self.state.is_prepared() {
            if let Some(previous) = self.deferred_seek.replace(position_ms) {
                debug!("Deferred seek {}ms superseded by {}ms", previous, position_ms);
            }
            return Transition::Deferred;
        }

        let current_ms = self.clamp(position_ms);
        self.set_clock(current_ms, self.clock.duration_ms);
        self.check_end_of_content();
        Transition::Applied
    }

    /// Apply a backend time update
    ///
    /// A zero duration in the update keeps the duration already known.
    pub fn time_update(&mut self, current_ms: u64, duration_ms: u64) -> Transition {
        let duration_ms = if duration_ms > 0 {
            duration_ms
        } else {
            self.clock.duration_ms
        };
        let current_ms = if duration_ms > 0 {
            current_ms.min(duration_ms)
        } else {
            current_ms
        };

        let before = (self.clock, self.state);
        self.set_clock(current_ms, duration_ms);
        self.check_end_of_content();

        if (self.clock, self.state) == before {
            Transition::NoOp
        } else {
            Transition::Applied
        }
    }

    /// Clock is at the end of known content
    pub fn at_end(&self) -> bool {
        self.clock.duration_ms > 0 && self.clock.current_ms >= self.clock.duration_ms
    }

    /// Clamp a requested position to the known duration
    pub fn clamp(&self, position_ms: u64) -> u64 {
        if self.clock.duration_ms > 0 {
            position_ms.min(self.clock.duration_ms)
        } else {
            position_ms
        }
    }

    /// Take the deferred seek target and action, if any
    pub fn take_deferred(&mut self) -> (Option<u64>, Option<DeferredAction>) {
        (self.deferred_seek.take(), self.deferred_action.take())
    }

    pub fn has_deferred_action(&self) -> bool {
        self.deferred_action.is_some()
    }

    /// Drain the changes recorded since the last call
    pub fn take_changes(&mut self) -> Vec<StateChange> {
        std::mem::take(&mut self.changes)
    }

    fn defer(&mut self, action: DeferredAction) -> Transition {
        self.deferred_action = Some(action);
        self.activate();
        Transition::Deferred
    }

    fn check_end_of_content(&mut self) {
        if self.state == PlaybackState::Playing && self.at_end() {
            debug!("End of content at {}ms", self.clock.current_ms);
            self.set_state(PlaybackState::Paused);
        }
    }

    fn set_state(&mut self, new: PlaybackState) {
        let old = self.state;
        if old != new {
            self.state = new;
            self.changes.push(StateChange::State { old, new });
        }
    }

    fn set_clock(&mut self, current_ms: u64, duration_ms: u64) {
        let clock = Clock {
            current_ms,
            duration_ms,
        };
        if clock != self.clock {
            self.clock = clock;
            self.changes.push(StateChange::Clock(clock));
        }
    }
}
