//! Visibility-gated activation
//!
//! The backend is expensive to prepare, so a player only activates once its
//! hosting element has been on screen. Leaving the screen pauses playback
//! but never tears the prepared backend down.
//!
//! **Sources:**
//! - `ManualVisibility`: host-driven signals (HTTP `POST /visibility`, tests)
//! - `Unobservable`: no visibility support; the gate degrades to activating
//!   on the first explicit user interaction

use std::collections::HashMap;
use std::sync::Mutex;
use stellar_common::InstanceId;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Environment facility reporting whether a player is on screen
pub trait VisibilitySource: Send + Sync {
    /// Start receiving visibility signals for `instance`
    ///
    /// Returns None when the environment cannot observe visibility.
    fn subscribe(&self, instance: InstanceId) -> Option<mpsc::UnboundedReceiver<bool>>;

    /// Stop delivering signals for `instance`
    fn unsubscribe(&self, instance: InstanceId);
}

/// Environment without visibility observation
#[derive(Debug, Default, Clone, Copy)]
pub struct Unobservable;

impl VisibilitySource for Unobservable {
    fn subscribe(&self, _instance: InstanceId) -> Option<mpsc::UnboundedReceiver<bool>> {
        None
    }

    fn unsubscribe(&self, _instance: InstanceId) {}
}

/// Visibility reported explicitly by the host
#[derive(Debug, Default)]
pub struct ManualVisibility {
    subscribers: Mutex<HashMap<InstanceId, mpsc::UnboundedSender<bool>>>,
}

impl ManualVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report visibility for one instance
    ///
    /// Returns false when the instance is not subscribed.
    pub fn set_visible(&self, instance: InstanceId, visible: bool) -> bool {
        let mut subscribers = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let delivered = match subscribers.get(&instance) {
            Some(tx) => tx.send(visible).is_ok(),
            None => return false,
        };
        if !delivered {
            debug!("Visibility subscriber {} is gone", instance.short());
            subscribers.remove(&instance);
        }
        delivered
    }

    /// Report visibility for every subscribed instance
    pub fn broadcast(&self, visible: bool) -> usize {
        let mut subscribers = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subscribers.retain(|_, tx| tx.send(visible).is_ok());
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl VisibilitySource for ManualVisibility {
    fn subscribe(&self, instance: InstanceId) -> Option<mpsc::UnboundedReceiver<bool>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscribers = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if subscribers.insert(instance, tx).is_some() {
            warn!("Instance {} subscribed twice; previous stream closed", instance.short());
        }
        Some(rx)
    }

    fn unsubscribe(&self, instance: InstanceId) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.remove(&instance);
        }
    }
}

/// What the engine should do after a visibility signal or interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    Activate,
    Pause,
    None,
}

/// Turns raw visibility signals into activation and pause requests
#[derive(Debug)]
pub struct VisibilityGate {
    supported: bool,
    activate_on_visible: bool,
    visible: Option<bool>,
    activation_requested: bool,
}

impl VisibilityGate {
    pub fn new(supported: bool, activate_on_visible: bool) -> Self {
        Self {
            supported,
            activate_on_visible,
            visible: None,
            activation_requested: false,
        }
    }

    /// No visibility support: activation waits for a user interaction
    pub fn degraded(&self) -> bool {
        !self.supported
    }

    pub fn visible(&self) -> Option<bool> {
        self.visible
    }

    pub fn activation_requested(&self) -> bool {
        self.activation_requested
    }

    /// Process a visibility signal
    ///
    /// Repeated identical signals are ignored. An initial "not visible"
    /// only records the state; there is nothing to pause yet.
    pub fn on_signal(&mut self, visible: bool) -> GateAction {
        let previous = self.visible.replace(visible);
        if previous == Some(visible) {
            return GateAction::None;
        }

        match (visible, previous) {
            (true, _) if self.activate_on_visible && !self.activation_requested => {
                self.activation_requested = true;
                GateAction::Activate
            }
            (true, _) => GateAction::None,
            (false, None) => GateAction::None,
            (false, Some(_)) => GateAction::Pause,
        }
    }

    /// Record that activation was started by some other trigger
    pub fn note_activation(&mut self) {
        self.activation_requested = true;
    }

    /// Process an explicit user interaction
    ///
    /// Returns `Activate` the first time when no other trigger has fired.
    pub fn on_interaction(&mut self) -> GateAction {
        if self.activation_requested {
            return GateAction::None;
        }
        self.activation_requested = true;
        GateAction::Activate
    }
}
