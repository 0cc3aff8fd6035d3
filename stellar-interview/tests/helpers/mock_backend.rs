//! Scriptable audio backend for engine tests
//!
//! - Every call is recorded in order (`calls()`)
//! - `hold(op)` keeps the next calls of that operation in flight until
//!   `release(op)` hands out a permit
//! - `fail(op, msg)` makes the operation reject until `clear_failure(op)`
//! - `emit(current, duration)` pushes a time update to the engine

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stellar_interview::playback::{AudioBackend, BackendError, TimeUpdate};
use tokio::sync::{broadcast, Notify, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Prepare,
    Play,
    Pause,
    Seek(u64),
    Duration,
}

pub struct MockBackend {
    duration_ms: u64,
    prepared: AtomicBool,
    calls: Mutex<Vec<Call>>,
    holds: Mutex<HashMap<&'static str, Arc<Semaphore>>>,
    failures: Mutex<HashMap<&'static str, String>>,
    updates: broadcast::Sender<TimeUpdate>,
    called: Notify,
}

impl MockBackend {
    pub fn new(duration_ms: u64) -> Arc<Self> {
        let (updates, _) = broadcast::channel(64);
        Arc::new(Self {
            duration_ms,
            prepared: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            holds: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            updates,
            called: Notify::new(),
        })
    }

    /// Keep calls of `op` ("prepare", "play", "pause", "seek") in flight
    pub fn hold(&self, op: &'static str) {
        self.holds
            .lock()
            .unwrap()
            .insert(op, Arc::new(Semaphore::new(0)));
    }

    /// Let one held call of `op` finish
    pub fn release(&self, op: &'static str) {
        if let Some(gate) = self.holds.lock().unwrap().get(op) {
            gate.add_permits(1);
        }
    }

    pub fn fail(&self, op: &'static str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(op, message.to_string());
    }

    /// Behave as if a previous owner already prepared the backend
    pub fn prepare_now(&self) {
        self.prepared.store(true, Ordering::SeqCst);
    }

    pub fn clear_failure(&self, op: &'static str) {
        self.failures.lock().unwrap().remove(op);
    }

    /// All calls, including duration queries
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that drive playback (duration queries left out)
    pub fn transport_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| *c != Call::Duration)
            .collect()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    pub fn seeks(&self) -> Vec<u64> {
        self.calls()
            .iter()
            .filter_map(|c| match c {
                Call::Seek(ms) => Some(*ms),
                _ => None,
            })
            .collect()
    }

    /// Wait until `call` has been made at least `times` times
    pub async fn wait_for(&self, call: Call, times: usize) {
        let waited = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.called.notified();
                if self.count(call) >= times {
                    return;
                }
                notified.await;
            }
        })
        .await;
        assert!(
            waited.is_ok(),
            "timed out waiting for {:?} x{}; calls so far: {:?}",
            call,
            times,
            self.calls()
        );
    }

    /// Push a time update to listeners
    pub fn emit(&self, current_ms: u64, duration_ms: u64) {
        let _ = self.updates.send(TimeUpdate {
            current_ms,
            duration_ms,
        });
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
        self.called.notify_waiters();
    }

    async fn step(&self, op: &'static str, call: Call) -> Result<(), BackendError> {
        self.record(call);

        let gate = self.holds.lock().unwrap().get(op).cloned();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        let failure = self.failures.lock().unwrap().get(op).cloned();
        match failure {
            Some(message) => Err(BackendError::new(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AudioBackend for MockBackend {
    async fn prepare(&self) -> Result<(), BackendError> {
        self.step("prepare", Call::Prepare).await?;
        self.prepared.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn play(&self) -> Result<(), BackendError> {
        self.step("play", Call::Play).await
    }

    async fn pause(&self) -> Result<(), BackendError> {
        self.step("pause", Call::Pause).await
    }

    async fn seek(&self, position_ms: u64) -> Result<(), BackendError> {
        self.step("seek", Call::Seek(position_ms)).await
    }

    fn is_prepared(&self) -> bool {
        self.prepared.load(Ordering::SeqCst)
    }

    async fn duration_ms(&self) -> Result<u64, BackendError> {
        self.record(Call::Duration);
        Ok(self.duration_ms)
    }

    fn time_updates(&self) -> broadcast::Receiver<TimeUpdate> {
        self.updates.subscribe()
    }
}
