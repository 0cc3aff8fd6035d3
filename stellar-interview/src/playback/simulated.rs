//! Timer-driven stand-in for a real audio pipeline
//!
//! Lets the service run headless: preparation takes a configurable delay,
//! and while "playing" a tokio ticker advances the position and broadcasts
//! time updates. Reaching the end stops the ticker and reports the final
//! position once.

use super::backend::{AudioBackend, BackendError, TimeUpdate};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Time updates buffered per listener
const UPDATE_CAPACITY: usize = 64;

/// Simulated content and timing
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SimulatedConfig {
    /// Content length (milliseconds)
    pub duration_ms: u64,
    /// Time `prepare()` takes (milliseconds)
    pub prepare_delay_ms: u64,
    /// Interval between time updates while playing (milliseconds)
    pub tick_ms: u64,
    /// Latency of play/pause/seek acknowledgements (milliseconds)
    pub op_latency_ms: u64,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            duration_ms: 60_000,
            prepare_delay_ms: 1_000,
            tick_ms: 250,
            op_latency_ms: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Transport {
    position_ms: u64,
    ticker: Option<JoinHandle<()>>,
}

pub struct SimulatedBackend {
    config: SimulatedConfig,
    prepared: AtomicBool,
    transport: Arc<Mutex<Transport>>,
    updates: broadcast::Sender<TimeUpdate>,
}

impl SimulatedBackend {
    pub fn new(config: SimulatedConfig) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            config,
            prepared: AtomicBool::new(false),
            transport: Arc::new(Mutex::new(Transport::default())),
            updates,
        }
    }

    pub fn config(&self) -> &SimulatedConfig {
        &self.config
    }

    /// Current simulated position
    pub fn position_ms(&self) -> u64 {
        lock(&self.transport).position_ms
    }

    /// Whether the ticker is running
    pub fn is_playing(&self) -> bool {
        lock(&self.transport)
            .ticker
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    fn ensure_prepared(&self, operation: &str) -> Result<(), BackendError> {
        if self.prepared.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::new(format!("{} before prepare", operation)))
        }
    }

    async fn latency(&self) {
        if self.config.op_latency_ms > 0 {
            sleep(Duration::from_millis(self.config.op_latency_ms)).await;
        }
    }

    fn publish(&self, position_ms: u64) {
        let _ = self.updates.send(TimeUpdate {
            current_ms: position_ms,
            duration_ms: self.config.duration_ms,
        });
    }
}

#[async_trait]
impl AudioBackend for SimulatedBackend {
    async fn prepare(&self) -> Result<(), BackendError> {
        if self.config.duration_ms == 0 {
            return Err(BackendError::new("simulated content has zero duration"));
        }
        sleep(Duration::from_millis(self.config.prepare_delay_ms)).await;
        self.prepared.store(true, Ordering::SeqCst);
        info!("Simulated backend prepared ({}ms of content)", self.config.duration_ms);
        Ok(())
    }

    async fn play(&self) -> Result<(), BackendError> {
        self.ensure_prepared("play")?;
        self.latency().await;

        let mut transport = lock(&self.transport);
        if transport.ticker.as_ref().is_some_and(|t| !t.is_finished()) {
            return Ok(());
        }

        let tick_ms = self.config.tick_ms.max(1);
        let duration_ms = self.config.duration_ms;
        let shared = Arc::clone(&self.transport);
        let updates = self.updates.clone();

        transport.ticker = Some(tokio::spawn(async move {
            let period = Duration::from_millis(tick_ms);
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticks.tick().await;
                let position_ms = {
                    let mut transport = lock(&shared);
                    transport.position_ms = (transport.position_ms + tick_ms).min(duration_ms);
                    transport.position_ms
                };
                let _ = updates.send(TimeUpdate {
                    current_ms: position_ms,
                    duration_ms,
                });
                if position_ms >= duration_ms {
                    debug!("Simulated playback reached end of content");
                    break;
                }
            }
        }));
        Ok(())
    }

    async fn pause(&self) -> Result<(), BackendError> {
        self.ensure_prepared("pause")?;
        self.latency().await;
        if let Some(ticker) = lock(&self.transport).ticker.take() {
            ticker.abort();
        }
        Ok(())
    }

    async fn seek(&self, position_ms: u64) -> Result<(), BackendError> {
        self.ensure_prepared("seek")?;
        self.latency().await;
        let position_ms = position_ms.min(self.config.duration_ms);
        lock(&self.transport).position_ms = position_ms;
        self.publish(position_ms);
        Ok(())
    }

    fn is_prepared(&self) -> bool {
        self.prepared.load(Ordering::SeqCst)
    }

    async fn duration_ms(&self) -> Result<u64, BackendError> {
        self.ensure_prepared("duration query")?;
        Ok(self.config.duration_ms)
    }

    fn time_updates(&self) -> broadcast::Receiver<TimeUpdate> {
        self.updates.subscribe()
    }
}

impl Drop for SimulatedBackend {
    fn drop(&mut self) {
        if let Some(ticker) = lock(&self.transport).ticker.take() {
            ticker.abort();
        }
    }
}

fn lock(transport: &Mutex<Transport>) -> std::sync::MutexGuard<'_, Transport> {
    match transport.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
