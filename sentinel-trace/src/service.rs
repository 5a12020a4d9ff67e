//! Telemetry service poll loop
//!
//! A single dedicated consumer task: on every tick (or wake signal) it
//! drains the retrieval protocol through the aggregator and fans the
//! staged batch out to the sinks. Failure to reach the capture side at
//! startup is fatal; the same failure once running is logged and retried
//! on the next tick.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{info, warn};
use tokio::sync::Notify;
use tokio::time::{interval, MissedTickBehavior};

use crate::aggregator::Aggregator;
use crate::capture::lock_unpoisoned;
use crate::errors::{Result, SentinelError};
use crate::protocol::TelemetryChannel;
use crate::sinks::{EventSink, SinkFanout};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Running,
    StopRequested,
}

/// Cheap clonable control surface for a running service.
#[derive(Clone)]
pub struct ServiceHandle {
    stop: Arc<Notify>,
    wake: Arc<Notify>,
    state: Arc<Mutex<ServiceState>>,
}

impl ServiceHandle {
    /// Requests a stop; honored within one poll interval. An in-flight
    /// publish completes before the service reports `Stopped`.
    pub fn stop(&self) {
        self.stop.notify_one();
    }

    /// Skips the wait for the next tick once.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    pub fn state(&self) -> ServiceState {
        *lock_unpoisoned(&self.state)
    }
}

pub struct TelemetryService<C, T, I> {
    aggregator: Aggregator<C>,
    sinks: SinkFanout<T, I>,
    poll_interval: Duration,
    stop: Arc<Notify>,
    wake: Arc<Notify>,
    state: Arc<Mutex<ServiceState>>,
}

impl<C: TelemetryChannel, T: EventSink, I: EventSink> TelemetryService<C, T, I> {
    pub fn new(aggregator: Aggregator<C>, sinks: SinkFanout<T, I>) -> Self {
        Self {
            aggregator,
            sinks,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stop: Arc::new(Notify::new()),
            wake: Arc::new(Notify::new()),
            state: Arc::new(Mutex::new(ServiceState::Stopped)),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn handle(&self) -> ServiceHandle {
        ServiceHandle {
            stop: Arc::clone(&self.stop),
            wake: Arc::clone(&self.wake),
            state: Arc::clone(&self.state),
        }
    }

    pub fn state(&self) -> ServiceState {
        *lock_unpoisoned(&self.state)
    }

    pub fn aggregator(&self) -> &Aggregator<C> {
        &self.aggregator
    }

    pub fn sink_failures(&self) -> (u64, u64) {
        (self.sinks.trace_failures(), self.sinks.ipc_failures())
    }

    fn set_state(&self, state: ServiceState) {
        *lock_unpoisoned(&self.state) = state;
    }

    /// Runs until a stop request. Returns an error without entering
    /// `Running` when the capture side does not answer the initial
    /// statistics round trip.
    pub async fn run(&mut self) -> Result<()> {
        self.aggregator
            .statistics()
            .map_err(|err| SentinelError::ChannelUnreachable {
                message: format!("initial statistics round trip failed: {}", err),
            })?;

        self.set_state(ServiceState::Running);
        info!(
            "telemetry service running, poll interval {:?}",
            self.poll_interval
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.wake.notified() => {}
                _ = self.stop.notified() => {
                    self.set_state(ServiceState::StopRequested);
                    break;
                }
            }
            self.drain_and_publish().await;
        }

        // Flush whatever is already staged before reporting Stopped.
        self.drain_and_publish().await;
        self.set_state(ServiceState::Stopped);
        info!("telemetry service stopped");
        Ok(())
    }

    async fn drain_and_publish(&mut self) {
        if let Err(err) = self.aggregator.poll_once() {
            warn!("telemetry poll failed, retrying next tick: {}", err);
            return;
        }
        let batch = self.aggregator.drain();
        if batch.is_empty() {
            return;
        }
        for outcome in self.sinks.publish_all(&batch).await {
            if let Err(err) = outcome.result {
                warn!(
                    "sink {} failed to publish {} events: {}",
                    outcome.sink,
                    batch.len(),
                    err
                );
            }
        }
    }
}
