//! User-space telemetry aggregator
//!
//! Pulls events out of the retrieval protocol on each poll and stages
//! them for fan-out in a bounded FIFO. Eviction here is drop-oldest,
//! the inverse of the capture queue, because at this stage losing
//! history is cheaper than losing the most recent security-relevant
//! signal. No classification and no I/O beyond the channel happen here.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use sentinel_trace_common::{StatsRecord, TelemetryEvent};

use crate::capture::lock_unpoisoned;
use crate::errors::Result;
use crate::protocol::{ChannelClient, TelemetryChannel};

pub const DEFAULT_AGGREGATOR_CAPACITY: usize = 10_000;
pub const DEFAULT_DRAIN_BATCH: usize = 256;

pub struct Aggregator<C> {
    client: Mutex<ChannelClient<C>>,
    buffer: Mutex<VecDeque<TelemetryEvent>>,
    capacity: usize,
    drain_batch: usize,
    evicted: AtomicU64,
}

impl<C: TelemetryChannel> Aggregator<C> {
    pub fn new(client: ChannelClient<C>, capacity: usize, drain_batch: usize) -> Self {
        assert!(capacity > 0, "aggregator capacity must be non-zero");
        assert!(drain_batch > 0, "drain batch must be non-zero");
        Self {
            client: Mutex::new(client),
            buffer: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            drain_batch,
            evicted: AtomicU64::new(0),
        }
    }

    pub fn with_defaults(client: ChannelClient<C>) -> Self {
        Self::new(client, DEFAULT_AGGREGATOR_CAPACITY, DEFAULT_DRAIN_BATCH)
    }

    /// One protocol drain, bounded by the batch limit so a hot producer
    /// cannot pin the poll thread. Returns the number of events pulled.
    pub fn poll_once(&self) -> Result<usize> {
        let batch = lock_unpoisoned(&self.client).drain_batch(self.drain_batch)?;
        if batch.is_empty() {
            return Ok(0);
        }

        let mut buffer = lock_unpoisoned(&self.buffer);
        for event in &batch {
            if buffer.len() == self.capacity {
                buffer.pop_front();
                self.evicted.fetch_add(1, Ordering::Relaxed);
            }
            buffer.push_back(*event);
        }
        Ok(batch.len())
    }

    /// Consistent stats snapshot from the capture side.
    pub fn statistics(&self) -> Result<StatsRecord> {
        lock_unpoisoned(&self.client).statistics()
    }

    /// Copy of the staged events, oldest first. Non-destructive, usable
    /// by status queries concurrent with the poll thread.
    pub fn snapshot(&self) -> Vec<TelemetryEvent> {
        lock_unpoisoned(&self.buffer).iter().copied().collect()
    }

    /// Takes the staged events, leaving the buffer empty, in one lock
    /// scope.
    pub fn drain(&self) -> Vec<TelemetryEvent> {
        lock_unpoisoned(&self.buffer).drain(..).collect()
    }

    pub fn clear(&self) {
        lock_unpoisoned(&self.buffer).clear();
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.buffer).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events lost to drop-oldest eviction since startup.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}
