//! Bounded MPSC event queue
//!
//! Producers run in hook callback context and must finish in bounded
//! time: slot claims happen under a short mutex that only moves two
//! counters, and the payload copy lands in the claimed slot outside that
//! lock. A single consumer reads slots back in claim order. A full queue
//! drops the incoming event (drop-newest) so already-admitted events keep
//! their arrival order.

use std::sync::Mutex;

use sentinel_trace_common::{EventType, TelemetryEvent};

use super::lock_unpoisoned;

pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Result of an enqueue attempt. A full queue is a counted, normal
/// condition, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued,
    /// The incoming event was discarded. `first_overflow` marks the
    /// transition into the full state; it stays false until a dequeue
    /// makes room again.
    DroppedFull { first_overflow: bool },
}

struct QueueSlot {
    valid: bool,
    event: TelemetryEvent,
}

struct ClaimState {
    write_cursor: u64,
    in_queue: usize,
    overflow_reported: bool,
}

struct ReadState {
    read_cursor: u64,
}

pub struct EventQueue {
    slots: Box<[Mutex<QueueSlot>]>,
    claim: Mutex<ClaimState>,
    read: Mutex<ReadState>,
}

impl EventQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        let slots = (0..capacity)
            .map(|_| {
                Mutex::new(QueueSlot {
                    valid: false,
                    event: TelemetryEvent::new(EventType::FileCreate),
                })
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            claim: Mutex::new(ClaimState {
                write_cursor: 0,
                in_queue: 0,
                overflow_reported: false,
            }),
            read: Mutex::new(ReadState { read_cursor: 0 }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Claimed-but-not-yet-consumed entries, including any whose payload
    /// copy is still in flight.
    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.claim).in_queue
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Admits one event or drops it when the queue is full. Callable from
    /// any producer thread; never blocks beyond the two short critical
    /// sections and never allocates.
    pub fn try_enqueue(&self, event: TelemetryEvent) -> EnqueueOutcome {
        let index = {
            let mut claim = lock_unpoisoned(&self.claim);
            if claim.in_queue == self.slots.len() {
                let first_overflow = !claim.overflow_reported;
                claim.overflow_reported = true;
                return EnqueueOutcome::DroppedFull { first_overflow };
            }
            let index = (claim.write_cursor % self.slots.len() as u64) as usize;
            claim.write_cursor += 1;
            claim.in_queue += 1;
            index
        };

        // The claimed index is exclusively ours until the validity flag
        // goes up, so this per-slot lock is uncontended on the producer
        // side; the consumer may only race us here by observing `valid`
        // still false and backing off.
        let mut slot = lock_unpoisoned(&self.slots[index]);
        slot.event = event;
        slot.valid = true;
        EnqueueOutcome::Enqueued
    }

    /// Removes the oldest available event. Returns `None` when the queue
    /// is empty or when the oldest claimed slot is still being written;
    /// such an entry surfaces on a later call. Consumer-side only.
    pub fn dequeue(&self) -> Option<TelemetryEvent> {
        let mut read = lock_unpoisoned(&self.read);
        let index = (read.read_cursor % self.slots.len() as u64) as usize;
        let event = {
            let mut slot = lock_unpoisoned(&self.slots[index]);
            if !slot.valid {
                return None;
            }
            slot.valid = false;
            slot.event
        };
        read.read_cursor += 1;
        drop(read);

        let mut claim = lock_unpoisoned(&self.claim);
        claim.in_queue -= 1;
        claim.overflow_reported = false;
        Some(event)
    }

    /// Drains up to `max` events in FIFO order.
    pub fn drain(&self, max: usize) -> Vec<TelemetryEvent> {
        let mut out = Vec::with_capacity(max.min(self.len()));
        while out.len() < max {
            match self.dequeue() {
                Some(event) => out.push(event),
                None => break,
            }
        }
        out
    }
}
