//! Pipeline statistics block
//!
//! Counters live behind their own mutex, independent of the queue's slot
//! claim lock, so stats contention never delays event admission. A
//! snapshot is taken in one lock scope and is therefore internally
//! consistent as of a single instant.

use std::sync::Mutex;

use sentinel_trace_common::{EventCategory, EventType, StatsRecord};

use super::lock_unpoisoned;

pub struct StatsBlock {
    inner: Mutex<StatsRecord>,
}

impl StatsBlock {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StatsRecord::default()),
        }
    }

    /// Counts an observed event: the total, its category counter, and the
    /// matching detection counter when the type is a derived
    /// classification. One lock scope for all three.
    pub fn record_event(&self, kind: EventType) {
        let mut stats = lock_unpoisoned(&self.inner);
        stats.total_events += 1;
        match kind.category() {
            EventCategory::File => stats.file_events += 1,
            EventCategory::Process => stats.process_events += 1,
            EventCategory::Image => stats.image_events += 1,
        }
        match kind {
            EventType::ProcessInjection => stats.injection_detections += 1,
            EventType::UnsignedDriverLoad => stats.unsigned_driver_detections += 1,
            _ => {}
        }
    }

    /// Counts an event the queue refused; `first_overflow` additionally
    /// counts the episode.
    pub fn record_dropped(&self, first_overflow: bool) {
        let mut stats = lock_unpoisoned(&self.inner);
        stats.dropped_events += 1;
        if first_overflow {
            stats.buffer_overflows += 1;
        }
    }

    pub fn snapshot(&self) -> StatsRecord {
        *lock_unpoisoned(&self.inner)
    }
}

impl Default for StatsBlock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_equal_sum_of_categories() {
        let stats = StatsBlock::new();
        stats.record_event(EventType::FileCreate);
        stats.record_event(EventType::FileWrite);
        stats.record_event(EventType::ProcessCreate);
        stats.record_event(EventType::UnsignedDriverLoad);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_events, 4);
        assert_eq!(
            snapshot.total_events,
            snapshot.file_events + snapshot.process_events + snapshot.image_events
        );
    }

    #[test]
    fn detections_count_alongside_their_category() {
        let stats = StatsBlock::new();
        stats.record_event(EventType::ProcessInjection);
        stats.record_event(EventType::UnsignedDriverLoad);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.injection_detections, 1);
        assert_eq!(snapshot.unsigned_driver_detections, 1);
        assert_eq!(snapshot.process_events, 1);
        assert_eq!(snapshot.image_events, 1);
    }

    #[test]
    fn drops_and_overflow_episodes_count_separately() {
        let stats = StatsBlock::new();
        stats.record_dropped(true);
        stats.record_dropped(false);
        stats.record_dropped(false);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.dropped_events, 3);
        assert_eq!(snapshot.buffer_overflows, 1);
    }
}
