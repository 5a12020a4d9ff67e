//! Telemetry capture pipeline
//!
//! The producer half of the system: hook adapters call the `record_*`
//! entry points from arbitrary thread context, so every path through
//! here is bounded: an enabled check, a filter snapshot, an optional
//! classification, two short counter sections, and a slot copy. The
//! queue, statistics block, and filter each sit behind their own lock
//! and are never taken together.

pub mod classifier;
pub mod clock;
pub mod filter;
pub mod queue;
pub mod stats;

pub use classifier::{Classifier, Detection};
pub use filter::{ActiveFilter, FilterConfig};
pub use queue::{EnqueueOutcome, EventQueue, DEFAULT_QUEUE_CAPACITY};
pub use stats::StatsBlock;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use sentinel_trace_common::{
    EventCategory, EventType, FileRecord, ImageRecord, ProcessRecord, StatsRecord, TelemetryEvent,
};

/// Locks a mutex, recovering the data from a poisoned guard. Producers
/// cannot propagate a poisoning panic and the guarded state stays
/// structurally valid (plain counters and POD slots).
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared state of the capture side: bounded queue, statistics, active
/// filter, and the global monitoring toggle.
pub struct CapturePipeline {
    queue: EventQueue,
    stats: StatsBlock,
    filter: ActiveFilter,
    monitoring_enabled: AtomicBool,
}

impl CapturePipeline {
    pub fn new(queue_capacity: usize, initial_filter: FilterConfig) -> Self {
        Self {
            queue: EventQueue::with_capacity(queue_capacity),
            stats: StatsBlock::new(),
            filter: ActiveFilter::new(initial_filter),
            monitoring_enabled: AtomicBool::new(true),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY, FilterConfig::monitor_all())
    }

    pub fn is_monitoring_enabled(&self) -> bool {
        self.monitoring_enabled.load(Ordering::Relaxed)
    }

    /// Flips the global toggle. Hooks stay attached; a disabled producer
    /// returns before doing any work.
    pub fn set_monitoring_enabled(&self, enabled: bool) {
        self.monitoring_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn statistics(&self) -> StatsRecord {
        self.stats.snapshot()
    }

    pub fn filter_snapshot(&self) -> std::sync::Arc<FilterConfig> {
        self.filter.snapshot()
    }

    pub fn replace_filter(&self, config: FilterConfig) {
        self.filter.replace(config);
    }

    pub(crate) fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// File operation hook entry point. `kind` must be one of the four
    /// file event types; anything else is discarded.
    pub fn record_file_operation(
        &self,
        kind: EventType,
        process_id: u32,
        thread_id: u32,
        path: &str,
        process_name: &str,
        operation_flags: u32,
        result: u32,
    ) {
        if !self.is_monitoring_enabled() || kind.category() != EventCategory::File {
            return;
        }
        let filter = self.filter.snapshot();
        if !filter.monitor_file_operations || filter.is_path_excluded(path) {
            return;
        }

        let event = TelemetryEvent::new(kind)
            .with_timestamp(clock::ticks_now())
            .with_process_id(process_id)
            .with_thread_id(thread_id)
            .with_file(
                FileRecord::new()
                    .with_path(path.as_bytes())
                    .with_process_name(process_name.as_bytes())
                    .with_operation_flags(operation_flags)
                    .with_result(result),
            );
        self.admit(event);
    }

    /// Process creation hook entry point; runs the injection heuristic
    /// when the active filter asks for it.
    pub fn record_process_create(
        &self,
        process_id: u32,
        thread_id: u32,
        parent_process_id: u32,
        image_path: &str,
        process_name: &str,
    ) {
        if !self.is_monitoring_enabled() {
            return;
        }
        let filter = self.filter.snapshot();
        if !filter.monitor_process_creation || filter.is_path_excluded(image_path) {
            return;
        }

        let ticks = clock::ticks_now();
        let event = TelemetryEvent::new(EventType::ProcessCreate)
            .with_timestamp(ticks)
            .with_process_id(process_id)
            .with_thread_id(thread_id)
            .with_process(
                ProcessRecord::new()
                    .with_parent_process_id(parent_process_id)
                    .with_create_time(ticks)
                    .with_image_path(image_path.as_bytes())
                    .with_process_name(process_name.as_bytes()),
            );

        let event = if filter.detect_injections {
            Classifier::apply(event).0
        } else {
            event
        };
        self.admit(event);
    }

    pub fn record_process_exit(&self, process_id: u32, process_name: &str) {
        if !self.is_monitoring_enabled() {
            return;
        }
        let filter = self.filter.snapshot();
        if !filter.monitor_process_creation {
            return;
        }

        let event = TelemetryEvent::new(EventType::ProcessTerminate)
            .with_timestamp(clock::ticks_now())
            .with_process_id(process_id)
            .with_process(ProcessRecord::new().with_process_name(process_name.as_bytes()));
        self.admit(event);
    }

    /// Image load hook entry point. A zero process id marks a driver
    /// load; the unsigned-driver heuristic runs for those when enabled.
    pub fn record_image_load(
        &self,
        process_id: u32,
        image_path: &str,
        process_name: &str,
        image_base: u64,
        image_size: u32,
    ) {
        self.record_image_event(
            EventType::ImageLoad,
            process_id,
            image_path,
            process_name,
            image_base,
            image_size,
        );
    }

    pub fn record_image_unload(
        &self,
        process_id: u32,
        image_path: &str,
        process_name: &str,
        image_base: u64,
        image_size: u32,
    ) {
        self.record_image_event(
            EventType::ImageUnload,
            process_id,
            image_path,
            process_name,
            image_base,
            image_size,
        );
    }

    fn record_image_event(
        &self,
        kind: EventType,
        process_id: u32,
        image_path: &str,
        process_name: &str,
        image_base: u64,
        image_size: u32,
    ) {
        if !self.is_monitoring_enabled() {
            return;
        }
        let filter = self.filter.snapshot();
        if !filter.monitor_image_loads || filter.is_path_excluded(image_path) {
            return;
        }

        let is_driver = process_id == 0;
        let event = TelemetryEvent::new(kind)
            .with_timestamp(clock::ticks_now())
            .with_process_id(process_id)
            .with_image(
                ImageRecord::new()
                    .with_image_base(image_base)
                    .with_image_size(image_size)
                    .with_driver(is_driver)
                    // Heuristic placeholder, see classifier module.
                    .with_signed(is_driver && !Classifier::is_unsigned_driver_path(image_path))
                    .with_image_path(image_path.as_bytes())
                    .with_process_name(process_name.as_bytes()),
            );

        let event = if kind == EventType::ImageLoad && filter.detect_unsigned_drivers {
            Classifier::apply(event).0
        } else {
            event
        };
        self.admit(event);
    }

    /// Counts the event and offers it to the queue. A refused event is
    /// counted as dropped; nothing here can fail outward.
    fn admit(&self, event: TelemetryEvent) {
        let Some(kind) = event.kind() else { return };
        self.stats.record_event(kind);
        if let EnqueueOutcome::DroppedFull { first_overflow } = self.queue.try_enqueue(event) {
            self.stats.record_dropped(first_overflow);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> CapturePipeline {
        CapturePipeline::new(64, FilterConfig::monitor_all())
    }

    mod monitoring_toggle {
        use super::*;

        #[test]
        fn disabled_pipeline_records_nothing() {
            let pipeline = pipeline();
            pipeline.set_monitoring_enabled(false);

            pipeline.record_file_operation(
                EventType::FileCreate,
                100,
                101,
                "C:\\Windows\\win.ini",
                "notepad.exe",
                0,
                0,
            );
            pipeline.record_process_create(200, 201, 4, "C:\\Temp\\x.exe", "x.exe");

            assert_eq!(pipeline.statistics().total_events, 0);
            assert!(pipeline.queue().is_empty());
        }

        #[test]
        fn reenabling_resumes_capture() {
            let pipeline = pipeline();
            pipeline.set_monitoring_enabled(false);
            pipeline.set_monitoring_enabled(true);

            pipeline.record_process_exit(300, "calc.exe");
            assert_eq!(pipeline.statistics().process_events, 1);
        }
    }

    mod filtering {
        use super::*;

        #[test]
        fn excluded_path_produces_zero_events() {
            let filter = FilterConfig::monitor_all()
                .with_excluded_path("C:\\Windows\\Temp\\")
                .unwrap();
            let pipeline = CapturePipeline::new(64, filter);

            pipeline.record_file_operation(
                EventType::FileWrite,
                10,
                11,
                "C:\\Windows\\Temp\\scratch.bin",
                "installer.exe",
                0,
                0,
            );

            assert_eq!(pipeline.statistics().total_events, 0);
        }

        #[test]
        fn disabled_category_is_skipped_but_others_flow() {
            let mut filter = FilterConfig::monitor_all();
            filter.monitor_file_operations = false;
            let pipeline = CapturePipeline::new(64, filter);

            pipeline.record_file_operation(
                EventType::FileRead,
                10,
                11,
                "C:\\data.txt",
                "reader.exe",
                0,
                0,
            );
            pipeline.record_process_exit(12, "reader.exe");

            let stats = pipeline.statistics();
            assert_eq!(stats.file_events, 0);
            assert_eq!(stats.process_events, 1);
        }

        #[test]
        fn detection_toggle_suppresses_reclassification_only() {
            let mut filter = FilterConfig::monitor_all();
            filter.detect_injections = false;
            let pipeline = CapturePipeline::new(64, filter);

            pipeline.record_process_create(20, 21, 4, "C:\\Temp\\injected.exe", "injected.exe");

            let stats = pipeline.statistics();
            assert_eq!(stats.process_events, 1);
            assert_eq!(stats.injection_detections, 0);
            assert_eq!(
                pipeline.queue().dequeue().unwrap().kind(),
                Some(EventType::ProcessCreate)
            );
        }
    }

    mod capture_flow {
        use super::*;

        #[test]
        fn system_driver_load_passes_unmodified() {
            let pipeline = pipeline();

            pipeline.record_file_operation(
                EventType::FileCreate,
                4,
                0,
                "C:\\Windows\\System32\\drivers\\foo.sys",
                "System",
                0,
                0,
            );

            let event = pipeline.queue().dequeue().unwrap();
            assert_eq!(event.kind(), Some(EventType::FileCreate));
            assert_eq!(event.process_id, 4);
            assert_eq!(pipeline.statistics().unsigned_driver_detections, 0);
        }

        #[test]
        fn temp_driver_load_is_reclassified_and_counted() {
            let pipeline = pipeline();

            pipeline.record_image_load(0, "C:\\Temp\\evil.sys", "", 0xFFFF_8000_0000_0000, 0x4000);

            let event = pipeline.queue().dequeue().unwrap();
            assert_eq!(event.kind(), Some(EventType::UnsignedDriverLoad));
            let image = event.image_payload().unwrap();
            assert!(image.is_driver());
            assert!(!image.is_signed());
            assert_eq!(pipeline.statistics().unsigned_driver_detections, 1);
        }

        #[test]
        fn image_unload_is_never_reclassified() {
            let pipeline = pipeline();

            pipeline.record_image_unload(0, "C:\\Temp\\evil.sys", "", 0, 0x4000);

            let event = pipeline.queue().dequeue().unwrap();
            assert_eq!(event.kind(), Some(EventType::ImageUnload));
            assert_eq!(pipeline.statistics().unsigned_driver_detections, 0);
        }

        #[test]
        fn drops_are_counted_once_queue_is_full() {
            let pipeline = CapturePipeline::new(2, FilterConfig::monitor_all());
            for i in 0..5 {
                pipeline.record_process_exit(i, "burst.exe");
            }

            let stats = pipeline.statistics();
            assert_eq!(stats.total_events, 5);
            assert_eq!(stats.dropped_events, 3);
            assert_eq!(stats.buffer_overflows, 1);
            assert_eq!(pipeline.queue().len(), 2);
        }
    }
}
