//! Trace-provider sink
//!
//! Maps each telemetry event to a structured trace record with a
//! provider event id and severity level, then hands it to a
//! `TraceWriter`. The platform provider itself is OS glue behind that
//! trait; the default writer emits structured log lines.

use log::{info, warn};
use sentinel_trace_common::{EventPayload, EventType, TelemetryEvent};

use super::{EventSink, PublishReport, SinkError};

pub const TRACE_EVENT_FILE_OPERATION: u16 = 0x01;
pub const TRACE_EVENT_PROCESS_CREATE: u16 = 0x02;
pub const TRACE_EVENT_PROCESS_TERMINATE: u16 = 0x03;
pub const TRACE_EVENT_IMAGE_LOAD: u16 = 0x04;
pub const TRACE_EVENT_INJECTION_DETECTED: u16 = 0x05;
pub const TRACE_EVENT_UNSIGNED_DRIVER: u16 = 0x06;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceLevel {
    Critical = 1,
    Error = 2,
    Warning = 3,
    Info = 4,
    Verbose = 5,
}

/// One structured record per telemetry event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub event_id: u16,
    pub level: TraceLevel,
    pub process_id: u32,
    pub summary: String,
}

pub trait TraceWriter {
    fn write_record(&mut self, record: &TraceRecord) -> anyhow::Result<()>;
}

/// Default writer: structured lines through the `log` facade under the
/// provider target.
pub struct LogTraceWriter;

impl TraceWriter for LogTraceWriter {
    fn write_record(&mut self, record: &TraceRecord) -> anyhow::Result<()> {
        match record.level {
            TraceLevel::Critical | TraceLevel::Error | TraceLevel::Warning => warn!(
                target: "sentinel_trace::provider",
                "[0x{:02x}] pid={} {}",
                record.event_id, record.process_id, record.summary
            ),
            TraceLevel::Info | TraceLevel::Verbose => info!(
                target: "sentinel_trace::provider",
                "[0x{:02x}] pid={} {}",
                record.event_id, record.process_id, record.summary
            ),
        }
        Ok(())
    }
}

/// Builds the provider record for an event, or `None` when the type tag
/// is unknown.
pub fn trace_record_for(event: &TelemetryEvent) -> Option<TraceRecord> {
    let kind = event.kind()?;
    let (event_id, level) = match kind {
        EventType::FileCreate
        | EventType::FileRead
        | EventType::FileWrite
        | EventType::FileDelete => (TRACE_EVENT_FILE_OPERATION, TraceLevel::Info),
        EventType::ProcessCreate => (TRACE_EVENT_PROCESS_CREATE, TraceLevel::Info),
        EventType::ProcessTerminate => (TRACE_EVENT_PROCESS_TERMINATE, TraceLevel::Info),
        EventType::ImageLoad | EventType::ImageUnload => (TRACE_EVENT_IMAGE_LOAD, TraceLevel::Info),
        EventType::ProcessInjection => (TRACE_EVENT_INJECTION_DETECTED, TraceLevel::Warning),
        EventType::UnsignedDriverLoad => (TRACE_EVENT_UNSIGNED_DRIVER, TraceLevel::Warning),
    };

    let summary = match event.payload()? {
        EventPayload::File(file) => format!(
            "{} {} by {}",
            kind.as_str(),
            file.path_as_str(),
            file.process_name_as_str()
        ),
        EventPayload::Process(process) => format!(
            "{} {} parent={}",
            kind.as_str(),
            process.image_path_as_str(),
            process.parent_process_id
        ),
        EventPayload::Image(image) => format!(
            "{} {} base=0x{:x} size=0x{:x}{}",
            kind.as_str(),
            image.image_path_as_str(),
            image.image_base,
            image.image_size,
            if image.is_driver() { " driver" } else { "" }
        ),
    };

    Some(TraceRecord {
        event_id,
        level,
        process_id: event.process_id,
        summary,
    })
}

pub struct TraceSink<W> {
    writer: W,
}

impl<W: TraceWriter> TraceSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: TraceWriter> EventSink for TraceSink<W> {
    fn name(&self) -> &'static str {
        "trace_provider"
    }

    /// One event's write failure never aborts the rest of the batch;
    /// failures are counted into the report.
    async fn publish(
        &mut self,
        events: &[TelemetryEvent],
    ) -> std::result::Result<PublishReport, SinkError> {
        let mut report = PublishReport::default();
        for event in events {
            let Some(record) = trace_record_for(event) else {
                report.failed += 1;
                continue;
            };
            match self.writer.write_record(&record) {
                Ok(()) => report.written += 1,
                Err(_) => report.failed += 1,
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_trace_common::{FileRecord, ImageRecord, ProcessRecord};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingWriter {
        records: Arc<Mutex<Vec<TraceRecord>>>,
        fail_every: Option<usize>,
        calls: Arc<Mutex<usize>>,
    }

    impl TraceWriter for RecordingWriter {
        fn write_record(&mut self, record: &TraceRecord) -> anyhow::Result<()> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if let Some(n) = self.fail_every {
                if *calls % n == 0 {
                    anyhow::bail!("provider rejected record");
                }
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    mod severity_mapping {
        use super::*;

        #[test]
        fn routine_events_map_to_info() {
            let event = TelemetryEvent::new(EventType::FileWrite)
                .with_file(FileRecord::new().with_path(b"C:\\data.txt"));

            let record = trace_record_for(&event).unwrap();
            assert_eq!(record.event_id, TRACE_EVENT_FILE_OPERATION);
            assert_eq!(record.level, TraceLevel::Info);
        }

        #[test]
        fn detections_map_to_warning() {
            let injection = TelemetryEvent::new(EventType::ProcessInjection)
                .with_process(ProcessRecord::new().with_image_path(b"C:\\Temp\\x.exe"));
            let driver = TelemetryEvent::new(EventType::UnsignedDriverLoad)
                .with_image(ImageRecord::new().with_driver(true));

            assert_eq!(
                trace_record_for(&injection).unwrap().level,
                TraceLevel::Warning
            );
            assert_eq!(
                trace_record_for(&injection).unwrap().event_id,
                TRACE_EVENT_INJECTION_DETECTED
            );
            assert_eq!(
                trace_record_for(&driver).unwrap().event_id,
                TRACE_EVENT_UNSIGNED_DRIVER
            );
        }

        #[test]
        fn unknown_type_tag_yields_no_record() {
            let mut event = TelemetryEvent::new(EventType::FileRead);
            event.event_type = 99;
            assert!(trace_record_for(&event).is_none());
        }
    }

    mod publishing {
        use super::*;

        #[test]
        fn should_write_every_event_in_batch() {
            let writer = RecordingWriter::default();
            let records = Arc::clone(&writer.records);
            let mut sink = TraceSink::new(writer);

            let events = vec![
                TelemetryEvent::new(EventType::FileCreate)
                    .with_file(FileRecord::new().with_path(b"C:\\a")),
                TelemetryEvent::new(EventType::ProcessTerminate)
                    .with_process(ProcessRecord::new()),
            ];

            let report = tokio_test::block_on(sink.publish(&events)).unwrap();
            assert_eq!(report, PublishReport { written: 2, failed: 0 });
            assert_eq!(records.lock().unwrap().len(), 2);
        }

        #[test]
        fn single_write_failure_does_not_abort_batch() {
            let writer = RecordingWriter {
                fail_every: Some(2),
                ..RecordingWriter::default()
            };
            let mut sink = TraceSink::new(writer);

            let events: Vec<TelemetryEvent> = (0..4)
                .map(|_| {
                    TelemetryEvent::new(EventType::FileRead)
                        .with_file(FileRecord::new().with_path(b"C:\\f"))
                })
                .collect();

            let report = tokio_test::block_on(sink.publish(&events)).unwrap();
            assert_eq!(report.written, 2);
            assert_eq!(report.failed, 2);
        }
    }
}
