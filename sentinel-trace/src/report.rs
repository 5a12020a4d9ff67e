//! Session report
//!
//! End-of-session summary assembled from the statistics snapshot plus
//! per-sink failure counters, which together are the operator-facing
//! health surface of the pipeline. Renders to JSON for tooling and
//! Markdown for humans.

use sentinel_trace_common::{EventPayload, StatsRecord, TelemetryEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub metadata: ReportMetadata,
    pub summary: EventSummary,
    pub detections: Vec<DetectionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub timestamp: String,
    pub duration_seconds: u64,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSummary {
    pub total_events: u64,
    pub file_events: u64,
    pub process_events: u64,
    pub image_events: u64,
    pub injection_detections: u64,
    pub unsigned_driver_detections: u64,
    pub dropped_events: u64,
    pub buffer_overflows: u64,
    pub aggregator_evictions: u64,
    pub trace_sink_failures: u64,
    pub ipc_sink_failures: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub timestamp_ticks: u64,
    pub event_type: String,
    pub process_id: u32,
    pub image_path: String,
}

impl SessionReport {
    pub fn new(stats: &StatsRecord, duration_seconds: u64) -> Self {
        Self {
            metadata: ReportMetadata {
                timestamp: chrono::Utc::now().to_rfc3339(),
                duration_seconds,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            summary: EventSummary {
                total_events: stats.total_events,
                file_events: stats.file_events,
                process_events: stats.process_events,
                image_events: stats.image_events,
                injection_detections: stats.injection_detections,
                unsigned_driver_detections: stats.unsigned_driver_detections,
                dropped_events: stats.dropped_events,
                buffer_overflows: stats.buffer_overflows,
                aggregator_evictions: 0,
                trace_sink_failures: 0,
                ipc_sink_failures: 0,
            },
            detections: Vec::new(),
        }
    }

    pub fn with_aggregator_evictions(mut self, evictions: u64) -> Self {
        self.summary.aggregator_evictions = evictions;
        self
    }

    pub fn with_sink_failures(mut self, trace: u64, ipc: u64) -> Self {
        self.summary.trace_sink_failures = trace;
        self.summary.ipc_sink_failures = ipc;
        self
    }

    /// Folds recent events in, keeping only the derived classifications.
    pub fn with_recent_events(mut self, events: &[TelemetryEvent]) -> Self {
        for event in events {
            let Some(kind) = event.kind() else { continue };
            if !kind.is_detection() {
                continue;
            }
            let image_path = match event.payload() {
                Some(EventPayload::Process(process)) => process.image_path_as_str().to_string(),
                Some(EventPayload::Image(image)) => image.image_path_as_str().to_string(),
                _ => String::new(),
            };
            self.detections.push(DetectionRecord {
                timestamp_ticks: event.timestamp,
                event_type: kind.as_str().to_string(),
                process_id: event.process_id,
                image_path,
            });
        }
        self
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str("# Telemetry Session Report\n\n");

        md.push_str("## Metadata\n\n");
        md.push_str(&format!("- **Timestamp**: {}\n", self.metadata.timestamp));
        md.push_str(&format!(
            "- **Duration**: {} seconds\n",
            self.metadata.duration_seconds
        ));
        md.push_str(&format!("- **Version**: {}\n\n", self.metadata.version));

        md.push_str("## Summary\n\n");
        md.push_str("| Counter | Value |\n");
        md.push_str("|---------|-------|\n");
        md.push_str(&format!("| Total Events | {} |\n", self.summary.total_events));
        md.push_str(&format!("| File Events | {} |\n", self.summary.file_events));
        md.push_str(&format!(
            "| Process Events | {} |\n",
            self.summary.process_events
        ));
        md.push_str(&format!(
            "| Image Events | {} |\n",
            self.summary.image_events
        ));
        md.push_str(&format!(
            "| Injection Detections | {} |\n",
            self.summary.injection_detections
        ));
        md.push_str(&format!(
            "| Unsigned Driver Detections | {} |\n",
            self.summary.unsigned_driver_detections
        ));
        md.push_str(&format!(
            "| Dropped Events | {} |\n",
            self.summary.dropped_events
        ));
        md.push_str(&format!(
            "| Buffer Overflows | {} |\n",
            self.summary.buffer_overflows
        ));
        md.push_str(&format!(
            "| Aggregator Evictions | {} |\n",
            self.summary.aggregator_evictions
        ));
        md.push_str(&format!(
            "| Trace Sink Failures | {} |\n",
            self.summary.trace_sink_failures
        ));
        md.push_str(&format!(
            "| IPC Sink Failures | {} |\n\n",
            self.summary.ipc_sink_failures
        ));

        let detections =
            self.summary.injection_detections + self.summary.unsigned_driver_detections;
        if detections > 0 {
            md.push_str(&format!(
                "**{} suspicious events detected during this session.**\n\n",
                detections
            ));
        } else {
            md.push_str("No suspicious events detected during this session.\n\n");
        }

        if !self.detections.is_empty() {
            md.push_str("## Detections\n\n");
            for detection in &self.detections {
                md.push_str(&format!(
                    "- [{}] ticks={} pid={} {}\n",
                    detection.event_type,
                    detection.timestamp_ticks,
                    detection.process_id,
                    detection.image_path
                ));
            }
            md.push('\n');
        }

        md.push_str("---\n");
        md.push_str("*Generated by sentinel-trace*\n");

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_trace_common::{EventType, ImageRecord, ProcessRecord};

    fn stats() -> StatsRecord {
        StatsRecord {
            total_events: 10,
            file_events: 5,
            process_events: 3,
            image_events: 2,
            injection_detections: 1,
            unsigned_driver_detections: 1,
            dropped_events: 4,
            buffer_overflows: 1,
        }
    }

    #[test]
    fn json_report_carries_all_counters() {
        let report = SessionReport::new(&stats(), 60).with_sink_failures(2, 7);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"total_events\": 10"));
        assert!(json.contains("\"dropped_events\": 4"));
        assert!(json.contains("\"ipc_sink_failures\": 7"));
    }

    #[test]
    fn markdown_report_summarizes_detections() {
        let report = SessionReport::new(&stats(), 60);

        let md = report.to_markdown();
        assert!(md.contains("| Total Events | 10 |"));
        assert!(md.contains("2 suspicious events detected"));
    }

    #[test]
    fn recent_events_fold_into_detection_list() {
        let events = vec![
            TelemetryEvent::new(EventType::FileRead),
            TelemetryEvent::new(EventType::ProcessInjection)
                .with_timestamp(42)
                .with_process_id(1234)
                .with_process(ProcessRecord::new().with_image_path(b"C:\\Temp\\stage2.exe")),
            TelemetryEvent::new(EventType::UnsignedDriverLoad)
                .with_image(ImageRecord::new().with_image_path(b"C:\\Temp\\rk.sys")),
        ];

        let report = SessionReport::new(&stats(), 5).with_recent_events(&events);

        assert_eq!(report.detections.len(), 2);
        assert_eq!(report.detections[0].event_type, "process_injection");
        assert_eq!(report.detections[0].image_path, "C:\\Temp\\stage2.exe");
        assert_eq!(report.detections[1].event_type, "unsigned_driver_load");
    }

    #[test]
    fn clean_session_reads_clean() {
        let report = SessionReport::new(&StatsRecord::default(), 1);
        assert!(report.to_markdown().contains("No suspicious events"));
    }
}
