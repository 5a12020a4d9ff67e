//! Heuristic event classifiers
//!
//! Cheap path-based signals that upgrade a base event to a derived
//! classification before it is queued. Both heuristics trade accuracy
//! for producer-context safety: a substring test over an already
//! captured path, no system calls, no allocation.

use sentinel_trace_common::{EventType, TelemetryEvent};

/// Path fragments commonly used as staging locations by injectors.
pub const SUSPICIOUS_PATH_FRAGMENTS: [&str; 3] = [
    "\\Temp\\",
    "\\AppData\\Local\\Temp\\",
    "\\AppData\\Roaming\\",
];

/// Canonical location of system-supplied drivers.
pub const SYSTEM_DRIVER_DIRECTORY: &str = "\\System32\\drivers\\";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    Injection,
    UnsignedDriver,
}

impl Detection {
    pub fn event_type(self) -> EventType {
        match self {
            Detection::Injection => EventType::ProcessInjection,
            Detection::UnsignedDriver => EventType::UnsignedDriverLoad,
        }
    }
}

/// Stateless classifier over raw telemetry events.
///
/// Only base event types are examined: a `ProcessInjection` or
/// `UnsignedDriverLoad` fed back through comes out unchanged, so
/// reclassification is idempotent by construction.
pub struct Classifier;

impl Classifier {
    pub fn classify(event: &TelemetryEvent) -> Option<Detection> {
        match event.kind()? {
            EventType::ProcessCreate => {
                let payload = event.process_payload()?;
                if Self::is_suspicious_image_path(payload.image_path_as_str()) {
                    Some(Detection::Injection)
                } else {
                    None
                }
            }
            EventType::ImageLoad => {
                let payload = event.image_payload()?;
                if payload.is_driver()
                    && Self::is_unsigned_driver_path(payload.image_path_as_str())
                {
                    Some(Detection::UnsignedDriver)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Returns the event, reclassified when a heuristic fires, along
    /// with the detection that fired. The payload is never modified.
    pub fn apply(event: TelemetryEvent) -> (TelemetryEvent, Option<Detection>) {
        match Self::classify(&event) {
            Some(detection) => (event.reclassified(detection.event_type()), Some(detection)),
            None => (event, None),
        }
    }

    /// Injection signal: the image lives under a temp or roaming profile
    /// location. A crude indicator, not proof; false positives are
    /// acceptable because the consumer only records.
    fn is_suspicious_image_path(path: &str) -> bool {
        SUSPICIOUS_PATH_FRAGMENTS
            .iter()
            .any(|fragment| contains_ignore_ascii_case(path, fragment))
    }

    /// Placeholder for certificate-chain verification: a driver outside
    /// the system driver directory is treated as unsigned. This yields
    /// false positives for signed drivers installed elsewhere and false
    /// negatives for signed malware dropped into the directory.
    pub fn is_unsigned_driver_path(path: &str) -> bool {
        !contains_ignore_ascii_case(path, SYSTEM_DRIVER_DIRECTORY)
    }
}

fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() {
        return true;
    }
    if haystack.len() < needle.len() {
        return false;
    }
    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}
