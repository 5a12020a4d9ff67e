//! Producer-side filter configuration
//!
//! The active filter is read by every hook callback before any other
//! work, so readers take a whole-config `Arc` snapshot instead of
//! locking per field. An update swaps the snapshot in one write lock
//! scope; a reader observes either the old or the new config in full.

use std::sync::{Arc, RwLock};

use sentinel_trace_common::{EventCategory, FilterRecord, MAX_EXCLUDED_PATHS};

use crate::errors::{Result, SentinelError};

/// Validated filter settings: per-category enable flags, detection
/// toggles, and up to ten excluded path prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    pub monitor_file_operations: bool,
    pub monitor_process_creation: bool,
    pub monitor_image_loads: bool,
    pub detect_injections: bool,
    pub detect_unsigned_drivers: bool,
    excluded_paths: Vec<String>,
}

impl FilterConfig {
    /// Startup default: monitor everything, exclude nothing.
    pub fn monitor_all() -> Self {
        Self {
            monitor_file_operations: true,
            monitor_process_creation: true,
            monitor_image_loads: true,
            detect_injections: true,
            detect_unsigned_drivers: true,
            excluded_paths: Vec::new(),
        }
    }

    pub fn with_excluded_path(mut self, prefix: impl Into<String>) -> Result<Self> {
        if self.excluded_paths.len() >= MAX_EXCLUDED_PATHS {
            return Err(SentinelError::ConfigError {
                message: format!("at most {} excluded paths are supported", MAX_EXCLUDED_PATHS),
            });
        }
        self.excluded_paths.push(prefix.into());
        Ok(self)
    }

    pub fn excluded_paths(&self) -> &[String] {
        &self.excluded_paths
    }

    pub fn category_enabled(&self, category: EventCategory) -> bool {
        match category {
            EventCategory::File => self.monitor_file_operations,
            EventCategory::Process => self.monitor_process_creation,
            EventCategory::Image => self.monitor_image_loads,
        }
    }

    /// Case-insensitive prefix test, allocation-free so it is safe on the
    /// producer path.
    pub fn is_path_excluded(&self, path: &str) -> bool {
        self.excluded_paths
            .iter()
            .any(|prefix| starts_with_ignore_ascii_case(path, prefix))
    }

    pub fn to_record(&self) -> FilterRecord {
        let mut record = FilterRecord::monitor_all();
        record.monitor_file_operations = self.monitor_file_operations as u8;
        record.monitor_process_creation = self.monitor_process_creation as u8;
        record.monitor_image_loads = self.monitor_image_loads as u8;
        record.detect_injections = self.detect_injections as u8;
        record.detect_unsigned_drivers = self.detect_unsigned_drivers as u8;
        for prefix in &self.excluded_paths {
            record.push_excluded_path(prefix.as_bytes());
        }
        record
    }

    pub fn from_record(record: &FilterRecord) -> Result<Self> {
        if record.excluded_path_count as usize > MAX_EXCLUDED_PATHS {
            return Err(SentinelError::InvalidRequest {
                message: format!(
                    "excluded path count {} exceeds the {} slot limit",
                    record.excluded_path_count, MAX_EXCLUDED_PATHS
                ),
            });
        }
        let mut config = Self {
            monitor_file_operations: record.monitor_file_operations != 0,
            monitor_process_creation: record.monitor_process_creation != 0,
            monitor_image_loads: record.monitor_image_loads != 0,
            detect_injections: record.detect_injections != 0,
            detect_unsigned_drivers: record.detect_unsigned_drivers != 0,
            excluded_paths: Vec::new(),
        };
        for index in 0..record.excluded_path_count as usize {
            if let Some(prefix) = record.excluded_path_as_str(index) {
                config.excluded_paths.push(prefix.to_string());
            }
        }
        Ok(config)
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::monitor_all()
    }
}

fn starts_with_ignore_ascii_case(path: &str, prefix: &str) -> bool {
    path.len() >= prefix.len()
        && path.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Shared holder for the currently active filter.
pub struct ActiveFilter {
    inner: RwLock<Arc<FilterConfig>>,
}

impl ActiveFilter {
    pub fn new(initial: FilterConfig) -> Self {
        Self {
            inner: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn snapshot(&self) -> Arc<FilterConfig> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn replace(&self, config: FilterConfig) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(config);
    }
}
