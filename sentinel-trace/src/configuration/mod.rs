//! Unified configuration system
//!
//! Combines defaults, an optional config file, and CLI arguments into
//! one validated object consumed at startup. Runtime-mutable settings
//! (the producer filter) leave through [`Configuration::initial_filter`]
//! and live in the capture pipeline afterwards; everything here is
//! immutable for the life of the process.
//!
//! ```rust
//! use sentinel_trace::configuration::Configuration;
//!
//! let config = Configuration::builder()
//!     .from_cli_args(&["--categories", "file,process", "--interval", "2"])
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.poll_interval().as_secs(), 2);
//! assert!(config.initial_filter().monitor_file_operations);
//! ```

pub mod builder;
pub mod types;

pub use builder::ConfigurationBuilder;
pub use types::*;

use std::path::Path;
use std::time::Duration;

use sentinel_trace_common::MAX_EXCLUDED_PATHS;

use crate::capture::FilterConfig;
use crate::errors::{MonitorCategory, SentinelError};

#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub monitoring: Monitoring,
    pub capture: Capture,
    pub output: Output,
    pub ipc: Ipc,
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    pub fn validate(&self) -> Result<(), SentinelError> {
        if self.monitoring.categories.is_empty() {
            return Err(SentinelError::ConfigError {
                message: "At least one monitor category must be specified".to_string(),
            });
        }
        if self.monitoring.poll_interval.is_zero() {
            return Err(SentinelError::ConfigError {
                message: "Poll interval must be non-zero".to_string(),
            });
        }
        if self.capture.queue_capacity == 0
            || self.capture.aggregator_capacity == 0
            || self.capture.drain_batch == 0
        {
            return Err(SentinelError::ConfigError {
                message: "Capture capacities and drain batch must be non-zero".to_string(),
            });
        }
        if self.monitoring.excluded_paths.len() > MAX_EXCLUDED_PATHS {
            return Err(SentinelError::ConfigError {
                message: format!(
                    "At most {} excluded paths are supported, got {}",
                    MAX_EXCLUDED_PATHS,
                    self.monitoring.excluded_paths.len()
                ),
            });
        }
        Ok(())
    }

    pub fn has_category(&self, category: MonitorCategory) -> bool {
        self.monitoring.categories.contains(&category)
    }

    pub fn poll_interval(&self) -> Duration {
        self.monitoring.poll_interval
    }

    pub fn duration(&self) -> Option<Duration> {
        self.monitoring.duration
    }

    pub fn is_verbose(&self) -> bool {
        self.output.verbose
    }

    pub fn queue_capacity(&self) -> usize {
        self.capture.queue_capacity
    }

    pub fn aggregator_capacity(&self) -> usize {
        self.capture.aggregator_capacity
    }

    pub fn drain_batch(&self) -> usize {
        self.capture.drain_batch
    }

    pub fn socket_path(&self) -> &Path {
        &self.ipc.socket_path
    }

    pub fn accept_timeout(&self) -> Duration {
        self.ipc.accept_timeout
    }

    pub fn write_timeout(&self) -> Duration {
        self.ipc.write_timeout
    }

    /// The producer filter the pipeline starts with. Later changes go
    /// through the retrieval protocol's set-filter operation, not here.
    pub fn initial_filter(&self) -> FilterConfig {
        let mut filter = FilterConfig::monitor_all();
        filter.monitor_file_operations = self.has_category(MonitorCategory::FileOperations);
        filter.monitor_process_creation = self.has_category(MonitorCategory::ProcessLifecycle);
        filter.monitor_image_loads = self.has_category(MonitorCategory::ImageLoads);
        filter.detect_injections = self.monitoring.detect_injections;
        filter.detect_unsigned_drivers = self.monitoring.detect_unsigned_drivers;
        for path in &self.monitoring.excluded_paths {
            filter = match filter.clone().with_excluded_path(path.clone()) {
                Ok(filter) => filter,
                // Path count is bounded by validate().
                Err(_) => break,
            };
        }
        filter
    }
}
