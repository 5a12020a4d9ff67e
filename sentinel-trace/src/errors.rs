//! Unified error types for sentinel-trace
//!
//! Producer-side failures are absorbed and counted, never raised; these
//! types cover the consumer side, where errors travel up to the poll
//! loop as values.

use sentinel_trace_common::{EventCategory, RecordError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("buffer too small: {provided} bytes provided, {required} required")]
    BufferTooSmall { required: usize, provided: usize },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("invalid monitor category: {category}. Valid categories: {valid_categories:?}")]
    InvalidCategory {
        category: String,
        valid_categories: Vec<String>,
    },

    #[error("configuration error: {message}")]
    ConfigError { message: String },

    #[error("event source failed to attach: {source_name} - {source}")]
    SourceAttachFailed {
        source_name: String,
        source: anyhow::Error,
    },

    #[error("event source already attached: {source_name}")]
    SourceAlreadyAttached { source_name: String },

    #[error("telemetry channel unreachable: {message}")]
    ChannelUnreachable { message: String },

    #[error("service error: {message}")]
    ServiceError { message: String },
}

impl From<RecordError> for SentinelError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::BufferTooSmall { required, provided } => {
                SentinelError::BufferTooSmall { required, provided }
            }
        }
    }
}

/// A monitored event family that can be toggled on or off as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonitorCategory {
    FileOperations,
    ProcessLifecycle,
    ImageLoads,
}

impl MonitorCategory {
    pub fn all() -> Vec<MonitorCategory> {
        vec![
            Self::FileOperations,
            Self::ProcessLifecycle,
            Self::ImageLoads,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorCategory::FileOperations => "file",
            MonitorCategory::ProcessLifecycle => "process",
            MonitorCategory::ImageLoads => "image",
        }
    }

    pub fn event_category(&self) -> EventCategory {
        match self {
            MonitorCategory::FileOperations => EventCategory::File,
            MonitorCategory::ProcessLifecycle => EventCategory::Process,
            MonitorCategory::ImageLoads => EventCategory::Image,
        }
    }
}

impl std::fmt::Display for MonitorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MonitorCategory {
    type Err = SentinelError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "file" => Ok(MonitorCategory::FileOperations),
            "process" => Ok(MonitorCategory::ProcessLifecycle),
            "image" => Ok(MonitorCategory::ImageLoads),
            _ => Err(SentinelError::InvalidCategory {
                category: s.to_string(),
                valid_categories: MonitorCategory::all()
                    .iter()
                    .map(|c| c.as_str().to_string())
                    .collect(),
            }),
        }
    }
}

pub type Result<T> = std::result::Result<T, SentinelError>;
