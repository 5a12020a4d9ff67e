//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::aggregator::{DEFAULT_AGGREGATOR_CAPACITY, DEFAULT_DRAIN_BATCH};
use crate::capture::DEFAULT_QUEUE_CAPACITY;
use crate::errors::MonitorCategory;
use crate::service::DEFAULT_POLL_INTERVAL;
use crate::sinks::ipc::{DEFAULT_ACCEPT_TIMEOUT, DEFAULT_SOCKET_PATH, DEFAULT_WRITE_TIMEOUT};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitoring {
    pub categories: Vec<MonitorCategory>,
    pub poll_interval: Duration,
    pub duration: Option<Duration>,
    pub detect_injections: bool,
    pub detect_unsigned_drivers: bool,
    pub excluded_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    pub queue_capacity: usize,
    pub aggregator_capacity: usize,
    pub drain_batch: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Output {
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ipc {
    pub socket_path: PathBuf,
    pub accept_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for Monitoring {
    fn default() -> Self {
        Self {
            categories: MonitorCategory::all(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            duration: None,
            detect_injections: true,
            detect_unsigned_drivers: true,
            excluded_paths: Vec::new(),
        }
    }
}

impl Default for Capture {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            aggregator_capacity: DEFAULT_AGGREGATOR_CAPACITY,
            drain_batch: DEFAULT_DRAIN_BATCH,
        }
    }
}

impl Default for Ipc {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            accept_timeout: DEFAULT_ACCEPT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}
