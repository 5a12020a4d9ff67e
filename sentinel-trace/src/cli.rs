//! Command-line interface

use std::path::PathBuf;

use clap::Parser;

use crate::errors::{MonitorCategory, Result};

#[derive(Debug, Clone, Parser)]
#[clap(
    name = "sentinel-trace",
    about = "Endpoint telemetry capture and distribution service"
)]
pub struct Args {
    #[clap(
        short,
        long,
        help = "Monitored categories: comma-separated file, process, image, or all"
    )]
    pub categories: Option<String>,

    #[clap(short, long, help = "Duration to run in seconds")]
    pub duration: Option<u64>,

    #[clap(short, long, help = "Poll interval in seconds")]
    pub interval: Option<u64>,

    #[clap(long, help = "Capture queue capacity in events")]
    pub queue_capacity: Option<usize>,

    #[clap(long, help = "Aggregation buffer capacity in events")]
    pub buffer_capacity: Option<usize>,

    #[clap(
        short,
        long,
        help = "Excluded path prefix, repeatable up to 10 times"
    )]
    pub exclude: Vec<String>,

    #[clap(long, help = "Configuration file path (YAML, JSON, or TOML)")]
    pub config: Option<PathBuf>,

    #[clap(long, help = "IPC socket path for the telemetry channel")]
    pub socket: Option<PathBuf>,

    #[clap(short, long, help = "Show verbose output")]
    pub verbose: bool,

    #[clap(long, help = "Feed synthetic telemetry through the pipeline")]
    pub simulate: bool,

    #[clap(
        short,
        long,
        help = "Write the session report to this file at exit (.json or .md)"
    )]
    pub output: Option<PathBuf>,
}

impl Args {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(0) = self.interval {
            return Err("Poll interval must be at least 1 second".to_string());
        }
        if self.exclude.len() > sentinel_trace_common::MAX_EXCLUDED_PATHS {
            return Err(format!(
                "At most {} excluded paths are supported",
                sentinel_trace_common::MAX_EXCLUDED_PATHS
            ));
        }
        if let Some(categories) = &self.categories {
            self.parse_category_list(categories).map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    fn parse_category_list(&self, value: &str) -> Result<Vec<MonitorCategory>> {
        if value == "all" {
            return Ok(MonitorCategory::all());
        }
        value
            .split(',')
            .map(|part| part.trim().parse::<MonitorCategory>())
            .collect()
    }
}
