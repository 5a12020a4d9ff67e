//! Configuration builder
//!
//! Constructs [`Configuration`] instances from defaults, a config file
//! (YAML, JSON, or TOML by extension), and CLI arguments, with the later
//! source overriding the earlier one section by section.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::types::{Capture, Ipc, Monitoring, Output};
use super::Configuration;
use crate::cli::Args;
use crate::errors::{MonitorCategory, SentinelError};

/// Sections a config file may override; missing sections keep their
/// current values.
#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    monitoring: Option<Monitoring>,
    capture: Option<Capture>,
    output: Option<Output>,
    ipc: Option<Ipc>,
}

#[derive(Debug, Default)]
pub struct ConfigurationBuilder {
    monitoring: Monitoring,
    capture: Capture,
    output: Output,
    ipc: Ipc,
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure from CLI-style arguments (`&[&str]` form for tests).
    pub fn from_cli_args(mut self, args: &[&str]) -> Result<Self, SentinelError> {
        let mut i = 0;
        while i < args.len() {
            match args[i] {
                "--categories" | "-c" => {
                    let value = Self::value_after(args, i)?;
                    self.monitoring.categories = parse_categories(value)?;
                    i += 2;
                }
                "--interval" | "-i" => {
                    let value = Self::value_after(args, i)?;
                    let secs: u64 = value.parse().map_err(|_| SentinelError::ConfigError {
                        message: format!("Invalid interval: {}", value),
                    })?;
                    self.monitoring.poll_interval = Duration::from_secs(secs);
                    i += 2;
                }
                "--duration" | "-d" => {
                    let value = Self::value_after(args, i)?;
                    let secs: u64 = value.parse().map_err(|_| SentinelError::ConfigError {
                        message: format!("Invalid duration: {}", value),
                    })?;
                    self.monitoring.duration = Some(Duration::from_secs(secs));
                    i += 2;
                }
                "--queue-capacity" => {
                    let value = Self::value_after(args, i)?;
                    self.capture.queue_capacity =
                        value.parse().map_err(|_| SentinelError::ConfigError {
                            message: format!("Invalid queue capacity: {}", value),
                        })?;
                    i += 2;
                }
                "--buffer-capacity" => {
                    let value = Self::value_after(args, i)?;
                    self.capture.aggregator_capacity =
                        value.parse().map_err(|_| SentinelError::ConfigError {
                            message: format!("Invalid buffer capacity: {}", value),
                        })?;
                    i += 2;
                }
                "--exclude" | "-e" => {
                    let value = Self::value_after(args, i)?;
                    self.monitoring.excluded_paths.push(value.to_string());
                    i += 2;
                }
                "--verbose" | "-v" => {
                    self.output.verbose = true;
                    i += 1;
                }
                _ => {
                    i += 1; // Skip unknown arguments for now
                }
            }
        }
        Ok(self)
    }

    /// Applies parsed clap arguments on top of the current state. Only
    /// flags the user actually set override the file-provided values.
    pub fn from_args(mut self, args: &Args) -> Result<Self, SentinelError> {
        if let Some(categories) = &args.categories {
            self.monitoring.categories = parse_categories(categories)?;
        }
        if let Some(secs) = args.interval {
            self.monitoring.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = args.duration {
            self.monitoring.duration = Some(Duration::from_secs(secs));
        }
        if let Some(capacity) = args.queue_capacity {
            self.capture.queue_capacity = capacity;
        }
        if let Some(capacity) = args.buffer_capacity {
            self.capture.aggregator_capacity = capacity;
        }
        if !args.exclude.is_empty() {
            self.monitoring.excluded_paths = args.exclude.clone();
        }
        if let Some(socket) = &args.socket {
            self.ipc.socket_path = socket.clone();
        }
        if args.verbose {
            self.output.verbose = true;
        }
        Ok(self)
    }

    /// Configure from a config file, detecting the format by extension
    /// (`.json`, `.toml`, anything else parses as YAML).
    pub fn from_config_file<P: AsRef<Path>>(self, path: P) -> Result<Self, SentinelError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| SentinelError::ConfigError {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => self.from_json_str(&content),
            Some("toml") => self.from_toml_str(&content),
            _ => self.from_yaml_str(&content),
        }
    }

    pub fn from_yaml_str(self, yaml: &str) -> Result<Self, SentinelError> {
        let document: ConfigDocument =
            serde_yaml::from_str(yaml).map_err(|e| SentinelError::ConfigError {
                message: format!("Failed to parse YAML config: {}", e),
            })?;
        Ok(self.merge(document))
    }

    pub fn from_json_str(self, json: &str) -> Result<Self, SentinelError> {
        let document: ConfigDocument =
            serde_json::from_str(json).map_err(|e| SentinelError::ConfigError {
                message: format!("Failed to parse JSON config: {}", e),
            })?;
        Ok(self.merge(document))
    }

    pub fn from_toml_str(self, toml_str: &str) -> Result<Self, SentinelError> {
        let document: ConfigDocument =
            toml::from_str(toml_str).map_err(|e| SentinelError::ConfigError {
                message: format!("Failed to parse TOML config: {}", e),
            })?;
        Ok(self.merge(document))
    }

    fn merge(mut self, document: ConfigDocument) -> Self {
        if let Some(monitoring) = document.monitoring {
            self.monitoring = monitoring;
        }
        if let Some(capture) = document.capture {
            self.capture = capture;
        }
        if let Some(output) = document.output {
            self.output = output;
        }
        if let Some(ipc) = document.ipc {
            self.ipc = ipc;
        }
        self
    }

    pub fn build(self) -> Result<Configuration, SentinelError> {
        let config = Configuration {
            monitoring: self.monitoring,
            capture: self.capture,
            output: self.output,
            ipc: self.ipc,
        };
        config.validate()?;
        Ok(config)
    }

    fn value_after<'a>(args: &[&'a str], index: usize) -> Result<&'a str, SentinelError> {
        args.get(index + 1)
            .copied()
            .ok_or_else(|| SentinelError::ConfigError {
                message: format!("Missing value for {}", args[index]),
            })
    }
}

fn parse_categories(value: &str) -> Result<Vec<MonitorCategory>, SentinelError> {
    if value == "all" {
        return Ok(MonitorCategory::all());
    }
    value
        .split(',')
        .map(|part| part.trim().parse::<MonitorCategory>())
        .collect()
}
