//! sentinel-trace
//!
//! Endpoint telemetry pipeline: privileged-side capture (bounded MPSC
//! queue, heuristic classifiers, producer filter) drained through a
//! pull-based retrieval protocol into a user-space aggregator that fans
//! batches out to a trace-provider sink and a local IPC sink. Hook
//! registration and the platform trace transport stay behind the
//! `EventSource` and `TraceWriter` seams.

pub mod aggregator;
pub mod capture;
pub mod cli;
pub mod configuration;
pub mod errors;
pub mod protocol;
pub mod report;
pub mod service;
pub mod sinks;
pub mod sources;

pub use aggregator::Aggregator;
pub use capture::{CapturePipeline, Classifier, Detection, FilterConfig};
pub use cli::Args;
pub use errors::{MonitorCategory, Result, SentinelError};
pub use protocol::{ChannelClient, TelemetryChannel};
pub use report::SessionReport;
pub use service::{ServiceHandle, ServiceState, TelemetryService};
pub use sinks::{IpcSink, LogTraceWriter, SinkFanout, TraceSink};
pub use sources::{EventSource, SyntheticSource};
