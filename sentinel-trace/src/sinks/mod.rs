//! Event sink fan-out
//!
//! Each sink consumes its own pass over the published batch; a failing
//! or slow sink is counted and reported without touching the other
//! sink's delivery or the poll loop.

pub mod ipc;
pub mod trace;

pub use ipc::IpcSink;
pub use trace::{LogTraceWriter, TraceSink, TraceWriter};

use sentinel_trace_common::TelemetryEvent;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no client attached")]
    NoClient,

    #[error("client disconnected: {source}")]
    Disconnected {
        #[source]
        source: std::io::Error,
    },

    #[error("write timed out")]
    WriteTimeout,

    #[error("channel setup failed: {source}")]
    Setup {
        #[source]
        source: std::io::Error,
    },
}

/// Per-publish accounting: events delivered and events that failed
/// individually without aborting the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub written: usize,
    pub failed: usize,
}

pub trait EventSink {
    fn name(&self) -> &'static str;

    #[allow(async_fn_in_trait)]
    async fn publish(
        &mut self,
        events: &[TelemetryEvent],
    ) -> std::result::Result<PublishReport, SinkError>;
}

/// What one sink did with one batch.
#[derive(Debug)]
pub struct SinkOutcome {
    pub sink: &'static str,
    pub result: std::result::Result<PublishReport, SinkError>,
}

/// The two production sinks plus cumulative failure counters. Sinks run
/// in sequence but independently: an error from the first never
/// short-circuits the second.
pub struct SinkFanout<T, I> {
    trace: T,
    ipc: I,
    trace_failures: u64,
    ipc_failures: u64,
}

impl<T: EventSink, I: EventSink> SinkFanout<T, I> {
    pub fn new(trace: T, ipc: I) -> Self {
        Self {
            trace,
            ipc,
            trace_failures: 0,
            ipc_failures: 0,
        }
    }

    pub async fn publish_all(&mut self, events: &[TelemetryEvent]) -> Vec<SinkOutcome> {
        let trace_result = self.trace.publish(events).await;
        self.trace_failures += failure_weight(&trace_result);

        let ipc_result = self.ipc.publish(events).await;
        self.ipc_failures += failure_weight(&ipc_result);

        vec![
            SinkOutcome {
                sink: self.trace.name(),
                result: trace_result,
            },
            SinkOutcome {
                sink: self.ipc.name(),
                result: ipc_result,
            },
        ]
    }

    pub fn trace_failures(&self) -> u64 {
        self.trace_failures
    }

    pub fn ipc_failures(&self) -> u64 {
        self.ipc_failures
    }
}

fn failure_weight(result: &std::result::Result<PublishReport, SinkError>) -> u64 {
    match result {
        Ok(report) => report.failed as u64,
        Err(_) => 1,
    }
}
