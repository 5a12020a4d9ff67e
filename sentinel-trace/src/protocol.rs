//! Retrieval protocol
//!
//! The synchronous pull interface between the privileged capture side
//! and the consumer. Operations carry fixed-size records through caller
//! supplied byte buffers, mirroring a control-channel round trip: an
//! undersized buffer is the caller's local error, an empty queue is a
//! normal result, and nothing here disturbs in-flight producers.

use std::sync::Arc;

use bytes::BytesMut;
use log::info;
use sentinel_trace_common::{FilterRecord, StatsRecord, TelemetryEvent, WireRecord};

use crate::capture::{CapturePipeline, FilterConfig};
use crate::errors::{Result, SentinelError};

/// The four control operations exposed by the capture side.
pub trait TelemetryChannel: Send + Sync {
    /// Copies the oldest queued event into `out` and returns its size,
    /// or 0 when no event is available.
    fn get_telemetry(&self, out: &mut [u8]) -> Result<usize>;

    /// Copies a consistent statistics snapshot into `out`.
    fn get_stats(&self, out: &mut [u8]) -> Result<usize>;

    /// Atomically replaces the active filter from its wire form.
    fn set_filter(&self, payload: &[u8]) -> Result<()>;

    /// Toggles the producer-side monitoring flag; hooks stay attached.
    fn set_monitoring(&self, enabled: bool) -> Result<()>;
}

impl TelemetryChannel for CapturePipeline {
    fn get_telemetry(&self, out: &mut [u8]) -> Result<usize> {
        if out.len() < TelemetryEvent::WIRE_SIZE {
            return Err(SentinelError::BufferTooSmall {
                required: TelemetryEvent::WIRE_SIZE,
                provided: out.len(),
            });
        }
        match self.queue().dequeue() {
            Some(event) => Ok(event.write_to(out)?),
            None => Ok(0),
        }
    }

    fn get_stats(&self, out: &mut [u8]) -> Result<usize> {
        Ok(self.statistics().write_to(out)?)
    }

    fn set_filter(&self, payload: &[u8]) -> Result<()> {
        let record = FilterRecord::read_from(payload).map_err(|_| SentinelError::InvalidRequest {
            message: format!(
                "filter payload must be at least {} bytes",
                FilterRecord::WIRE_SIZE
            ),
        })?;
        let config = FilterConfig::from_record(&record)?;
        self.replace_filter(config);
        info!("filter configuration replaced");
        Ok(())
    }

    fn set_monitoring(&self, enabled: bool) -> Result<()> {
        self.set_monitoring_enabled(enabled);
        info!(
            "monitoring {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }
}

impl<T: TelemetryChannel + ?Sized> TelemetryChannel for Arc<T> {
    fn get_telemetry(&self, out: &mut [u8]) -> Result<usize> {
        (**self).get_telemetry(out)
    }

    fn get_stats(&self, out: &mut [u8]) -> Result<usize> {
        (**self).get_stats(out)
    }

    fn set_filter(&self, payload: &[u8]) -> Result<()> {
        (**self).set_filter(payload)
    }

    fn set_monitoring(&self, enabled: bool) -> Result<()> {
        (**self).set_monitoring(enabled)
    }
}

/// Typed wrapper over a [`TelemetryChannel`]. Owns one reusable scratch
/// buffer so per-poll reads don't allocate.
pub struct ChannelClient<C> {
    channel: C,
    scratch: BytesMut,
}

impl<C: TelemetryChannel> ChannelClient<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            scratch: BytesMut::with_capacity(TelemetryEvent::WIRE_SIZE),
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn poll_telemetry(&mut self) -> Result<Option<TelemetryEvent>> {
        self.scratch.resize(TelemetryEvent::WIRE_SIZE, 0);
        let written = self.channel.get_telemetry(&mut self.scratch)?;
        if written == 0 {
            return Ok(None);
        }
        Ok(Some(TelemetryEvent::read_from(&self.scratch)?))
    }

    /// Pulls up to `max` events in one burst.
    pub fn drain_batch(&mut self, max: usize) -> Result<Vec<TelemetryEvent>> {
        let mut batch = Vec::new();
        while batch.len() < max {
            match self.poll_telemetry()? {
                Some(event) => batch.push(event),
                None => break,
            }
        }
        Ok(batch)
    }

    pub fn statistics(&mut self) -> Result<StatsRecord> {
        self.scratch.resize(StatsRecord::WIRE_SIZE, 0);
        self.channel.get_stats(&mut self.scratch)?;
        Ok(StatsRecord::read_from(&self.scratch)?)
    }

    pub fn apply_filter(&mut self, config: &FilterConfig) -> Result<()> {
        self.scratch.resize(FilterRecord::WIRE_SIZE, 0);
        config.to_record().write_to(&mut self.scratch)?;
        self.channel.set_filter(&self.scratch)
    }

    pub fn set_monitoring(&mut self, enabled: bool) -> Result<()> {
        self.channel.set_monitoring(enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sentinel_trace_common::EventType;

    fn pipeline_with_one_event() -> Arc<CapturePipeline> {
        let pipeline = Arc::new(CapturePipeline::with_defaults());
        pipeline.record_file_operation(
            EventType::FileCreate,
            4,
            0,
            "C:\\Windows\\System32\\drivers\\foo.sys",
            "System",
            0,
            0,
        );
        pipeline
    }

    mod get_telemetry {
        use super::*;

        #[test]
        fn should_reject_undersized_buffer_without_consuming() {
            let pipeline = pipeline_with_one_event();
            let mut small = [0u8; 16];

            assert_matches!(
                pipeline.get_telemetry(&mut small),
                Err(SentinelError::BufferTooSmall { provided: 16, .. })
            );
            // The event survives for a correctly sized request.
            assert_eq!(pipeline.queue().len(), 1);
        }

        #[test]
        fn should_signal_empty_with_zero_not_error() {
            let pipeline = Arc::new(CapturePipeline::with_defaults());
            let mut buf = [0u8; TelemetryEvent::WIRE_SIZE];

            assert_eq!(pipeline.get_telemetry(&mut buf).unwrap(), 0);
        }

        #[test]
        fn client_round_trips_single_event() {
            let mut client = ChannelClient::new(pipeline_with_one_event());

            let event = client.poll_telemetry().unwrap().unwrap();
            assert_eq!(event.kind(), Some(EventType::FileCreate));
            assert_eq!(event.process_id, 4);
            assert_eq!(
                event.file_payload().unwrap().path_as_str(),
                "C:\\Windows\\System32\\drivers\\foo.sys"
            );

            assert!(client.poll_telemetry().unwrap().is_none());
        }

        #[test]
        fn drain_batch_is_bounded() {
            let pipeline = Arc::new(CapturePipeline::with_defaults());
            for i in 0..10 {
                pipeline.record_process_exit(i, "w.exe");
            }
            let mut client = ChannelClient::new(pipeline);

            assert_eq!(client.drain_batch(4).unwrap().len(), 4);
            assert_eq!(client.drain_batch(100).unwrap().len(), 6);
        }
    }

    mod get_stats {
        use super::*;

        #[test]
        fn snapshot_reflects_pipeline_counters() {
            let mut client = ChannelClient::new(pipeline_with_one_event());

            let stats = client.statistics().unwrap();
            assert_eq!(stats.total_events, 1);
            assert_eq!(stats.file_events, 1);
        }
    }

    mod set_filter {
        use super::*;

        #[test]
        fn should_apply_round_tripped_config() {
            let pipeline = Arc::new(CapturePipeline::with_defaults());
            let config = FilterConfig::monitor_all()
                .with_excluded_path("C:\\Windows\\Temp\\")
                .unwrap();

            let mut client = ChannelClient::new(Arc::clone(&pipeline));
            client.apply_filter(&config).unwrap();

            assert_eq!(*pipeline.filter_snapshot(), config);

            pipeline.record_file_operation(
                EventType::FileWrite,
                9,
                9,
                "C:\\Windows\\Temp\\drop.bin",
                "setup.exe",
                0,
                0,
            );
            assert_eq!(pipeline.statistics().total_events, 0);
        }

        #[test]
        fn should_reject_undersized_payload() {
            let pipeline = CapturePipeline::with_defaults();

            assert_matches!(
                pipeline.set_filter(&[0u8; 8]),
                Err(SentinelError::InvalidRequest { .. })
            );
        }
    }

    mod set_monitoring {
        use super::*;

        #[test]
        fn disabling_stops_producers_without_detaching() {
            let pipeline = Arc::new(CapturePipeline::with_defaults());
            let mut client = ChannelClient::new(Arc::clone(&pipeline));

            client.set_monitoring(false).unwrap();
            pipeline.record_process_exit(1, "quiet.exe");
            assert_eq!(pipeline.statistics().total_events, 0);

            client.set_monitoring(true).unwrap();
            pipeline.record_process_exit(1, "loud.exe");
            assert_eq!(pipeline.statistics().total_events, 1);
        }
    }
}
