//! End-to-end behavior of the capture pipeline and retrieval protocol,
//! exercised through the public API only.

use std::sync::Arc;

use assert_matches::assert_matches;
use sentinel_trace::capture::{CapturePipeline, FilterConfig};
use sentinel_trace::errors::SentinelError;
use sentinel_trace::protocol::{ChannelClient, TelemetryChannel};
use sentinel_trace_common::{EventType, TelemetryEvent, WireRecord};

fn client_for(pipeline: &Arc<CapturePipeline>) -> ChannelClient<Arc<CapturePipeline>> {
    ChannelClient::new(Arc::clone(pipeline))
}

mod queue_bounds {
    use super::*;

    #[test]
    fn burst_past_capacity_drops_newest_and_counts() {
        let pipeline = Arc::new(CapturePipeline::new(8, FilterConfig::monitor_all()));
        for i in 0..20 {
            pipeline.record_process_exit(i, "burst.exe");
        }

        let mut client = client_for(&pipeline);
        let stats = client.statistics().unwrap();
        assert_eq!(stats.total_events, 20);
        assert_eq!(stats.dropped_events, 12);
        assert_eq!(stats.buffer_overflows, 1);

        let retained = client.drain_batch(100).unwrap();
        let pids: Vec<u32> = retained.iter().map(|e| e.process_id).collect();
        assert_eq!(pids, (0..8).collect::<Vec<u32>>());
    }

    #[test]
    fn draining_reopens_admission() {
        let pipeline = Arc::new(CapturePipeline::new(4, FilterConfig::monitor_all()));
        for i in 0..6 {
            pipeline.record_process_exit(i, "a.exe");
        }

        let mut client = client_for(&pipeline);
        client.drain_batch(100).unwrap();
        pipeline.record_process_exit(99, "b.exe");

        let retained = client.drain_batch(100).unwrap();
        assert_eq!(retained.len(), 1);
        assert_eq!(retained[0].process_id, 99);
    }
}

mod stats_consistency {
    use super::*;

    #[test]
    fn totals_stay_consistent_under_concurrent_producers() {
        let pipeline = Arc::new(CapturePipeline::new(64, FilterConfig::monitor_all()));

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let pipeline = Arc::clone(&pipeline);
                std::thread::spawn(move || {
                    for i in 0..100u32 {
                        let pid = worker * 1000 + i;
                        match i % 3 {
                            0 => pipeline.record_file_operation(
                                EventType::FileWrite,
                                pid,
                                pid + 1,
                                "C:\\data\\log.txt",
                                "writer.exe",
                                0x4,
                                0,
                            ),
                            1 => pipeline.record_process_exit(pid, "worker.exe"),
                            _ => pipeline.record_image_load(
                                pid,
                                "C:\\Windows\\System32\\ntdll.dll",
                                "worker.exe",
                                0x7FF8_0000_0000,
                                0x1F_0000,
                            ),
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = pipeline.statistics();
        assert_eq!(stats.total_events, 400);
        assert_eq!(
            stats.total_events,
            stats.file_events + stats.process_events + stats.image_events
        );

        let mut client = client_for(&pipeline);
        let drained = client.drain_batch(1000).unwrap();
        assert_eq!(drained.len() as u64, stats.total_events - stats.dropped_events);
    }
}

mod filter_round_trip {
    use super::*;

    #[test]
    fn set_filter_then_snapshot_matches_and_excludes() {
        let pipeline = Arc::new(CapturePipeline::with_defaults());
        let mut config = FilterConfig::monitor_all()
            .with_excluded_path("C:\\Windows\\WinSxS\\")
            .unwrap()
            .with_excluded_path("C:\\ProgramData\\Cache\\")
            .unwrap();
        config.detect_injections = false;

        let mut client = client_for(&pipeline);
        client.apply_filter(&config).unwrap();
        assert_eq!(*pipeline.filter_snapshot(), config);

        // Operations under an excluded prefix produce zero events.
        pipeline.record_file_operation(
            EventType::FileRead,
            7,
            8,
            "C:\\Windows\\WinSxS\\manifest.xml",
            "TiWorker.exe",
            0x1,
            0,
        );
        pipeline.record_process_create(9, 10, 4, "C:\\ProgramData\\Cache\\tmp.exe", "tmp.exe");
        assert_eq!(client.statistics().unwrap().total_events, 0);

        // Outside the prefixes events still flow, and the disabled
        // injection heuristic leaves the temp-path process alone.
        pipeline.record_process_create(11, 12, 4, "C:\\Temp\\other.exe", "other.exe");
        let event = client.poll_telemetry().unwrap().unwrap();
        assert_eq!(event.kind(), Some(EventType::ProcessCreate));
        assert_eq!(client.statistics().unwrap().injection_detections, 0);
    }

    #[test]
    fn undersized_filter_payload_is_a_local_error() {
        let pipeline = Arc::new(CapturePipeline::with_defaults());
        let short = [0u8; 32];

        assert_matches!(
            pipeline.set_filter(&short),
            Err(SentinelError::InvalidRequest { .. })
        );

        // The previous filter stays active.
        pipeline.record_process_exit(1, "still-works.exe");
        assert_eq!(pipeline.statistics().total_events, 1);
    }
}

mod monitoring_toggle {
    use super::*;

    #[test]
    fn disable_is_a_cheap_no_op_enable_resumes() {
        let pipeline = Arc::new(CapturePipeline::with_defaults());
        let mut client = client_for(&pipeline);

        client.set_monitoring(false).unwrap();
        for i in 0..50 {
            pipeline.record_process_exit(i, "silent.exe");
        }
        assert_eq!(client.statistics().unwrap().total_events, 0);

        client.set_monitoring(true).unwrap();
        pipeline.record_process_exit(1, "audible.exe");
        assert_eq!(client.statistics().unwrap().total_events, 1);
    }
}

mod retrieval_errors {
    use super::*;

    #[test]
    fn undersized_telemetry_buffer_does_not_lose_the_event() {
        let pipeline = Arc::new(CapturePipeline::with_defaults());
        pipeline.record_process_exit(5, "once.exe");

        let mut small = [0u8; 64];
        assert_matches!(
            pipeline.get_telemetry(&mut small),
            Err(SentinelError::BufferTooSmall { .. })
        );

        let mut buf = [0u8; TelemetryEvent::WIRE_SIZE];
        assert_eq!(
            pipeline.get_telemetry(&mut buf).unwrap(),
            TelemetryEvent::WIRE_SIZE
        );
        let event = TelemetryEvent::read_from(&buf).unwrap();
        assert_eq!(event.process_id, 5);
    }
}

mod end_to_end_scenario {
    use super::*;

    #[test]
    fn system_driver_file_create_passes_temp_driver_is_flagged() {
        let pipeline = Arc::new(CapturePipeline::with_defaults());
        let mut client = client_for(&pipeline);

        // A file create under the canonical driver directory, owned by
        // the System process: no exclusion, no reclassification.
        pipeline.record_file_operation(
            EventType::FileCreate,
            4,
            0,
            "C:\\Windows\\System32\\drivers\\foo.sys",
            "System",
            0x1,
            0,
        );
        let event = client.poll_telemetry().unwrap().unwrap();
        assert_eq!(event.kind(), Some(EventType::FileCreate));
        assert_eq!(event.process_id, 4);
        assert_eq!(
            event.file_payload().unwrap().path_as_str(),
            "C:\\Windows\\System32\\drivers\\foo.sys"
        );

        // A driver image load (no owning process) from a temp location:
        // reclassified with the detection counter bumped.
        pipeline.record_image_load(0, "C:\\Temp\\evil.sys", "", 0xFFFF_8000_0000_0000, 0x8000);
        let event = client.poll_telemetry().unwrap().unwrap();
        assert_eq!(event.kind(), Some(EventType::UnsignedDriverLoad));
        let image = event.image_payload().unwrap();
        assert!(image.is_driver());
        assert!(!image.is_signed());
        assert_eq!(image.image_path_as_str(), "C:\\Temp\\evil.sys");

        let stats = client.statistics().unwrap();
        assert_eq!(stats.unsigned_driver_detections, 1);
        assert_eq!(stats.injection_detections, 0);
    }
}
