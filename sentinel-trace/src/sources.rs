//! Event sources
//!
//! Hook registration is platform glue; the pipeline only ever sees this
//! trait. An adapter owns its registration lifetime and feeds the
//! pipeline's `record_*` entry points from whatever context the
//! platform calls it in.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use sentinel_trace_common::EventType;

use crate::capture::CapturePipeline;
use crate::errors::{Result, SentinelError};

pub trait EventSource {
    fn name(&self) -> &'static str;

    /// Registers the underlying hooks and starts feeding the pipeline.
    fn attach(&mut self, pipeline: &Arc<CapturePipeline>) -> Result<()>;

    /// Unregisters the hooks. Idempotent.
    fn detach(&mut self) -> Result<()>;

    fn is_attached(&self) -> bool;
}

/// Stand-in for the OS hooks: worker threads that replay a small, mostly
/// benign workload with the occasional suspicious pattern mixed in.
/// Useful for demos and for exercising the full pipeline under
/// multi-producer load.
pub struct SyntheticSource {
    worker_count: usize,
    event_interval: Duration,
    running: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self {
            worker_count: 2,
            event_interval: Duration::from_millis(50),
            running: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        }
    }

    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    pub fn with_event_interval(mut self, event_interval: Duration) -> Self {
        self.event_interval = event_interval;
        self
    }

    fn run_worker(
        worker: u32,
        pipeline: Arc<CapturePipeline>,
        running: Arc<AtomicBool>,
        event_interval: Duration,
    ) {
        let mut sequence = 0u32;
        while running.load(Ordering::Relaxed) {
            emit_scenario_step(&pipeline, worker, sequence);
            sequence = sequence.wrapping_add(1);
            std::thread::sleep(event_interval);
        }
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

fn emit_scenario_step(pipeline: &CapturePipeline, worker: u32, sequence: u32) {
    let pid = 1000 + worker * 100 + (sequence % 7);
    let tid = pid + 1;
    match sequence % 8 {
        0 => pipeline.record_file_operation(
            EventType::FileCreate,
            pid,
            tid,
            "C:\\Users\\svc\\Documents\\report.docx",
            "winword.exe",
            0x1,
            0,
        ),
        1 => pipeline.record_file_operation(
            EventType::FileWrite,
            pid,
            tid,
            "C:\\ProgramData\\vendor\\cache.bin",
            "svchost.exe",
            0x4,
            0,
        ),
        2 => pipeline.record_process_create(
            pid,
            tid,
            4,
            "C:\\Program Files\\Vendor\\tool.exe",
            "tool.exe",
        ),
        3 => pipeline.record_image_load(
            pid,
            "C:\\Windows\\System32\\ntdll.dll",
            "tool.exe",
            0x7FF8_0000_0000,
            0x1F_0000,
        ),
        4 => pipeline.record_file_operation(
            EventType::FileRead,
            pid,
            tid,
            "C:\\Windows\\System32\\config\\SOFTWARE",
            "svchost.exe",
            0x1,
            0,
        ),
        5 => pipeline.record_process_exit(pid, "tool.exe"),
        // Suspicious patterns show up rarely so detections stay visible
        // against the baseline noise.
        6 if sequence % 24 == 6 => pipeline.record_process_create(
            pid,
            tid,
            pid,
            "C:\\Users\\svc\\AppData\\Local\\Temp\\stage2.exe",
            "stage2.exe",
        ),
        7 if sequence % 48 == 7 => pipeline.record_image_load(
            0,
            "C:\\Users\\svc\\Downloads\\helper.sys",
            "",
            0xFFFF_8000_1000_0000,
            0x8000,
        ),
        _ => pipeline.record_file_operation(
            EventType::FileRead,
            pid,
            tid,
            "C:\\Windows\\System32\\kernel32.dll",
            "tool.exe",
            0x1,
            0,
        ),
    }
}

impl EventSource for SyntheticSource {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn attach(&mut self, pipeline: &Arc<CapturePipeline>) -> Result<()> {
        if self.is_attached() {
            return Err(SentinelError::SourceAlreadyAttached {
                source_name: self.name().to_string(),
            });
        }

        self.running.store(true, Ordering::Relaxed);
        for worker in 0..self.worker_count {
            let pipeline = Arc::clone(pipeline);
            let running = Arc::clone(&self.running);
            let event_interval = self.event_interval;
            self.workers.push(std::thread::spawn(move || {
                Self::run_worker(worker as u32, pipeline, running, event_interval)
            }));
        }
        Ok(())
    }

    fn detach(&mut self) -> Result<()> {
        if !self.is_attached() {
            return Ok(());
        }
        self.running.store(false, Ordering::Relaxed);
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        Ok(())
    }

    fn is_attached(&self) -> bool {
        !self.workers.is_empty()
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        let _ = self.detach();
    }
}
