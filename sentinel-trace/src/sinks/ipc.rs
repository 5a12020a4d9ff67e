//! IPC sink
//!
//! Single-instance, single-reader local channel carrying fixed-size
//! event records, one record per message. The channel is created lazily:
//! a publish with no attached client makes one bounded accept attempt
//! and otherwise fails fast, so an absent or stalled consumer can never
//! wedge the poll loop. A broken connection tears the client down and
//! the next publish reconnects.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use sentinel_trace_common::{TelemetryEvent, WireRecord};
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::time::timeout;

use super::{EventSink, PublishReport, SinkError};

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/sentinel-trace.sock";
pub const DEFAULT_ACCEPT_TIMEOUT: Duration = Duration::from_millis(100);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

pub struct IpcSink {
    socket_path: PathBuf,
    accept_timeout: Duration,
    write_timeout: Duration,
    listener: Option<UnixListener>,
    client: Option<UnixStream>,
}

impl IpcSink {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            accept_timeout: DEFAULT_ACCEPT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            listener: None,
            client: None,
        }
    }

    pub fn with_timeouts(mut self, accept: Duration, write: Duration) -> Self {
        self.accept_timeout = accept;
        self.write_timeout = write;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Hands out the connected stream, accepting a new client within the
    /// bounded window when none is attached.
    async fn take_client(&mut self) -> Result<UnixStream, SinkError> {
        if let Some(stream) = self.client.take() {
            return Ok(stream);
        }

        if self.listener.is_none() {
            self.listener = Some(bind_listener(&self.socket_path)?);
            info!("telemetry channel listening at {}", self.socket_path.display());
        }
        let Some(listener) = self.listener.as_ref() else {
            return Err(SinkError::NoClient);
        };

        match timeout(self.accept_timeout, listener.accept()).await {
            Ok(Ok((stream, _addr))) => {
                info!("telemetry client attached");
                Ok(stream)
            }
            Ok(Err(source)) => Err(SinkError::Setup { source }),
            Err(_elapsed) => Err(SinkError::NoClient),
        }
    }
}

/// Binds the listener socket, replacing a stale socket file left behind
/// by an earlier instance.
fn bind_listener(path: &Path) -> Result<UnixListener, SinkError> {
    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(err) if err.kind() == io::ErrorKind::AddrInUse => {
            std::fs::remove_file(path).map_err(|source| SinkError::Setup { source })?;
            UnixListener::bind(path).map_err(|source| SinkError::Setup { source })
        }
        Err(source) => Err(SinkError::Setup { source }),
    }
}

impl EventSink for IpcSink {
    fn name(&self) -> &'static str {
        "ipc"
    }

    async fn publish(
        &mut self,
        events: &[TelemetryEvent],
    ) -> std::result::Result<PublishReport, SinkError> {
        if events.is_empty() {
            return Ok(PublishReport::default());
        }

        let mut stream = self.take_client().await?;
        let mut written = 0;
        for event in events {
            match timeout(self.write_timeout, stream.write_all(event.as_bytes())).await {
                Ok(Ok(())) => written += 1,
                Ok(Err(source)) => {
                    debug!("telemetry client dropped after {} records", written);
                    return Err(SinkError::Disconnected { source });
                }
                Err(_elapsed) => return Err(SinkError::WriteTimeout),
            }
        }
        match timeout(self.write_timeout, stream.flush()).await {
            Ok(Ok(())) => {}
            Ok(Err(source)) => return Err(SinkError::Disconnected { source }),
            Err(_elapsed) => return Err(SinkError::WriteTimeout),
        }

        // Keep the client for the next batch only after a clean write.
        self.client = Some(stream);
        Ok(PublishReport { written, failed: 0 })
    }
}

impl Drop for IpcSink {
    fn drop(&mut self) {
        if self.listener.is_some() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}
