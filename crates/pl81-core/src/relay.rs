//! Transparent relay between a client application and the panel.
//!
//! One thread owns both endpoints and the capture log for the lifetime of a
//! session. Each loop iteration services whichever side has bytes pending:
//! read a chunk, append the capture record, write the identical bytes to the
//! peer, flush. Chunks are never coalesced, split, delayed, or reordered.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::capture::{CaptureLog, CaptureRecord, Direction};
use crate::endpoint::{EndpointError, SerialEndpoint};
use crate::events::{RelayEvent, RelayObserver, TracingObserver};
use crate::protocol::constants::{DEFAULT_BAUD, READ_CHUNK_SIZE};

/// Sleep when neither side has pending bytes. Keeps the loop off the CPU
/// while bounding how late a stop request can be observed.
const IDLE_WAIT: Duration = Duration::from_millis(20);

/// Configuration for a relay session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Real device path. `None` means autodiscover the CH340 bridge.
    pub device_port: Option<String>,
    /// Baud rate for the device side.
    pub baud: u32,
    /// Directory capture logs are written under.
    pub capture_dir: PathBuf,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            device_port: None,
            baud: DEFAULT_BAUD,
            capture_dir: PathBuf::from("captures"),
        }
    }
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RelayConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum RelayError {
    /// An endpoint could not be opened; the session never starts.
    #[error("could not open endpoint: {0}")]
    EndpointUnavailable(#[source] EndpointError),

    /// An endpoint failed mid-session. Counters record how much traffic had
    /// moved before the failure.
    #[error(
        "I/O failure on the {side} side after app→light {from_client} / light→app {from_device} bytes: {source}"
    )]
    IoFailure {
        side: &'static str,
        #[source]
        source: EndpointError,
        from_client: u64,
        from_device: u64,
    },

    /// The capture log could not be written.
    #[error("capture log error: {0}")]
    Capture(#[from] std::io::Error),

    /// `run` was called on a session that already stopped.
    #[error("session already stopped")]
    AlreadyStopped,
}

/// Session lifecycle. Never transitions backwards; a stopped session cannot
/// be restarted, a new one must be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Running,
    Stopped,
}

/// Cloneable stop flag.
///
/// Flipping the flag is all an asynchronous interrupt may do; the relay
/// thread observes it within one bounded wait and performs the actual
/// shutdown itself, so no endpoint is ever closed from a signal handler.
#[derive(Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the session to stop. Idempotent and async-signal-safe.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct RelayIo {
    client: Box<dyn SerialEndpoint>,
    device: Box<dyn SerialEndpoint>,
    log: CaptureLog,
}

/// One relay session: two endpoints, one capture log, per-direction byte
/// counters. All owned exclusively by the thread that calls [`run`].
///
/// [`run`]: RelaySession::run
pub struct RelaySession<O: RelayObserver> {
    io: Option<RelayIo>,
    observer: Arc<O>,
    stop: StopHandle,
    state: SessionState,
    from_client: u64,
    from_device: u64,
    client_path: String,
    device_path: String,
}

impl RelaySession<TracingObserver> {
    /// Open the real device and the virtual client port with the default
    /// tracing observer.
    #[cfg(unix)]
    pub fn open(config: &RelayConfig) -> Result<Self, RelayError> {
        Self::open_with_observer(config, Arc::new(TracingObserver))
    }
}

impl<O: RelayObserver + 'static> RelaySession<O> {
    /// Open both endpoints per `config` with a custom observer.
    ///
    /// Fails with [`RelayError::EndpointUnavailable`] when the device path
    /// cannot be opened or no pseudo-terminal can be allocated.
    #[cfg(unix)]
    pub fn open_with_observer(config: &RelayConfig, observer: Arc<O>) -> Result<Self, RelayError> {
        use crate::endpoint::{SerialPortEndpoint, VirtualEndpoint, find_device_port};

        let path = match &config.device_port {
            Some(path) => path.clone(),
            None => find_device_port().map_err(RelayError::EndpointUnavailable)?,
        };
        let mut device =
            SerialPortEndpoint::open(&path, config.baud).map_err(RelayError::EndpointUnavailable)?;
        device
            .clear_buffers()
            .map_err(RelayError::EndpointUnavailable)?;
        let client = VirtualEndpoint::create().map_err(RelayError::EndpointUnavailable)?;
        let log = CaptureLog::create(&config.capture_dir)?;

        Ok(Self::with_endpoints(
            Box::new(client),
            Box::new(device),
            log,
            observer,
        ))
    }

    /// Build a session over endpoints the caller already opened. This is the
    /// seam tests drive with mock endpoints.
    pub fn with_endpoints(
        client: Box<dyn SerialEndpoint>,
        device: Box<dyn SerialEndpoint>,
        log: CaptureLog,
        observer: Arc<O>,
    ) -> Self {
        let client_path = client.name();
        let device_path = device.name();
        Self {
            io: Some(RelayIo {
                client,
                device,
                log,
            }),
            observer,
            stop: StopHandle::new(),
            state: SessionState::Created,
            from_client: 0,
            from_device: 0,
            client_path,
            device_path,
        }
    }

    /// Path the client application should open instead of the real device.
    pub fn client_path(&self) -> &str {
        &self.client_path
    }

    /// Path of the real device side.
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle for requesting a stop from another thread or a signal handler.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// `(app→light, light→app)` byte totals so far.
    pub fn totals(&self) -> (u64, u64) {
        (self.from_client, self.from_device)
    }

    /// Pump bytes until a stop request or a fatal endpoint error.
    ///
    /// Blocks the calling thread. On return the session is `Stopped`, both
    /// endpoints and the log are closed, and the final totals have been
    /// reported through the observer.
    pub fn run(&mut self) -> Result<(), RelayError> {
        let Some(mut io) = self.io.take() else {
            return Err(RelayError::AlreadyStopped);
        };
        self.state = SessionState::Running;
        self.observer.on_event(&RelayEvent::SessionStarted {
            device: self.device_path.clone(),
            client_path: self.client_path.clone(),
        });

        let result = self.pump(&mut io);
        if let Err(e) = &result {
            self.observer.on_event(&RelayEvent::Failed {
                message: e.to_string(),
            });
        }
        self.finish(io);
        result
    }

    /// Request and, when the pump is not running, complete the stop. Safe to
    /// call repeatedly. Cross-thread interruption goes through
    /// [`StopHandle`] instead.
    pub fn stop(&mut self) {
        self.stop.request_stop();
        if let Some(io) = self.io.take() {
            self.finish(io);
        }
    }

    fn pump(&mut self, io: &mut RelayIo) -> Result<(), RelayError> {
        loop {
            if self.stop.is_stop_requested() {
                return Ok(());
            }

            let moved_from_client = self.service(io, Direction::ClientToDevice)?;
            let moved_from_device = self.service(io, Direction::DeviceToClient)?;

            if !moved_from_client && !moved_from_device {
                thread::sleep(IDLE_WAIT);
            }
        }
    }

    /// Move one pending chunk in `direction`. Returns whether bytes moved.
    fn service(&mut self, io: &mut RelayIo, direction: Direction) -> Result<bool, RelayError> {
        let (src, dst, src_side, dst_side) = match direction {
            Direction::ClientToDevice => (&mut io.client, &mut io.device, "client", "device"),
            Direction::DeviceToClient => (&mut io.device, &mut io.client, "device", "client"),
        };

        let pending = src
            .bytes_to_read()
            .map_err(|e| self.io_failure(src_side, e))?;
        if pending == 0 {
            return Ok(false);
        }

        let chunk = src
            .read_chunk(READ_CHUNK_SIZE)
            .map_err(|e| self.io_failure(src_side, e))?;
        if chunk.is_empty() {
            return Ok(false);
        }

        match direction {
            Direction::ClientToDevice => self.from_client += chunk.len() as u64,
            Direction::DeviceToClient => self.from_device += chunk.len() as u64,
        }

        // Log first, flushed, so the file order always matches wire order;
        // then forward the identical bytes and push them out.
        let record = CaptureRecord::new(direction, chunk);
        io.log.append(&record)?;
        dst.write_all(&record.bytes)
            .map_err(|e| self.io_failure(dst_side, e))?;
        dst.flush().map_err(|e| self.io_failure(dst_side, e))?;

        self.observer.on_event(&RelayEvent::Chunk {
            direction,
            len: record.bytes.len(),
        });
        Ok(true)
    }

    fn io_failure(&self, side: &'static str, source: EndpointError) -> RelayError {
        RelayError::IoFailure {
            side,
            source,
            from_client: self.from_client,
            from_device: self.from_device,
        }
    }

    /// Close both endpoints and the log, report the totals.
    fn finish(&mut self, mut io: RelayIo) {
        if let Err(e) = io.log.finish(self.from_client, self.from_device) {
            tracing::warn!(error = %e, "Could not finalize capture log");
        }
        drop(io);
        self.state = SessionState::Stopped;
        self.observer.on_event(&RelayEvent::SessionStopped {
            from_client: self.from_client,
            from_device: self.from_device,
        });
        info!(
            from_client = self.from_client,
            from_device = self.from_device,
            "Session stopped"
        );
    }
}
