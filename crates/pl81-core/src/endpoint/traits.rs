//! Serial endpoint abstraction.
//!
//! Defines the `SerialEndpoint` trait the relay and the panel controller
//! drive, allowing different implementations (real port, pseudo-terminal,
//! mock).

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EndpointError {
    /// The endpoint could not be opened at all: device unplugged, path busy,
    /// or no pseudo-terminal available. Fatal to the session, no retry.
    #[error("endpoint unavailable: {path}: {reason}")]
    Unavailable { path: String, reason: String },

    /// Read/write failure on an endpoint that was open.
    #[error("endpoint I/O failed: {0}")]
    Io(#[from] io::Error),

    /// Discovery found no candidate device port.
    #[error("no USB-serial panel port found (looked for CH340 {vid:04X}:{pid:04X})")]
    NoDevice { vid: u16, pid: u16 },
}

/// Byte-stream endpoint.
///
/// Reads never block: `read_chunk` returns whatever is pending, up to `max`,
/// and an empty vec when nothing is. `bytes_to_read` is the readiness probe
/// the relay loop multiplexes on.
pub trait SerialEndpoint: Send {
    /// Bytes currently pending in the receive buffer.
    fn bytes_to_read(&mut self) -> Result<usize, EndpointError>;

    /// Read up to `max` pending bytes without blocking.
    fn read_chunk(&mut self, max: usize) -> Result<Vec<u8>, EndpointError>;

    /// Write the whole buffer.
    fn write_all(&mut self, data: &[u8]) -> Result<(), EndpointError>;

    /// Push written bytes out to the wire before returning.
    fn flush(&mut self) -> Result<(), EndpointError>;

    /// Drop anything pending in the receive buffer.
    fn clear_buffers(&mut self) -> Result<(), EndpointError>;

    /// Human-readable endpoint name (device path where there is one).
    fn name(&self) -> String;
}
