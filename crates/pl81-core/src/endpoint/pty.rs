//! Virtual serial endpoint backed by a pseudo-terminal pair.
//!
//! The relay holds the master half; an unmodified client application opens
//! [`VirtualEndpoint::client_path`] exactly as it would open the real
//! device path.

use std::io::{Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort, TTYPort};
use tracing::{debug, info};

use super::traits::{EndpointError, SerialEndpoint};

const PORT_TIMEOUT: Duration = Duration::from_millis(100);

/// Pseudo-terminal endpoint presenting itself as an ordinary serial device.
pub struct VirtualEndpoint {
    master: TTYPort,
    /// Held open so the master half does not report end-of-file while no
    /// client is attached.
    _slave: TTYPort,
    client_path: String,
}

impl VirtualEndpoint {
    /// Allocate a fresh pseudo-terminal pair.
    pub fn create() -> Result<Self, EndpointError> {
        let (mut master, slave) = TTYPort::pair().map_err(|e| EndpointError::Unavailable {
            path: "<pseudo-terminal>".to_string(),
            reason: e.to_string(),
        })?;

        master
            .set_timeout(PORT_TIMEOUT)
            .map_err(|e| EndpointError::Unavailable {
                path: "<pseudo-terminal>".to_string(),
                reason: e.to_string(),
            })?;

        let client_path = slave
            .name()
            .unwrap_or_else(|| "<unnamed pseudo-terminal>".to_string());
        info!(client_path = %client_path, "Created virtual panel port");

        Ok(Self {
            master,
            _slave: slave,
            client_path,
        })
    }

    /// Device path a client application opens to reach the relay.
    pub fn client_path(&self) -> &str {
        &self.client_path
    }
}

impl SerialEndpoint for VirtualEndpoint {
    fn bytes_to_read(&mut self) -> Result<usize, EndpointError> {
        let pending = self
            .master
            .bytes_to_read()
            .map_err(|e| EndpointError::Io(e.into()))?;
        Ok(pending as usize)
    }

    fn read_chunk(&mut self, max: usize) -> Result<Vec<u8>, EndpointError> {
        let pending = self.bytes_to_read()?;
        if pending == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; pending.min(max)];
        let n = self.master.read(&mut buf)?;
        buf.truncate(n);
        debug!(client_path = %self.client_path, bytes = n, "Read chunk");
        Ok(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), EndpointError> {
        self.master.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), EndpointError> {
        self.master.flush()?;
        Ok(())
    }

    fn clear_buffers(&mut self) -> Result<(), EndpointError> {
        self.master
            .clear(ClearBuffer::Input)
            .map_err(|e| EndpointError::Io(e.into()))
    }

    fn name(&self) -> String {
        self.client_path.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_relays_bytes_to_client_side() {
        let mut endpoint = VirtualEndpoint::create().unwrap();
        assert!(endpoint.client_path().starts_with("/dev/"));

        // A client writing into the slave side shows up on the endpoint.
        let mut client = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(endpoint.client_path())
            .unwrap();
        client.write_all(&[0x3A, 0x06, 0x01, 0x01, 0x00, 0x42]).unwrap();
        client.flush().unwrap();

        // The kernel may take a moment to move bytes across the pair.
        let mut chunk = Vec::new();
        for _ in 0..50 {
            chunk = endpoint.read_chunk(4096).unwrap();
            if !chunk.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(chunk, vec![0x3A, 0x06, 0x01, 0x01, 0x00, 0x42]);

        // And the endpoint's writes come back out on the slave side.
        endpoint.write_all(&[0x3A, 0x02]).unwrap();
        endpoint.flush().unwrap();
        let mut back = [0u8; 2];
        client.read_exact(&mut back).unwrap();
        assert_eq!(back, [0x3A, 0x02]);
    }
}
