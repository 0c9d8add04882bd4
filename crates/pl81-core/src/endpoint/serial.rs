//! serialport-backed endpoint for the real panel port.

use std::io::{Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, Parity, SerialPort, SerialPortType, StopBits};
use tracing::{debug, info};

use super::traits::{EndpointError, SerialEndpoint};
use crate::protocol::constants::{CH340_PRODUCT_ID, DEFAULT_BAUD, WCH_VENDOR_ID};

/// Read timeout on the underlying port. Reads are gated on `bytes_to_read`,
/// so this only bounds the pathological case where pending bytes vanish
/// between the probe and the read.
const PORT_TIMEOUT: Duration = Duration::from_millis(100);

/// Locate the panel's CH340 USB-serial bridge among the system's ports.
pub fn find_device_port() -> Result<String, EndpointError> {
    let ports = serialport::available_ports().map_err(|e| EndpointError::Unavailable {
        path: "<port enumeration>".to_string(),
        reason: e.to_string(),
    })?;

    for port in ports {
        if let SerialPortType::UsbPort(usb) = &port.port_type {
            if usb.vid == WCH_VENDOR_ID && usb.pid == CH340_PRODUCT_ID {
                info!(
                    port = %port.port_name,
                    vid = %format!("{:04X}", usb.vid),
                    pid = %format!("{:04X}", usb.pid),
                    "Found panel bridge"
                );
                return Ok(port.port_name);
            }
        }
    }

    Err(EndpointError::NoDevice {
        vid: WCH_VENDOR_ID,
        pid: CH340_PRODUCT_ID,
    })
}

/// Enumerate serial ports with a short USB summary, for the operator.
pub fn list_ports() -> Result<Vec<String>, EndpointError> {
    let ports = serialport::available_ports().map_err(|e| EndpointError::Unavailable {
        path: "<port enumeration>".to_string(),
        reason: e.to_string(),
    })?;

    Ok(ports
        .into_iter()
        .map(|port| match port.port_type {
            SerialPortType::UsbPort(usb) => {
                let product = usb.product.map(|p| format!(" ({p})")).unwrap_or_default();
                format!(
                    "{}  usb {:04x}:{:04x}{}",
                    port.port_name, usb.vid, usb.pid, product
                )
            }
            _ => port.port_name,
        })
        .collect())
}

/// Real serial port endpoint.
pub struct SerialPortEndpoint {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialPortEndpoint {
    /// Open `path` at `baud`, 8N1.
    pub fn open(path: &str, baud: u32) -> Result<Self, EndpointError> {
        let port = serialport::new(path, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(PORT_TIMEOUT)
            .open()
            .map_err(|e| EndpointError::Unavailable {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        info!(path = %path, baud = baud, "Opened panel port");

        Ok(Self {
            port,
            path: path.to_string(),
        })
    }

    /// Discover the panel's bridge and open it at the default baud rate.
    pub fn open_default() -> Result<Self, EndpointError> {
        let path = find_device_port()?;
        Self::open(&path, DEFAULT_BAUD)
    }
}

impl SerialEndpoint for SerialPortEndpoint {
    fn bytes_to_read(&mut self) -> Result<usize, EndpointError> {
        let pending = self
            .port
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
        let n = self.port.read(&mut buf)?;
        buf.truncate(n);
        debug!(path = %self.path, bytes = n, "Read chunk");
        Ok(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), EndpointError> {
        self.port.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), EndpointError> {
        self.port.flush()?;
        Ok(())
    }

    fn clear_buffers(&mut self) -> Result<(), EndpointError> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| EndpointError::Io(e.into()))
    }

    fn name(&self) -> String {
        self.path.clone()
    }
}
