//! Direct panel control over the stable command subset.
//!
//! Only CCT set, power, and the status report are known-good; everything
//! else the panel may understand is still undiscovered. No retries: when a
//! command goes unanswered the operator is watching and will act.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use crate::endpoint::{EndpointError, SerialEndpoint, SerialPortEndpoint};
use crate::protocol::cct::{StatusReport, byte_to_kelvin, kelvin_to_byte, power_frame, set_cct_frame};
use crate::protocol::constants::{FRAME_PREFIX, MAX_BRIGHTNESS, READ_CHUNK_SIZE, STATUS_FRAME_LEN};

/// Poll granularity while waiting for a status frame.
const STATUS_POLL: Duration = Duration::from_millis(100);

/// Values actually applied after clamping and temperature quantization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CctSetting {
    pub brightness: u8,
    pub temp_code: u8,
    pub kelvin: u16,
}

/// A directly-controlled panel over one serial endpoint.
pub struct Panel {
    endpoint: Box<dyn SerialEndpoint>,
}

impl Panel {
    /// Discover the CH340 bridge and open it at the default baud rate.
    pub fn open() -> Result<Self, EndpointError> {
        Ok(Self::from_endpoint(Box::new(
            SerialPortEndpoint::open_default()?,
        )))
    }

    /// Open a specific port.
    pub fn open_path(path: &str, baud: u32) -> Result<Self, EndpointError> {
        Ok(Self::from_endpoint(Box::new(SerialPortEndpoint::open(
            path, baud,
        )?)))
    }

    /// Wrap an endpoint the caller already opened (tests use a mock here).
    pub fn from_endpoint(endpoint: Box<dyn SerialEndpoint>) -> Self {
        Self { endpoint }
    }

    /// Set CCT mode. Brightness clamps to 0–100 %, Kelvin clamps to the
    /// panel's 2900–7000 K range and quantizes to the nearest code. Returns
    /// what was actually applied.
    #[instrument(skip(self))]
    pub fn set_cct(&mut self, brightness: u8, kelvin: u16) -> Result<CctSetting, EndpointError> {
        let brightness = brightness.min(MAX_BRIGHTNESS);
        let temp_code = kelvin_to_byte(kelvin);
        self.send(&set_cct_frame(brightness, temp_code))?;

        let applied = CctSetting {
            brightness,
            temp_code,
            kelvin: byte_to_kelvin(temp_code),
        };
        info!(
            brightness = applied.brightness,
            kelvin = applied.kelvin,
            code = %format!("0x{:02x}", applied.temp_code),
            "CCT set"
        );
        Ok(applied)
    }

    /// Bare power command.
    #[instrument(skip(self))]
    pub fn power(&mut self, on: bool) -> Result<(), EndpointError> {
        self.send(&power_frame(on))?;
        info!(on, "Power command sent");
        Ok(())
    }

    /// Wait up to `window` for one 8-byte status frame and parse it. The
    /// panel emits one when its physical knob is turned.
    pub fn read_status(&mut self, window: Duration) -> Result<Option<StatusReport>, EndpointError> {
        self.endpoint.clear_buffers()?;
        let deadline = Instant::now() + window;
        let mut buf: Vec<u8> = Vec::new();

        loop {
            if self.endpoint.bytes_to_read()? > 0 {
                buf.extend(self.endpoint.read_chunk(READ_CHUNK_SIZE)?);
                // Resynchronize on the frame marker before parsing.
                while let Some(start) = buf.iter().position(|&b| b == FRAME_PREFIX) {
                    if buf.len() - start < STATUS_FRAME_LEN {
                        buf.drain(..start);
                        break;
                    }
                    if let Ok(report) = StatusReport::parse(&buf[start..start + STATUS_FRAME_LEN]) {
                        debug!(?report, "Status frame");
                        return Ok(Some(report));
                    }
                    buf.drain(..=start);
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(STATUS_POLL);
        }
    }

    /// Drain stale input, write the command, flush it to the wire.
    fn send(&mut self, command: &[u8]) -> Result<(), EndpointError> {
        self.endpoint.clear_buffers()?;
        self.endpoint.write_all(command)?;
        self.endpoint.flush()?;
        debug!(bytes = %format!("{command:02x?}"), "Command written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::MockEndpoint;
    use crate::protocol::frame::{ChecksumWidth, with_checksum};

    #[test]
    fn test_set_cct_writes_sealed_frame() {
        let (mock, handle) = MockEndpoint::new("mock-panel");
        let mut panel = Panel::from_endpoint(Box::new(mock));

        let applied = panel.set_cct(100, 4950).unwrap();
        assert_eq!(applied.brightness, 100);
        assert_eq!(applied.temp_code, 0x09);
        assert_eq!(applied.kelvin, 4950);

        let writes = handle.written();
        assert_eq!(
            writes,
            vec![vec![0x3A, 0x02, 0x03, 0x01, 0x64, 0x09, 0x00, 0xE3]]
        );
    }

    #[test]
    fn test_set_cct_clamps_inputs() {
        let (mock, handle) = MockEndpoint::new("mock-panel");
        let mut panel = Panel::from_endpoint(Box::new(mock));

        let applied = panel.set_cct(200, 1000).unwrap();
        assert_eq!(applied.brightness, 100);
        assert_eq!(applied.temp_code, 0x00);
        assert_eq!(applied.kelvin, 2900);
        assert_eq!(handle.written()[0][4], 100);
    }

    #[test]
    fn test_power_commands() {
        let (mock, handle) = MockEndpoint::new("mock-panel");
        let mut panel = Panel::from_endpoint(Box::new(mock));

        panel.power(true).unwrap();
        panel.power(false).unwrap();

        let writes = handle.written();
        assert_eq!(writes[0], vec![0x3A, 0x06, 0x01, 0x01, 0x00, 0x42]);
        assert_eq!(writes[1], vec![0x3A, 0x06, 0x01, 0x02, 0x00, 0x43]);
    }

    #[test]
    fn test_read_status_resynchronizes_on_marker() {
        let (mock, handle) = MockEndpoint::new("mock-panel");
        let mut panel = Panel::from_endpoint(Box::new(mock));

        // Arrives mid-window, with line noise ahead of the frame.
        let status = with_checksum(
            &[0x3A, 0x02, 0x03, 0x01, 0x32, 0x09, 0x00],
            ChecksumWidth::Single,
        );
        let feeder = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            let mut noisy = vec![0x00, 0xFF];
            noisy.extend_from_slice(&status);
            handle.push_inbound(&noisy);
        });

        let report = panel.read_status(Duration::from_secs(2)).unwrap().unwrap();
        feeder.join().unwrap();

        assert_eq!(report.brightness, 50);
        assert_eq!(report.temp_code, 0x09);
        assert_eq!(report.kelvin, 4950);
        assert!(report.checksum_valid);
    }

    #[test]
    fn test_read_status_times_out_quietly() {
        let (mock, _handle) = MockEndpoint::new("mock-panel");
        let mut panel = Panel::from_endpoint(Box::new(mock));
        assert!(panel.read_status(Duration::ZERO).unwrap().is_none());
    }
}
