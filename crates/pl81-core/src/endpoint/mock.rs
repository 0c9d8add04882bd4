//! Scripted endpoint for exercising the relay and controller without
//! hardware.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use super::traits::{EndpointError, SerialEndpoint};

/// Handle a test keeps after moving the endpoint into a session.
///
/// Queued chunks keep their boundaries: one `push_inbound` is delivered by
/// exactly one read, which is what lets the relay tests assert that chunk
/// boundaries survive the trip.
#[derive(Clone)]
pub struct MockHandle {
    inbound: Arc<Mutex<VecDeque<Vec<u8>>>>,
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    failed: Arc<Mutex<bool>>,
}

impl MockHandle {
    /// Queue a chunk the endpoint will deliver on a future read.
    pub fn push_inbound(&self, chunk: &[u8]) {
        self.inbound.lock().unwrap().push_back(chunk.to_vec());
    }

    /// Chunks still queued and undelivered.
    pub fn pending_inbound(&self) -> usize {
        self.inbound.lock().unwrap().len()
    }

    /// Everything the session wrote, chunk by chunk, in order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().unwrap().clone()
    }

    /// Make every subsequent call fail like an unplugged device.
    pub fn fail(&self) {
        *self.failed.lock().unwrap() = true;
    }
}

/// Mock endpoint for unit testing relay and controller logic.
pub struct MockEndpoint {
    name: String,
    state: MockHandle,
}

impl MockEndpoint {
    pub fn new(name: &str) -> (Self, MockHandle) {
        let state = MockHandle {
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            written: Arc::new(Mutex::new(Vec::new())),
            failed: Arc::new(Mutex::new(false)),
        };
        (
            Self {
                name: name.to_string(),
                state: state.clone(),
            },
            state,
        )
    }

    fn check_alive(&self) -> Result<(), EndpointError> {
        if *self.state.failed.lock().unwrap() {
            return Err(EndpointError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock endpoint failed",
            )));
        }
        Ok(())
    }
}

impl SerialEndpoint for MockEndpoint {
    fn bytes_to_read(&mut self) -> Result<usize, EndpointError> {
        self.check_alive()?;
        Ok(self
            .state
            .inbound
            .lock()
            .unwrap()
            .front()
            .map_or(0, Vec::len))
    }

    fn read_chunk(&mut self, max: usize) -> Result<Vec<u8>, EndpointError> {
        self.check_alive()?;
        let mut queue = self.state.inbound.lock().unwrap();
        match queue.pop_front() {
            None => Ok(Vec::new()),
            Some(mut chunk) if chunk.len() > max => {
                let rest = chunk.split_off(max);
                queue.push_front(rest);
                Ok(chunk)
            }
            Some(chunk) => Ok(chunk),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), EndpointError> {
        self.check_alive()?;
        self.state.written.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), EndpointError> {
        self.check_alive()
    }

    fn clear_buffers(&mut self) -> Result<(), EndpointError> {
        self.check_alive()?;
        self.state.inbound.lock().unwrap().clear();
        Ok(())
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_preserves_chunk_boundaries() {
        let (mut mock, handle) = MockEndpoint::new("mock");
        handle.push_inbound(&[0x01, 0x02]);
        handle.push_inbound(&[0x03]);

        assert_eq!(mock.bytes_to_read().unwrap(), 2);
        assert_eq!(mock.read_chunk(4096).unwrap(), vec![0x01, 0x02]);
        assert_eq!(mock.read_chunk(4096).unwrap(), vec![0x03]);
        assert_eq!(mock.read_chunk(4096).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_mock_splits_oversized_chunk() {
        let (mut mock, handle) = MockEndpoint::new("mock");
        handle.push_inbound(&[0x01, 0x02, 0x03]);

        assert_eq!(mock.read_chunk(2).unwrap(), vec![0x01, 0x02]);
        assert_eq!(mock.read_chunk(2).unwrap(), vec![0x03]);
    }

    #[test]
    fn test_mock_write_capture() {
        let (mut mock, handle) = MockEndpoint::new("mock");
        mock.write_all(b"hello").unwrap();
        mock.write_all(b"world").unwrap();

        let writes = handle.written();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], b"hello");
        assert_eq!(writes[1], b"world");
    }

    #[test]
    fn test_mock_failure_injection() {
        let (mut mock, handle) = MockEndpoint::new("mock");
        handle.fail();
        assert!(mock.bytes_to_read().is_err());
        assert!(mock.write_all(b"x").is_err());
    }

    #[test]
    fn test_mock_clear_drops_pending() {
        let (mut mock, handle) = MockEndpoint::new("mock");
        handle.push_inbound(&[0x01]);
        mock.clear_buffers().unwrap();
        assert_eq!(mock.bytes_to_read().unwrap(), 0);
        assert_eq!(handle.pending_inbound(), 0);
    }
}
