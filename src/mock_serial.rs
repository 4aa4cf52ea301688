//! We use this mocking module in unit tests to emulate the roaster's serial port.
//!
//! The mock is cheap to clone and every clone shares the same state, so a test can hand one
//! clone to the control loop thread and inspect the traffic through another.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

use thiserror::Error;

use crate::transport::Transport;

/// One scripted answer to a single `read` call.
#[derive(Debug, Clone)]
pub enum MockRead {
    /// Hand back these bytes.
    Bytes(Vec<u8>),
    /// Simulate a read timeout.
    Timeout,
    /// Simulate a hard read failure.
    Fail,
}

#[derive(Debug, Default)]
struct MockState {
    /// Each `write` call, in order.
    writes: Vec<Vec<u8>>,
    /// Scripted answers, consumed front to back.
    reads: VecDeque<MockRead>,
    /// Answer once the script has run out. Timeout if unset.
    idle_read: Option<Vec<u8>>,
    /// Number of `read` calls seen.
    read_calls: usize,
    open: bool,
    /// Flag to simulate open errors
    should_error_on_open: bool,
    /// Flag to simulate write errors
    should_error_on_write: bool,
}

/// Our mock type used to emulate a serial port.
#[derive(Debug, Clone, Default)]
pub struct MockSerial {
    state: Arc<Mutex<MockState>>,
}

#[derive(Error, Debug)]
pub enum MockSerialError {
    /// Simulated timeout error
    #[error("Simulated timeout")]
    Timeout,
    /// Simulated failure to open the port
    #[error("Simulated open failure")]
    OpenFailed,
    /// Generic simulated error for testing
    #[error("Simulated error")]
    SimulatedError,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockSerialError::OpenFailed => embedded_io::ErrorKind::NotFound,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut state = self.lock();
        if state.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        state.writes.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.lock().should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut state = self.lock();
        state.read_calls += 1;

        let next = match state.reads.pop_front() {
            Some(next) => next,
            None => match &state.idle_read {
                Some(bytes) => MockRead::Bytes(bytes.clone()),
                None => MockRead::Timeout,
            },
        };

        match next {
            MockRead::Bytes(bytes) => {
                let count = core::cmp::min(buf.len(), bytes.len());
                buf[..count].copy_from_slice(&bytes[..count]);
                Ok(count)
            }
            MockRead::Timeout => Err(MockSerialError::Timeout),
            MockRead::Fail => Err(MockSerialError::SimulatedError),
        }
    }
}

impl Transport for MockSerial {
    fn open(&mut self) -> Result<(), Self::Error> {
        let mut state = self.lock();
        if state.should_error_on_open {
            return Err(MockSerialError::OpenFailed);
        }
        state.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn flush_input(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl MockSerial {
    /// Create a new, closed MockSerial instance with no scripted reads.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Queue the answers for upcoming `read` calls.
    pub fn script_reads(&self, reads: impl IntoIterator<Item = MockRead>) {
        self.lock().reads.extend(reads);
    }

    /// Answer every read with `frame` once the script runs out.
    pub fn set_idle_read(&self, frame: &[u8]) {
        self.lock().idle_read = Some(frame.to_vec());
    }

    /// Every buffer written so far.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    pub fn read_calls(&self) -> usize {
        self.lock().read_calls
    }

    pub fn clear_written_data(&self) {
        self.lock().writes.clear();
    }

    /// Configure whether `open` should fail.
    pub fn set_open_error(&self, should_error: bool) {
        self.lock().should_error_on_open = should_error;
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&self, should_error: bool) {
        self.lock().should_error_on_write = should_error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Read, Write};

    #[test]
    fn test_new_mock_serial() {
        let mock = MockSerial::new();
        assert!(mock.writes().is_empty());
        assert_eq!(mock.read_calls(), 0);
        assert!(!mock.is_open());
    }

    #[test]
    fn test_clones_share_state() {
        let mut mock = MockSerial::new();
        let observer = mock.clone();
        mock.write(b"Hello").unwrap();
        mock.write(b"World").unwrap();
        assert_eq!(observer.writes(), vec![b"Hello".to_vec(), b"World".to_vec()]);
    }

    #[test]
    fn test_scripted_reads_then_idle() {
        let mut mock = MockSerial::new();
        mock.script_reads([MockRead::Bytes(b"abc".to_vec()), MockRead::Timeout]);
        mock.set_idle_read(b"xyz");

        let mut buffer = [0u8; 8];
        assert_eq!(mock.read(&mut buffer).unwrap(), 3);
        assert_eq!(&buffer[..3], b"abc");
        assert!(matches!(
            mock.read(&mut buffer).unwrap_err(),
            MockSerialError::Timeout
        ));
        assert_eq!(mock.read(&mut buffer).unwrap(), 3);
        assert_eq!(&buffer[..3], b"xyz");
        assert_eq!(mock.read_calls(), 3);
    }

    #[test]
    fn test_read_timeout_when_no_data() {
        let mut mock = MockSerial::new();
        let mut buffer = [0u8; 10];
        assert!(matches!(
            mock.read(&mut buffer).unwrap_err(),
            MockSerialError::Timeout
        ));
    }

    #[test]
    fn test_read_partial_data() {
        let mut mock = MockSerial::new();
        mock.script_reads([MockRead::Bytes(b"Long response data".to_vec())]);
        let mut buffer = [0u8; 5];
        assert_eq!(mock.read(&mut buffer).unwrap(), 5);
        assert_eq!(&buffer, b"Long ");
    }

    #[test]
    fn test_write_error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        assert!(matches!(
            mock.write(b"test").unwrap_err(),
            MockSerialError::SimulatedError
        ));
        assert!(mock.flush().is_err());
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn test_open_error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_open_error(true);
        assert!(mock.open().is_err());
        assert!(!mock.is_open());
        mock.set_open_error(false);
        assert!(mock.open().is_ok());
        assert!(mock.is_open());
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(
            MockSerialError::Timeout.kind(),
            embedded_io::ErrorKind::TimedOut
        ));
        assert!(matches!(
            MockSerialError::OpenFailed.kind(),
            embedded_io::ErrorKind::NotFound
        ));
        assert!(matches!(
            MockSerialError::SimulatedError.kind(),
            embedded_io::ErrorKind::Other
        ));
    }

    #[test]
    fn test_errors_display() {
        assert_eq!(MockSerialError::Timeout.to_string(), "Simulated timeout");
        assert_eq!(MockSerialError::OpenFailed.to_string(), "Simulated open failure");
        assert_eq!(MockSerialError::SimulatedError.to_string(), "Simulated error");
    }
}
