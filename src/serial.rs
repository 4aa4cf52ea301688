//! A [`Transport`] backed by the `serialport` crate, plus discovery of the roaster's USB adapter.

use std::{io, time::Duration};

use log::debug;
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use thiserror::Error;

use crate::transport::Transport;

/// Port the roaster's adapter usually shows up as on macOS.
pub const DEFAULT_PORT: &str = "/dev/cu.usbserial-DA01PEYC";
pub const BAUD_RATE: u32 = 115200;
/// The roaster answers well within this, a longer wait only delays a skipped cycle.
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// How to open the serial port. 8N1 is fixed by the roaster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.into(),
            baud_rate: BAUD_RATE,
            timeout: READ_TIMEOUT,
        }
    }
}

impl SerialSettings {
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = port.into();
        self
    }

    /// Settings for the discovered roaster port, or the default port if none was found.
    pub fn discover() -> Self {
        match discover_port() {
            Some(port) => Self::default().with_port(port),
            None => Self::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SerialError {
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),
    #[error("Serial I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serial port is not open")]
    NotOpen,
}

impl embedded_io::Error for SerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            SerialError::Port(err) => match err.kind {
                serialport::ErrorKind::NoDevice => embedded_io::ErrorKind::NotFound,
                serialport::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
                serialport::ErrorKind::Io(kind) => io_kind(kind),
                serialport::ErrorKind::Unknown => embedded_io::ErrorKind::Other,
            },
            SerialError::Io(err) => io_kind(err.kind()),
            SerialError::NotOpen => embedded_io::ErrorKind::NotConnected,
        }
    }
}

fn io_kind(kind: io::ErrorKind) -> embedded_io::ErrorKind {
    match kind {
        io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
        io::ErrorKind::NotConnected => embedded_io::ErrorKind::NotConnected,
        io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
        io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
        io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
        io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
        io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
        io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
        io::ErrorKind::OutOfMemory => embedded_io::ErrorKind::OutOfMemory,
        _ => embedded_io::ErrorKind::Other,
    }
}

/// The roaster's serial port. Opened lazily by [`Transport::open`].
pub struct SerialTransport {
    settings: SerialSettings,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            port: None,
        }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, SerialError> {
        self.port.as_mut().ok_or(SerialError::NotOpen)
    }
}

impl embedded_io::ErrorType for SerialTransport {
    type Error = SerialError;
}

impl embedded_io::Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(io::Read::read(self.port()?, buf)?)
    }
}

impl embedded_io::Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(io::Write::write(self.port()?, buf)?)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(io::Write::flush(self.port()?)?)
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> Result<(), Self::Error> {
        if self.port.is_some() {
            return Ok(());
        }
        let port = serialport::new(&self.settings.port, self.settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(self.settings.timeout)
            .open()?;
        debug!("Opened {} @ {}", self.settings.port, self.settings.baud_rate);
        self.port = Some(port);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn flush_input(&mut self) -> Result<(), Self::Error> {
        Ok(self.port()?.clear(ClearBuffer::Input)?)
    }

    fn flush_output(&mut self) -> Result<(), Self::Error> {
        Ok(self.port()?.clear(ClearBuffer::Output)?)
    }
}

/// Whether a port name looks like the roaster's USB serial adapter.
pub fn is_roaster_port(name: &str) -> bool {
    name.contains("usbserial-") && !name.contains("bluetooth")
}

/// Find the first serial port which looks like the roaster.
pub fn discover_port() -> Option<String> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(err) => {
            debug!("Could not enumerate serial ports: {err}");
            return None;
        }
    };
    let port = ports
        .into_iter()
        .map(|p| p.port_name)
        .find(|name| is_roaster_port(name));
    debug!("Auto-discovered USB port: {port:?}");
    port
}
