//! Our error types for the roaster driver.

use thiserror::Error;

use crate::types::Channel;

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Custom error type for Hottop roaster communications.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Could not open the serial connection: {0:?}")]
    Connection(I),
    #[error("Serial communication error: {0:?}")]
    Serial(I),
    #[error("Invalid value {value} for {channel}, expected {}..={}", .channel.range().start(), .channel.range().end())]
    InvalidInput { channel: Channel, value: i64 },
    #[error("No valid frame received for {cycles} consecutive cycles")]
    DeviceSilent { cycles: u32 },
    #[error("Roaster is not connected")]
    NotConnected,
    #[error("Control loop is already running")]
    AlreadyRunning,
    #[error("Control loop is not running")]
    NotRunning,
    #[error("Could not spawn the control loop thread: {0}")]
    Spawn(std::io::Error),
    #[error("Control loop thread panicked")]
    LoopPanicked,
}

/// Reasons an inbound frame is rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("Buffer was empty")]
    Empty,
    #[error("Frame truncated to {len} bytes")]
    Truncated { len: usize },
    #[error("Frame header was not valid")]
    BadHeader,
    #[error("Frame checksum was not valid")]
    BadChecksum,
}
