//! This crate provides an interface for communicating with and controlling the Hottop KN-8828B
//! family of home coffee roasters.
//!
//! The roaster speaks a fixed 36 byte, checksummed binary frame over a USB serial adapter. The
//! host is expected to keep writing its desired control state (heater, fans, motors) and to keep
//! reading back the device state, otherwise the roaster drops into its own safety shutdown.
//!
//! [`roaster::Roaster`] wraps all of that: it owns the transport, runs a background control loop
//! which polls the device and writes the configuration back, and collects every reading into an
//! in-memory roast session.
//!
//! The serial port used for roaster comms should be configured like so:
//! * Default baud rate: 115200
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None
//!
//! Any interface implementing [`transport::Transport`] can be used. With the default `serial`
//! feature, [`serial::SerialTransport`] provides one backed by the `serialport` crate.

pub mod control;
pub mod error;
pub mod frame;
pub mod roaster;
#[cfg(feature = "serial")]
pub mod serial;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock_serial;
