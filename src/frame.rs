//! Encoding and decoding of the 36 byte frames exchanged with the roaster.
//!
//! Both directions share the same layout: a fixed header, one byte per control channel at a
//! fixed offset, and a trailing checksum which is the sum of every preceding byte, modulo 256.

use log::debug;
use pretty_hex::simple_hex;

use crate::{
    error::FrameError,
    types::{Configuration, Reading},
};

/// Length of every frame, in both directions.
pub const FRAME_LEN: usize = 36;

/// Fixed header bytes of an outbound frame. Inbound frames only have to match the first two.
pub const HEADER: [u8; 7] = [0xA5, 0x96, 0xB0, 0xA0, 0x01, 0x01, 0x24];

/// Byte offsets within a frame.
#[derive(Debug, Copy, Clone)]
#[repr(usize)]
pub enum Offset {
    /// __R/W__ - Heater power, 0-100.
    Heater = 10,
    /// __R/W__ - Exhaust fan speed, 0-10.
    Fan = 11,
    /// __R/W__ - Main fan speed, 0-10.
    MainFan = 12,
    /// __R/W__ - Bean door solenoid.
    /// * `0` - Closed.
    /// * `1` - Open.
    Solenoid = 16,
    /// __R/W__ - Drum motor.
    DrumMotor = 17,
    /// __R/W__ - Cooling motor.
    CoolingMotor = 18,
    /// __R__ - Chaff tray.
    ChaffTray = 19,
    /// __R__ - Environment temperature, two bytes, high byte first, degrees Celsius.
    ExternalTemp = 23,
    /// __R__ - Bean temperature, two bytes, high byte first, degrees Celsius.
    BeanTemp = 25,
    /// Checksum over bytes `0..35`.
    Checksum = 35,
}

impl From<Offset> for usize {
    fn from(value: Offset) -> Self {
        value as usize
    }
}

/// Sum of every byte before the checksum, modulo 256.
pub fn checksum(frame: &[u8]) -> u8 {
    frame[..Offset::Checksum as usize]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b))
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 1.8 + 32.0
}

/// Build the outbound frame for `config`.
///
/// Channel values are written as they are; range checking happens when the configuration is
/// changed, not here.
pub fn encode(config: &Configuration) -> [u8; FRAME_LEN] {
    use Offset as O;

    let mut frame = [0u8; FRAME_LEN];
    frame[..HEADER.len()].copy_from_slice(&HEADER);
    frame[O::Heater as usize] = config.heater;
    frame[O::Fan as usize] = config.fan;
    frame[O::MainFan as usize] = config.main_fan;
    frame[O::Solenoid as usize] = config.solenoid as u8;
    frame[O::DrumMotor as usize] = config.drum_motor as u8;
    frame[O::CoolingMotor as usize] = config.cooling_motor;
    frame[O::Checksum as usize] = checksum(&frame);
    frame
}

/// Validate an inbound frame and extract the device state from it.
pub fn decode(buffer: &[u8]) -> Result<Reading, FrameError> {
    use Offset as O;

    if buffer.is_empty() {
        return Err(FrameError::Empty);
    }
    if buffer.len() < FRAME_LEN {
        return Err(FrameError::Truncated { len: buffer.len() });
    }
    if buffer[0] != HEADER[0] || buffer[1] != HEADER[1] {
        debug!("Bad frame header: {}", simple_hex(&buffer));
        return Err(FrameError::BadHeader);
    }
    if checksum(buffer) != buffer[O::Checksum as usize] {
        debug!("Bad frame checksum: {}", simple_hex(&buffer));
        return Err(FrameError::BadChecksum);
    }

    Ok(Reading {
        heater: buffer[O::Heater as usize],
        fan: buffer[O::Fan as usize],
        main_fan: buffer[O::MainFan as usize],
        external_temp: celsius_to_fahrenheit(read_u16(buffer, O::ExternalTemp) as f64),
        bean_temp: celsius_to_fahrenheit(read_u16(buffer, O::BeanTemp) as f64),
        solenoid: buffer[O::Solenoid as usize],
        drum_motor: buffer[O::DrumMotor as usize],
        cooling_motor: buffer[O::CoolingMotor as usize],
        chaff_tray: buffer[O::ChaffTray as usize],
        elapsed_minutes: 0.0,
    })
}

fn read_u16(buffer: &[u8], offset: Offset) -> u16 {
    let at = usize::from(offset);
    u16::from_be_bytes([buffer[at], buffer[at + 1]])
}
