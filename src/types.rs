//! This module contains the control and reading types exchanged with the roaster.

use core::ops::RangeInclusive;

use fugit::MillisDurationU32;
use strum_macros::{Display, EnumIter};

/// How often the control loop polls the roaster unless told otherwise.
pub const DEFAULT_POLL_INTERVAL: MillisDurationU32 = MillisDurationU32::millis(500);

/// Every named value the host can set on the roaster.
#[derive(Debug, Display, EnumIter, PartialEq, Eq, Clone, Copy)]
#[strum(serialize_all = "snake_case")]
pub enum Channel {
    /// Heating element power, percent.
    Heater,
    /// Exhaust fan speed.
    Fan,
    /// Main (convection) fan speed.
    MainFan,
    /// Drum rotation on/off.
    DrumMotor,
    /// Bean door solenoid, opens the drum to drop the beans.
    Solenoid,
    /// Cooling tray stirrer intensity. Only `0` and `1` are used by the cool-down routine.
    CoolingMotor,
    /// Polling interval of the control loop, in milliseconds.
    PollInterval,
}

impl Channel {
    /// Inclusive range of values this channel accepts.
    pub const fn range(self) -> RangeInclusive<i64> {
        match self {
            Channel::Heater => 0..=100,
            Channel::Fan | Channel::MainFan | Channel::CoolingMotor => 0..=10,
            Channel::DrumMotor | Channel::Solenoid => 0..=1,
            Channel::PollInterval => 1..=u32::MAX as i64,
        }
    }

    /// Whether `value` lies within [`Self::range`].
    pub fn accepts(self, value: i64) -> bool {
        self.range().contains(&value)
    }
}

/// The desired roaster state, plus the last known sensor values.
///
/// All control fields are kept within their [`Channel::range`] by the setters on
/// [`Roaster`](crate::roaster::Roaster). The frame encoder does not check them again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Configuration {
    pub heater: u8,
    pub fan: u8,
    pub main_fan: u8,
    pub drum_motor: bool,
    pub solenoid: bool,
    pub cooling_motor: u8,
    pub poll_interval: MillisDurationU32,
    /// Environment temperature in Fahrenheit, read back from the device.
    pub external_temp: f64,
    /// Bean temperature in Fahrenheit, read back from the device.
    pub bean_temp: f64,
    /// Chaff tray state, read back from the device. `1` when inserted.
    pub chaff_tray: u8,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            heater: 0,
            fan: 0,
            main_fan: 0,
            drum_motor: false,
            solenoid: false,
            cooling_motor: 0,
            poll_interval: DEFAULT_POLL_INTERVAL,
            external_temp: 0.0,
            bean_temp: 0.0,
            chaff_tray: 1,
        }
    }
}

impl Configuration {
    /// Take over every control channel of `update`. Sensor values are left alone, the loop
    /// never learns them through a configuration push.
    pub fn absorb(&mut self, update: &Configuration) {
        self.heater = update.heater;
        self.fan = update.fan;
        self.main_fan = update.main_fan;
        self.drum_motor = update.drum_motor;
        self.solenoid = update.solenoid;
        self.cooling_motor = update.cooling_motor;
        self.poll_interval = update.poll_interval;
    }

    /// Force the fixed cool-down state: heat and drum off, door open, cooling tray and main
    /// fan at full.
    pub fn apply_cooldown(&mut self) {
        self.drum_motor = false;
        self.heater = 0;
        self.solenoid = true;
        self.cooling_motor = 1;
        self.main_fan = 10;
    }

    /// Copy the sensor values of a decoded reading.
    pub fn update_sensors(&mut self, reading: &Reading) {
        self.external_temp = reading.external_temp;
        self.bean_temp = reading.bean_temp;
        self.chaff_tray = reading.chaff_tray;
    }

    /// Polling interval as a `std` duration, for sleeping.
    pub fn poll_interval_std(&self) -> core::time::Duration {
        core::time::Duration::from_millis(self.poll_interval.to_millis() as u64)
    }
}

/// A decoded snapshot of the device state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reading {
    pub heater: u8,
    pub fan: u8,
    pub main_fan: u8,
    /// Fahrenheit.
    pub external_temp: f64,
    /// Fahrenheit.
    pub bean_temp: f64,
    pub solenoid: u8,
    pub drum_motor: u8,
    pub cooling_motor: u8,
    pub chaff_tray: u8,
    /// Minutes since the roast started. Zero until stamped by the roaster.
    pub elapsed_minutes: f64,
}

/// Lifecycle of the background control loop.
#[derive(Debug, Display, EnumIter, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum LoopState {
    /// No loop has been started.
    Idle = 0,
    /// Priming the roaster with configuration frames.
    WakingUp = 1,
    /// Regular read/write cycles.
    Polling = 2,
    /// Polling with the cool-down override applied.
    CoolingDown = 3,
    /// Loop exited after a shutdown request.
    Stopped = 4,
    /// Loop exited on a fatal error.
    Failed = 5,
}

impl From<u8> for LoopState {
    fn from(value: u8) -> Self {
        match value {
            1 => LoopState::WakingUp,
            2 => LoopState::Polling,
            3 => LoopState::CoolingDown,
            4 => LoopState::Stopped,
            5 => LoopState::Failed,
            _ => LoopState::Idle,
        }
    }
}

impl LoopState {
    /// Whether the loop is still driving the roaster.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            LoopState::WakingUp | LoopState::Polling | LoopState::CoolingDown
        )
    }
}
