use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use fugit::MillisDurationU32;
use log::{debug, info, warn};

use crate::{
    control::{ControlLoop, DEFAULT_MAX_MISSED_CYCLES, LoopExit, LoopHandle, LoopSignals},
    error::{Error, Result},
    session::RoastSession,
    store::ConfigStore,
    transport::Transport,
    types::{Channel, Configuration, LoopState, Reading},
};

/// Connection state and settings, as returned by [`Roaster::get_current_config`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    /// Whether the serial link is up.
    pub state: bool,
    pub settings: Configuration,
}

/// You can create a Roaster using any interface which implements [`Transport`].
///
/// Setters validate their input and then hand the whole configuration to the running control
/// loop. Getters return the value last set here, which the roaster only latches on the next
/// write, so they may briefly run ahead of the device.
pub struct Roaster<S>
where
    S: Transport + Send + 'static,
    S::Error: Send + 'static,
{
    /// `None` while a control loop owns the transport.
    interface: Option<S>,
    config: Configuration,
    store: Option<ConfigStore>,
    control: Option<LoopHandle<S>>,
    session: Arc<Mutex<Option<RoastSession>>>,
    max_missed_cycles: u32,
}

impl<S> Roaster<S>
where
    S: Transport + Send + 'static,
    S::Error: Send + 'static,
{
    /// Create a new Roaster on the given interface. Nothing is sent until [`Self::start`].
    pub fn new(interface: S) -> Self {
        Self {
            interface: Some(interface),
            config: Configuration::default(),
            store: None,
            control: None,
            session: Arc::new(Mutex::new(None)),
            max_missed_cycles: DEFAULT_MAX_MISSED_CYCLES,
        }
    }

    /// Consecutive cycles without a valid frame before the control loop gives up.
    pub fn with_max_missed_cycles(mut self, cycles: u32) -> Self {
        self.max_missed_cycles = cycles;
        self
    }

    /// Open the serial link.
    pub fn connect(&mut self) -> Result<(), S::Error> {
        let interface = self.interface.as_mut().ok_or(Error::AlreadyRunning)?;
        if !interface.is_open() {
            interface.open().map_err(Error::Connection)?;
            debug!("Serial connection opened");
        }
        Ok(())
    }

    /// Whether the serial link is up. A running loop counts as connected.
    pub fn get_serial_state(&self) -> bool {
        match &self.interface {
            Some(interface) => interface.is_open(),
            None => self.is_roasting(),
        }
    }

    /// Start the control loop. Every reading is recorded in the roast session, stamped with the
    /// minutes since this call, and then passed to `callback`.
    pub fn start<F>(&mut self, mut callback: F) -> Result<(), S::Error>
    where
        F: FnMut(Reading) + Send + 'static,
    {
        if self.control.is_some() {
            return Err(Error::AlreadyRunning);
        }
        match &self.interface {
            Some(interface) if interface.is_open() => {}
            _ => return Err(Error::NotConnected),
        }
        let Some(interface) = self.interface.take() else {
            return Err(Error::NotConnected);
        };

        let (store, pending) = ConfigStore::channel();
        let signals = Arc::new(LoopSignals::default());
        let control = ControlLoop::new(interface, self.config, pending, signals)
            .with_max_missed_cycles(self.max_missed_cycles);

        let previous = lock(&self.session).replace(RoastSession::start(Utc::now()));
        let session = self.session.clone();
        let on_reading = move |reading: Reading| {
            let stamped = lock(&session)
                .as_mut()
                .and_then(|s| s.record(reading, Utc::now()));
            if let Some(stamped) = stamped {
                debug!("{stamped:?}");
                callback(stamped);
            }
        };

        match LoopHandle::spawn(control, on_reading) {
            Ok(handle) => {
                info!("Roast started");
                self.store = Some(store);
                self.control = Some(handle);
                Ok(())
            }
            Err(err) => Err(self.spawn_failed(err, previous)),
        }
    }

    /// Undo the session opened for a loop which never ran. The transport went down with the
    /// closure, so the roaster is left disconnected.
    fn spawn_failed(
        &mut self,
        err: std::io::Error,
        previous: Option<RoastSession>,
    ) -> Error<S::Error> {
        warn!("Could not start the control loop: {err}");
        *lock(&self.session) = previous;
        Error::Spawn(err)
    }

    /// Begin the cool-down: heater and drum off, door open, cooling tray and main fan on.
    pub fn drop(&mut self) -> Result<(), S::Error> {
        let control = self.control.as_ref().ok_or(Error::NotRunning)?;
        control.signals().drop_beans();
        Ok(())
    }

    /// Stop the control loop and close the roast session.
    ///
    /// Waits for the loop to finish its current cycle, so no frame is written once this returns.
    /// A fatal error the loop died with is returned here.
    pub fn end(&mut self) -> Result<(), S::Error> {
        let control = self.control.take().ok_or(Error::NotRunning)?;
        let exit = control.stop();
        self.finish(exit)
    }

    /// Check on the control loop. If it terminated by itself, reap it and return its error.
    pub fn check(&mut self) -> Result<LoopState, S::Error> {
        match &self.control {
            Some(control) if control.is_finished() => {}
            Some(control) => return Ok(control.signals().state()),
            None => return Ok(self.loop_state()),
        }
        let Some(control) = self.control.take() else {
            return Ok(self.loop_state());
        };
        let exit = control.join();
        self.finish(exit)?;
        Ok(LoopState::Stopped)
    }

    fn finish(
        &mut self,
        exit: core::result::Result<LoopExit<S>, Error<S::Error>>,
    ) -> Result<(), S::Error> {
        self.store = None;
        if let Some(session) = lock(&self.session).as_mut() {
            session.close(Utc::now());
        }
        let exit = exit?;
        self.interface = Some(exit.interface);
        info!("Roast ended");
        exit.result
    }

    /// Whether a control loop is driving the roaster.
    pub fn is_roasting(&self) -> bool {
        self.control
            .as_ref()
            .is_some_and(|c| !c.is_finished() && c.signals().state() != LoopState::Failed)
    }

    pub fn loop_state(&self) -> LoopState {
        match &self.control {
            Some(control) => control.signals().state(),
            None if lock(&self.session).is_some() => LoopState::Stopped,
            None => LoopState::Idle,
        }
    }

    /// Snapshot of the current (or last) roast.
    pub fn session(&self) -> Option<RoastSession> {
        lock(&self.session).clone()
    }

    fn latest_reading(&self) -> Option<Reading> {
        lock(&self.session).as_ref().and_then(|s| s.latest().copied())
    }

    /// Get the current running config and state.
    pub fn get_current_config(&self) -> ConfigSnapshot {
        let mut settings = self.config;
        if let Some(reading) = self.latest_reading() {
            settings.update_sensors(&reading);
        }
        ConfigSnapshot {
            state: self.get_serial_state(),
            settings,
        }
    }

    fn push(&self) {
        if let Some(store) = &self.store {
            store.push(self.config);
        }
    }

    fn validate(channel: Channel, value: i64) -> Result<u8, S::Error> {
        if !channel.accepts(value) {
            return Err(Error::InvalidInput { channel, value });
        }
        u8::try_from(value).map_err(|_| Error::InvalidInput { channel, value })
    }

    /// Set the polling interval of the control loop.
    pub fn set_poll_interval(&mut self, interval: MillisDurationU32) -> Result<(), S::Error> {
        let millis = interval.to_millis() as i64;
        if !Channel::PollInterval.accepts(millis) {
            return Err(Error::InvalidInput {
                channel: Channel::PollInterval,
                value: millis,
            });
        }
        self.config.poll_interval = interval;
        self.push();
        Ok(())
    }

    pub fn get_poll_interval(&self) -> MillisDurationU32 {
        self.config.poll_interval
    }

    /// Set the heater power, `0..=100`.
    pub fn set_heater(&mut self, heater: i32) -> Result<(), S::Error> {
        self.config.heater = Self::validate(Channel::Heater, heater.into())?;
        self.push();
        Ok(())
    }

    pub fn get_heater(&self) -> u8 {
        self.config.heater
    }

    /// Set the exhaust fan speed, `0..=10`.
    pub fn set_fan(&mut self, fan: i32) -> Result<(), S::Error> {
        self.config.fan = Self::validate(Channel::Fan, fan.into())?;
        self.push();
        Ok(())
    }

    pub fn get_fan(&self) -> u8 {
        self.config.fan
    }

    /// Set the main fan speed, `0..=10`.
    pub fn set_main_fan(&mut self, main_fan: i32) -> Result<(), S::Error> {
        self.config.main_fan = Self::validate(Channel::MainFan, main_fan.into())?;
        self.push();
        Ok(())
    }

    pub fn get_main_fan(&self) -> u8 {
        self.config.main_fan
    }

    pub fn set_drum_motor(&mut self, drum_motor: bool) -> Result<(), S::Error> {
        self.config.drum_motor = drum_motor;
        self.push();
        Ok(())
    }

    pub fn get_drum_motor(&self) -> bool {
        self.config.drum_motor
    }

    pub fn set_solenoid(&mut self, solenoid: bool) -> Result<(), S::Error> {
        self.config.solenoid = solenoid;
        self.push();
        Ok(())
    }

    pub fn get_solenoid(&self) -> bool {
        self.config.solenoid
    }

    /// Switch the cooling motor fully on or off.
    pub fn set_cooling_motor(&mut self, cooling_motor: bool) -> Result<(), S::Error> {
        self.config.cooling_motor = cooling_motor as u8;
        self.push();
        Ok(())
    }

    /// Set the cooling motor intensity, `0..=10`.
    pub fn set_cooling_motor_level(&mut self, level: i32) -> Result<(), S::Error> {
        self.config.cooling_motor = Self::validate(Channel::CoolingMotor, level.into())?;
        self.push();
        Ok(())
    }

    pub fn get_cooling_motor(&self) -> u8 {
        self.config.cooling_motor
    }

    /// Environment temperature from the latest reading, Fahrenheit.
    pub fn get_external_temp(&self) -> f64 {
        self.get_current_config().settings.external_temp
    }

    /// Bean temperature from the latest reading, Fahrenheit.
    pub fn get_bean_temp(&self) -> f64 {
        self.get_current_config().settings.bean_temp
    }

    pub fn get_chaff_tray(&self) -> u8 {
        self.get_current_config().settings.chaff_tray
    }
}

impl<S> Drop for Roaster<S>
where
    S: Transport + Send + 'static,
    S::Error: Send + 'static,
{
    fn drop(&mut self) {
        if let Some(control) = self.control.take() {
            debug!("Roaster dropped while roasting, stopping control loop");
            if let Ok(LoopExit { result: Err(err), .. }) = control.stop() {
                warn!("Control loop ended with: {err}");
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
