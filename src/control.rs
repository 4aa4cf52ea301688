//! The background control loop which keeps the roaster fed with configuration frames and reads
//! its state back.
//!
//! A loop runs through `WakingUp -> Polling -> Stopped`. Cool-down is not a separate path, it is
//! an override stamped onto every outbound frame once [`LoopSignals::drop_beans`] was called.
//! Each polling cycle:
//!
//! 1. applies every pending configuration push,
//! 2. reads one frame, with up to [`READ_ATTEMPTS`] attempts,
//! 3. hands the reading to the callback,
//! 4. applies the cool-down override if requested,
//! 5. writes the configuration and sleeps for the polling interval.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    thread::{self, JoinHandle},
};

use log::{debug, error, info, warn};
use pretty_hex::simple_hex;

use crate::{
    error::{Error, Result},
    frame::{self, FRAME_LEN},
    store::PendingConfigs,
    transport::{Transport, is_timeout},
    types::{Configuration, LoopState, Reading},
};

/// Frames sent before the first read. The roaster may ignore reads right after power up.
pub const WAKE_UP_FRAMES: u32 = 10;

/// Read attempts per cycle before the cycle is skipped.
pub const READ_ATTEMPTS: u32 = 3;

/// Default number of consecutive skipped cycles after which the device is considered gone.
pub const DEFAULT_MAX_MISSED_CYCLES: u32 = 10;

/// Flags shared between the roaster and its loop.
#[derive(Debug)]
pub struct LoopSignals {
    cooldown: AtomicBool,
    exit: AtomicBool,
    state: AtomicU8,
}

impl Default for LoopSignals {
    fn default() -> Self {
        Self {
            cooldown: AtomicBool::new(false),
            exit: AtomicBool::new(false),
            state: AtomicU8::new(LoopState::Idle as u8),
        }
    }
}

impl LoopSignals {
    /// Begin the cool-down. Takes effect on the next write.
    pub fn drop_beans(&self) {
        debug!("Dropping the coffee");
        self.cooldown.store(true, Ordering::SeqCst);
    }

    /// Ask the loop to exit at the next cycle boundary.
    pub fn shutdown(&self) {
        debug!("Shutdown initiated");
        self.exit.store(true, Ordering::SeqCst);
    }

    pub fn cooldown_requested(&self) -> bool {
        self.cooldown.load(Ordering::SeqCst)
    }

    pub fn exit_requested(&self) -> bool {
        self.exit.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> LoopState {
        LoopState::from(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: LoopState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

/// What a single polling cycle produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// A valid frame was read and reported.
    Reported(Reading),
    /// No valid frame within [`READ_ATTEMPTS`], nothing was reported.
    Skipped,
}

/// How a loop ended, along with the transport it borrowed.
pub struct LoopExit<S: Transport> {
    pub interface: S,
    pub result: Result<(), S::Error>,
}

/// Drives the read/write cycle against a transport.
pub struct ControlLoop<S: Transport> {
    interface: S,
    /// Private working copy, only ever updated from `pending` and the cool-down override.
    config: Configuration,
    pending: PendingConfigs,
    signals: Arc<LoopSignals>,
    missed_cycles: u32,
    max_missed_cycles: u32,
}

impl<S: Transport> ControlLoop<S> {
    pub fn new(
        interface: S,
        config: Configuration,
        pending: PendingConfigs,
        signals: Arc<LoopSignals>,
    ) -> Self {
        Self {
            interface,
            config,
            pending,
            signals,
            missed_cycles: 0,
            max_missed_cycles: DEFAULT_MAX_MISSED_CYCLES,
        }
    }

    /// Consecutive skipped cycles tolerated before the loop gives up.
    pub fn with_max_missed_cycles(mut self, cycles: u32) -> Self {
        self.max_missed_cycles = cycles.max(1);
        self
    }

    /// The loop's current working configuration.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Run the loop to completion on the current thread.
    pub fn run<F: FnMut(Reading)>(mut self, mut on_reading: F) -> LoopExit<S> {
        let result = self.run_cycles(&mut on_reading);
        match &result {
            Ok(()) => {
                info!("Control loop stopped");
                self.signals.set_state(LoopState::Stopped);
            }
            Err(err) => {
                error!("Control loop failed: {err}");
                self.signals.set_state(LoopState::Failed);
            }
        }
        LoopExit {
            interface: self.interface,
            result,
        }
    }

    fn run_cycles<F: FnMut(Reading)>(&mut self, on_reading: &mut F) -> Result<(), S::Error> {
        self.signals.set_state(LoopState::WakingUp);
        self.wake_up()?;
        self.pending.apply_to(&mut self.config);

        if !self.signals.cooldown_requested() {
            self.signals.set_state(LoopState::Polling);
        }
        while !self.signals.exit_requested() {
            self.poll_once(on_reading)?;
            std::thread::sleep(self.config.poll_interval_std());
        }
        Ok(())
    }

    /// Prime the roaster with configuration frames before any read.
    fn wake_up(&mut self) -> Result<(), S::Error> {
        for _ in 0..WAKE_UP_FRAMES {
            if self.signals.exit_requested() {
                break;
            }
            self.apply_cooldown_if_requested();
            self.send_config()?;
            std::thread::sleep(self.config.poll_interval_std());
        }
        Ok(())
    }

    /// One polling cycle, without the trailing sleep.
    pub fn poll_once<F: FnMut(Reading)>(
        &mut self,
        on_reading: &mut F,
    ) -> Result<CycleOutcome, S::Error> {
        let applied = self.pending.apply_to(&mut self.config);
        if applied > 0 {
            debug!("Applied {applied} configuration update(s)");
        }

        let outcome = match self.read_settings()? {
            Some(reading) => {
                self.missed_cycles = 0;
                self.config.update_sensors(&reading);
                on_reading(reading);
                CycleOutcome::Reported(reading)
            }
            None => {
                self.missed_cycles += 1;
                warn!(
                    "No valid frame after {READ_ATTEMPTS} attempts ({} cycle(s) in a row)",
                    self.missed_cycles
                );
                if self.missed_cycles >= self.max_missed_cycles {
                    return Err(Error::DeviceSilent {
                        cycles: self.missed_cycles,
                    });
                }
                CycleOutcome::Skipped
            }
        };

        // Pushes were merged above, so the override always has the last word.
        self.apply_cooldown_if_requested();
        self.send_config()?;
        Ok(outcome)
    }

    fn apply_cooldown_if_requested(&mut self) {
        if self.signals.cooldown_requested() {
            if self.signals.state() != LoopState::CoolingDown {
                debug!("Cool down process triggered");
                self.signals.set_state(LoopState::CoolingDown);
            }
            self.config.apply_cooldown();
        }
    }

    /// Encode the working configuration and write it out. Failures are not retried.
    fn send_config(&mut self) -> Result<(), S::Error> {
        let serialized = frame::encode(&self.config);
        debug!("Sending configuration: {}", simple_hex(&serialized));
        self.interface.flush_input().map_err(Error::Serial)?;
        self.interface.flush_output().map_err(Error::Serial)?;
        self.interface.write_all(&serialized).map_err(Error::Serial)?;
        self.interface.flush().map_err(Error::Serial)?;
        Ok(())
    }

    /// Read and decode one frame, re-reading on failure.
    ///
    /// Returns `None` once every attempt failed.
    fn read_settings(&mut self) -> Result<Option<Reading>, S::Error> {
        if !self.interface.is_open() {
            self.interface.open().map_err(Error::Connection)?;
        }

        for attempt in 1..=READ_ATTEMPTS {
            match self.read_frame() {
                Ok(buffer) => match frame::decode(&buffer) {
                    Ok(reading) => return Ok(Some(reading)),
                    Err(err) => debug!("Read attempt {attempt}/{READ_ATTEMPTS}: {err}"),
                },
                Err(err) => debug!("Read attempt {attempt}/{READ_ATTEMPTS}: {err:?}"),
            }
        }
        Ok(None)
    }

    /// Collect up to one frame worth of bytes. Stops early on a timeout.
    fn read_frame(&mut self) -> core::result::Result<heapless::Vec<u8, FRAME_LEN>, S::Error> {
        self.interface.flush_input()?;
        self.interface.flush_output()?;

        let mut buff: heapless::Vec<u8, FRAME_LEN> = heapless::Vec::new();
        let mut temp_buf = [0u8; FRAME_LEN];
        while !buff.is_full() {
            let wanted = FRAME_LEN - buff.len();
            match self.interface.read(&mut temp_buf[..wanted]) {
                Ok(0) => break,
                Ok(bytes_read) => {
                    if buff.extend_from_slice(&temp_buf[..bytes_read]).is_err() {
                        break;
                    }
                }
                Err(e) if is_timeout(&e) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(buff)
    }
}

/// A control loop running on its own thread.
pub struct LoopHandle<S: Transport> {
    signals: Arc<LoopSignals>,
    join: JoinHandle<LoopExit<S>>,
}

impl<S> LoopHandle<S>
where
    S: Transport + Send + 'static,
    S::Error: Send + 'static,
{
    /// Move `control` onto a dedicated thread.
    pub fn spawn<F>(control: ControlLoop<S>, on_reading: F) -> std::io::Result<Self>
    where
        F: FnMut(Reading) + Send + 'static,
    {
        let signals = control.signals.clone();
        let join = thread::Builder::new()
            .name("hottop-control".into())
            .spawn(move || control.run(on_reading))?;
        Ok(Self { signals, join })
    }

    pub fn signals(&self) -> &Arc<LoopSignals> {
        &self.signals
    }

    /// Whether the thread has returned, on its own or after a shutdown.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Signal shutdown and wait for the thread.
    ///
    /// `Err` only if the thread panicked, in which case the transport is lost.
    pub fn stop(self) -> core::result::Result<LoopExit<S>, Error<S::Error>> {
        self.signals.shutdown();
        self.join()
    }

    /// Wait for the thread without signalling it.
    pub fn join(self) -> core::result::Result<LoopExit<S>, Error<S::Error>> {
        self.join.join().map_err(|_| Error::LoopPanicked)
    }
}
