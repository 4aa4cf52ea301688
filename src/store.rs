//! Hand-off of configuration updates from the roaster to its running control loop.
//!
//! The roaster side pushes whole [`Configuration`] snapshots without ever blocking. The loop
//! drains everything queued at the start of each cycle and applies it in submission order.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use log::debug;

use crate::types::Configuration;

/// Producer half, owned by the [`Roaster`](crate::roaster::Roaster).
#[derive(Debug, Clone)]
pub struct ConfigStore {
    tx: Sender<Configuration>,
}

/// Consumer half, owned by the control loop.
#[derive(Debug)]
pub struct PendingConfigs {
    rx: Receiver<Configuration>,
}

impl ConfigStore {
    /// Create a connected store and pending queue.
    pub fn channel() -> (ConfigStore, PendingConfigs) {
        let (tx, rx) = mpsc::channel();
        (ConfigStore { tx }, PendingConfigs { rx })
    }

    /// Queue a configuration for the loop. Never blocks.
    ///
    /// If the loop has already exited the update is dropped, there is nobody left to apply it.
    pub fn push(&self, config: Configuration) {
        if self.tx.send(config).is_err() {
            debug!("Control loop has exited, configuration update dropped");
        }
    }
}

impl PendingConfigs {
    /// Take every queued configuration, oldest first.
    pub fn drain_all(&self) -> Vec<Configuration> {
        let mut pending = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(config) => pending.push(config),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        pending
    }

    /// Drain the queue into `working`, last push winning for every channel.
    ///
    /// Returns how many updates were applied.
    pub fn apply_to(&self, working: &mut Configuration) -> usize {
        let pending = self.drain_all();
        for update in &pending {
            working.absorb(update);
        }
        pending.len()
    }
}
