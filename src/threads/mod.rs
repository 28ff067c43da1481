//! Multi-threaded runtime for DhruvaDock.
//!
//! Separates concerns into two worker threads:
//! - Control thread: snapshot, behavior/docking FSMs, velocity commands
//! - Simulator thread: bench robot publishing onto the sensor channels

mod control;
mod sim;

pub use control::ControlThread;
pub use sim::SimThread;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::DockConfig;
use crate::control::SharedVelocitySink;
use crate::error::Result;
use crate::sensors::sensor_channels;
use crate::shared::SharedState;

/// Thread handles for the multi-threaded system.
pub struct ThreadHandles {
    pub control: JoinHandle<()>,
    pub sim: JoinHandle<()>,
}

/// Spawn all threads and return handles.
pub fn spawn_threads(config: DockConfig, shared_state: Arc<SharedState>) -> Result<ThreadHandles> {
    let (channels, receivers) = sensor_channels(config.control.channel_capacity);

    let sink = SharedVelocitySink::new(Arc::clone(&shared_state)).with_tone_log();
    let mut control = ControlThread::new(&config, Arc::clone(&shared_state), receivers, sink);
    if let Some(target) = config.mission.target {
        control.assign_target(target)?;
    }
    let mut sim = SimThread::new(&config, Arc::clone(&shared_state), channels);

    let control_handle = thread::Builder::new()
        .name("control".into())
        .spawn(move || control.run())?;

    let sim_handle = thread::Builder::new()
        .name("sim".into())
        .spawn(move || sim.run())?;

    Ok(ThreadHandles {
        control: control_handle,
        sim: sim_handle,
    })
}
