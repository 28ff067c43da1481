//! Simulator thread: bench stand-in for the robot transport layer.
//!
//! Runs the kinematic world at the simulator rate, reads the commanded
//! velocity from shared state and publishes pose, marker batches, obstacle
//! signals and bumper presses onto the sensor channels.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, TrySendError};

use crate::config::DockConfig;
use crate::sensors::SensorChannels;
use crate::shared::SharedState;
use crate::sim::SimWorld;

/// Simulator thread state and logic.
pub struct SimThread {
    shared_state: Arc<SharedState>,
    channels: SensorChannels,
    world: SimWorld,
    tick_interval: Duration,
    /// Simulator ticks per camera frame
    camera_divider: u32,
}

impl SimThread {
    pub fn new(
        config: &DockConfig,
        shared_state: Arc<SharedState>,
        channels: SensorChannels,
    ) -> Self {
        let sim = &config.sim;
        let camera_divider = (sim.rate_hz / sim.camera_rate_hz).round().max(1.0) as u32;
        Self {
            shared_state,
            channels,
            world: SimWorld::new(config),
            tick_interval: Duration::from_secs_f32(1.0 / sim.rate_hz),
            camera_divider,
        }
    }

    /// Run until shutdown or until the controller side hangs up.
    pub fn run(&mut self) {
        tracing::info!(
            "Simulator started at ({:.2}, {:.2}, {:.1}°)",
            self.world.pose().x,
            self.world.pose().y,
            self.world.pose().theta.to_degrees()
        );

        let dt = self.tick_interval.as_secs_f32();
        let mut tick: u32 = 0;

        loop {
            let loop_start = Instant::now();

            if self.shared_state.should_shutdown() {
                tracing::info!("Simulator shutting down");
                break;
            }

            let cmd = self.shared_state.velocity();
            let bump = self.world.step(cmd, dt);

            let mut connected = publish(&self.channels.pose, self.world.pose_sample(), "pose");
            if let Some(event) = bump {
                connected &= publish(&self.channels.bump, event, "bump");
            }
            if tick % self.camera_divider == 0 {
                let batch = self.world.detect_markers();
                connected &= publish(&self.channels.markers, batch, "markers");
                let signal = self.world.obstacle_signal();
                connected &= publish(&self.channels.obstacle, signal, "obstacle");
            }

            if !connected {
                tracing::info!("Sensor consumer gone, simulator stopping");
                break;
            }
            tick = tick.wrapping_add(1);

            // Maintain loop rate
            let elapsed = loop_start.elapsed();
            if elapsed < self.tick_interval {
                std::thread::sleep(self.tick_interval - elapsed);
            }
        }
    }
}

/// Non-blocking send. A full channel drops the sample; returns false once
/// the receiver is gone.
fn publish<T>(tx: &Sender<T>, msg: T, source: &str) -> bool {
    match tx.try_send(msg) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!("Sensor channel full, dropping {} sample", source);
            true
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}
