//! Control thread: fixed-rate mission control loop.
//!
//! Each tick:
//! - Drains the sensor channels into one snapshot
//! - Runs the interrupt handler / behavior / docking stack
//! - Applies pose re-anchoring requests
//! - Sends the velocity command and tones to the motion sink

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::DockConfig;
use crate::control::{ControlOutput, InterruptHandler, MotionSink};
use crate::error::Result;
use crate::sensors::{SensorAggregator, SensorReceivers};
use crate::shared::SharedState;
use crate::types::{Pose2D, StationId, Twist};

/// Control thread state and logic.
pub struct ControlThread<S: MotionSink> {
    shared_state: Arc<SharedState>,
    aggregator: SensorAggregator,
    controller: InterruptHandler,
    sink: S,
    tick_interval: Duration,
    stop_hold: Duration,
    last_status_time: Instant,
    status_interval: Duration,
    last_velocity: Twist,
}

impl<S: MotionSink> ControlThread<S> {
    pub fn new(
        config: &DockConfig,
        shared_state: Arc<SharedState>,
        receivers: SensorReceivers,
        sink: S,
    ) -> Self {
        Self {
            shared_state,
            aggregator: SensorAggregator::new(config, receivers),
            controller: InterruptHandler::new(config),
            sink,
            tick_interval: config.tick_interval(),
            stop_hold: Duration::from_millis(config.control.stop_hold_ms),
            last_status_time: Instant::now(),
            status_interval: Duration::from_secs_f32(config.control.status_interval_secs),
            last_velocity: Twist::STOP,
        }
    }

    pub fn assign_target(&mut self, id: StationId) -> Result<()> {
        self.controller.assign_target(id)
    }

    pub fn controller(&self) -> &InterruptHandler {
        &self.controller
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run the control loop until shutdown. Always leaves the robot stopped.
    pub fn run(&mut self) {
        tracing::info!(
            "Control thread started ({:.0}ms tick)",
            self.tick_interval.as_secs_f32() * 1000.0
        );

        loop {
            let loop_start = Instant::now();

            if self.shared_state.should_shutdown() {
                tracing::info!("Control thread shutting down");
                break;
            }

            let output = self.step(loop_start);
            if output.mission_complete && !self.shared_state.is_mission_complete() {
                tracing::info!("Mission complete");
                self.shared_state.set_mission_complete();
            }

            // Maintain loop rate
            let elapsed = loop_start.elapsed();
            if elapsed < self.tick_interval {
                std::thread::sleep(self.tick_interval - elapsed);
            }
        }

        self.stop_and_hold();
    }

    /// One control tick at `now`.
    pub fn step(&mut self, now: Instant) -> ControlOutput {
        let snapshot = self.aggregator.snapshot(now);
        let output = self.controller.tick(&snapshot);

        if let Some(pose) = output.reanchor {
            self.aggregator.reanchor(pose);
        }

        for tone in &output.tones {
            self.sink.play_tone(*tone);
        }

        if let Err(e) = self.sink.send_velocity(output.velocity) {
            tracing::warn!("Failed to send velocity command: {}", e);
        }
        self.last_velocity = output.velocity;
        self.shared_state.increment_tick_count();

        if now.saturating_duration_since(self.last_status_time) >= self.status_interval {
            self.log_status(&snapshot.pose, &output);
            self.last_status_time = now;
        }

        output
    }

    /// Send zero velocity and keep repeating it for the hold period.
    pub fn stop_and_hold(&mut self) {
        tracing::info!(
            "Stopping robot (holding {:.1}s)",
            self.stop_hold.as_secs_f32()
        );
        let hold_start = Instant::now();
        loop {
            if let Err(e) = self.sink.send_velocity(Twist::STOP) {
                tracing::warn!("Failed to send stop command: {}", e);
            }
            if hold_start.elapsed() >= self.stop_hold {
                break;
            }
            std::thread::sleep(self.tick_interval.min(self.stop_hold));
        }
        self.last_velocity = Twist::STOP;
    }

    fn log_status(&self, pose: &Pose2D, output: &ControlOutput) {
        let target = self
            .controller
            .behavior()
            .target()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        tracing::info!(
            "Status: {:?}{}, target={}, pose=({:.2}, {:.2}, {:.1}°), cmd=({:.2}, {:.2})",
            output.state,
            output
                .docking
                .map(|d| format!("/{:?}", d))
                .unwrap_or_default(),
            target,
            pose.x,
            pose.y,
            pose.theta.to_degrees(),
            self.last_velocity.linear,
            self.last_velocity.angular
        );
    }
}
