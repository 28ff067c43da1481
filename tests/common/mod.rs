//! Shared harness for the integration scenarios.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use dhruva_dock::config::DockConfig;
use dhruva_dock::control::{BehaviorState, ControlOutput, SharedVelocitySink};
use dhruva_dock::sensors::{
    MarkerBatch, MarkerDetection, MarkerFilter, SensorChannels, SensorSnapshot, sensor_channels,
};
use dhruva_dock::shared::SharedState;
use dhruva_dock::sim::SimWorld;
use dhruva_dock::threads::ControlThread;
use dhruva_dock::types::{Pose2D, StationId};

pub const TICK: Duration = Duration::from_millis(200);

/// Default world without dropout or measurement noise.
pub fn quiet_config() -> DockConfig {
    let mut config = DockConfig::default();
    config.sim.dropout_probability = 0.0;
    config.sim.marker_noise = 0.0;
    config.control.stop_hold_ms = 0;
    config
}

/// Hand-fed marker detections for one id, producing snapshots 200ms apart.
pub struct MarkerFeed {
    pub id: u32,
    pub filter: MarkerFilter,
    pub now: Instant,
}

impl MarkerFeed {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            filter: MarkerFilter::new(0..18),
            now: Instant::now(),
        }
    }

    /// Next snapshot; `marker` is (lateral offset, depth) seen head-on.
    pub fn next(&mut self, marker: Option<(f32, f32)>) -> SensorSnapshot {
        self.now += TICK;
        let detections = marker
            .map(|(x, z)| {
                vec![MarkerDetection {
                    id: self.id,
                    position: [x, 0.0, z],
                    orientation: [0.0, 1.0, 0.0, 0.0],
                }]
            })
            .unwrap_or_default();
        let fresh = self.filter.apply(&MarkerBatch { detections });
        SensorSnapshot {
            markers: self.filter.memory().clone(),
            fresh,
            ..SensorSnapshot::new(self.now)
        }
    }
}

/// Closed loop: simulated robot feeding the real control stack, stepped
/// deterministically without threads.
pub struct Bench {
    pub world: SimWorld,
    pub control: ControlThread<SharedVelocitySink>,
    channels: SensorChannels,
    state: Arc<SharedState>,
    substeps: u32,
    sim_dt: f32,
    pub now: Instant,
    /// Behavior states in the order they were entered
    pub visited: Vec<BehaviorState>,
    /// Targets in the order they were pursued
    pub targets: Vec<StationId>,
}

impl Bench {
    pub fn new(config: &DockConfig) -> Self {
        let (channels, receivers) = sensor_channels(64);
        let state = Arc::new(SharedState::new());
        let sink = SharedVelocitySink::new(Arc::clone(&state));
        let control = ControlThread::new(config, Arc::clone(&state), receivers, sink);
        let substeps = (config.sim.rate_hz / config.control.rate_hz).round().max(1.0) as u32;
        Self {
            world: SimWorld::new(config),
            control,
            channels,
            state,
            substeps,
            sim_dt: 1.0 / config.sim.rate_hz,
            now: Instant::now(),
            visited: Vec::new(),
            targets: Vec::new(),
        }
    }

    /// One control period of physics, one sensor frame, one control tick.
    pub fn tick(&mut self) -> ControlOutput {
        let cmd = self.state.velocity();
        for _ in 0..self.substeps {
            if let Some(event) = self.world.step(cmd, self.sim_dt) {
                self.channels.bump.send(event).unwrap();
            }
        }
        self.channels.pose.send(self.world.pose_sample()).unwrap();
        self.channels.markers.send(self.world.detect_markers()).unwrap();
        self.channels
            .obstacle
            .send(self.world.obstacle_signal())
            .unwrap();

        self.now += TICK;
        let output = self.control.step(self.now);

        if self.visited.last() != Some(&output.state) {
            self.visited.push(output.state);
        }
        if let Some(target) = self.control.controller().behavior().target()
            && self.targets.last() != Some(&target)
        {
            self.targets.push(target);
        }
        output
    }

    /// Tick until the mission completes. Returns the tick count.
    pub fn run_to_completion(&mut self, max_ticks: usize) -> Option<usize> {
        (1..=max_ticks).find(|_| self.tick().mission_complete)
    }

    pub fn pose(&self) -> Pose2D {
        self.world.pose()
    }
}
