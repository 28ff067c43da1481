//! Top-level mission behavior.
//!
//! WAIT until a target is assigned, TRAVEL to its waypoint, hand over to the
//! docking controller once the target marker is in range (APPROACH / DOCK),
//! then head home. Interrupt states are entered and left through
//! [`InterruptHandler`](super::InterruptHandler).

use std::time::{Duration, Instant};

use crate::config::{BehaviorConfig, DockConfig, ResumePolicy};
use crate::error::{DockError, Result};
use crate::sensors::SensorSnapshot;
use crate::types::{Pose2D, StationId, Tone, Twist};
use crate::utils::angle_diff;

use super::docking::{DockState, DockStatus, DockTarget, DockingController};
use super::mission::MissionProfile;

/// Behavior state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BehaviorState {
    /// Idle, no target
    Wait,
    /// Driving to the target waypoint
    Travel,
    /// Docking, before contact
    Approach,
    /// Docking, at or leaving the dispenser
    Dock,
    /// Recovering from a bumper press
    Bumped,
    /// Steering around an obstacle ahead
    AvoidObstacle,
}

impl BehaviorState {
    pub fn is_interrupt(self) -> bool {
        matches!(self, BehaviorState::Bumped | BehaviorState::AvoidObstacle)
    }

    /// States an obstacle may preempt. Bumps preempt every state.
    pub fn is_interruptible(self) -> bool {
        !self.is_interrupt()
    }
}

/// Result of one control tick.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlOutput {
    pub state: BehaviorState,
    /// Docking sub-state while APPROACH or DOCK
    pub docking: Option<DockState>,
    pub velocity: Twist,
    pub tones: Vec<Tone>,
    /// Pose the estimator should be re-anchored to
    pub reanchor: Option<Pose2D>,
    /// Home reached; nothing left to do
    pub mission_complete: bool,
}

impl ControlOutput {
    pub fn idle(state: BehaviorState) -> Self {
        Self {
            state,
            docking: None,
            velocity: Twist::STOP,
            tones: Vec::new(),
            reanchor: None,
            mission_complete: false,
        }
    }
}

/// Mission behavior controller.
pub struct BehaviorController {
    config: BehaviorConfig,
    profile: MissionProfile,
    state: BehaviorState,
    target: Option<StationId>,
    /// Target marker was in range when docking began
    marker_seen: bool,
    /// Start of the fixed forward leg toward a detour waypoint
    detour_leg: Option<Instant>,
    docking: DockingController,
    complete: bool,
}

impl BehaviorController {
    pub fn new(config: &DockConfig) -> Self {
        Self {
            config: config.behavior.clone(),
            profile: MissionProfile::from_config(config),
            state: BehaviorState::Wait,
            target: None,
            marker_seen: false,
            detour_leg: None,
            docking: DockingController::new(config.docking.clone()),
            complete: false,
        }
    }

    pub fn state(&self) -> BehaviorState {
        self.state
    }

    pub fn target(&self) -> Option<StationId> {
        self.target
    }

    pub fn marker_seen(&self) -> bool {
        self.marker_seen
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn profile(&self) -> &MissionProfile {
        &self.profile
    }

    /// Docking sub-state, when docking is active.
    pub fn docking_state(&self) -> Option<DockState> {
        match self.state {
            BehaviorState::Approach | BehaviorState::Dock => Some(self.docking.state()),
            _ => None,
        }
    }

    /// Assign a new target station and start traveling to it.
    pub fn assign_target(&mut self, id: StationId) -> Result<()> {
        if !self.profile.catalog.contains(id) {
            return Err(DockError::Mission(format!("unknown station {}", id)));
        }
        tracing::info!("Target assigned: station {}", id);
        self.target = Some(id);
        self.complete = false;
        self.marker_seen = false;
        self.detour_leg = None;
        self.docking.reset();
        self.set_state(BehaviorState::Travel, "target assigned");
        Ok(())
    }

    /// The target's marker is recorded within the very-close distance.
    pub fn very_close(&self, snap: &SensorSnapshot) -> bool {
        let Some(target) = self.target else {
            return false;
        };
        snap.markers
            .observation(target.marker_id())
            .is_some_and(|obs| obs.z <= self.config.very_close_distance)
    }

    /// Mark the start of an interrupt. Returns the state to resume from.
    pub fn interrupt(&mut self, kind: BehaviorState) -> BehaviorState {
        let previous = self.state;
        self.set_state(kind, "interrupt");
        previous
    }

    /// Leave an interrupt state. Docking always restarts from scratch.
    pub fn resume_after_interrupt(
        &mut self,
        remembered: BehaviorState,
        very_close: bool,
    ) -> BehaviorState {
        self.docking.reset();
        self.marker_seen = false;
        self.detour_leg = None;

        let next = if self.target.is_none() {
            BehaviorState::Wait
        } else {
            match self.profile.resume_policy {
                ResumePolicy::AlwaysTravel => BehaviorState::Travel,
                ResumePolicy::Previous => match remembered {
                    BehaviorState::Approach | BehaviorState::Dock => BehaviorState::Travel,
                    _ if very_close => BehaviorState::Travel,
                    BehaviorState::Wait => BehaviorState::Wait,
                    _ => BehaviorState::Travel,
                },
            }
        };
        self.set_state(next, "interrupt recovered");
        next
    }

    /// Advance one control tick.
    pub fn tick(&mut self, snap: &SensorSnapshot) -> ControlOutput {
        match self.state {
            BehaviorState::Wait => ControlOutput {
                mission_complete: self.complete,
                ..ControlOutput::idle(self.state)
            },
            BehaviorState::Travel => self.travel(snap),
            BehaviorState::Approach | BehaviorState::Dock => self.dock(snap),
            // Driven by the interrupt handler
            BehaviorState::Bumped | BehaviorState::AvoidObstacle => {
                ControlOutput::idle(self.state)
            }
        }
    }

    fn travel(&mut self, snap: &SensorSnapshot) -> ControlOutput {
        let Some(target) = self.target else {
            self.set_state(BehaviorState::Wait, "no target");
            return ControlOutput::idle(self.state);
        };

        if target.is_detour() {
            return self.travel_detour(target, snap);
        }

        let marker_id = target.marker_id();
        let threshold = self
            .profile
            .approach_threshold(target)
            .unwrap_or(f32::INFINITY);
        if let Some(obs) = snap.markers.observation(marker_id)
            && obs.z <= threshold
        {
            tracing::info!(
                "Marker {} in range: depth={:.2}m (threshold {:.2}m)",
                marker_id,
                obs.z,
                threshold
            );
            self.marker_seen = true;
            self.docking.start(
                DockTarget {
                    marker_id,
                    is_home: self.profile.is_home(target),
                    dock_pose: self.profile.dock_pose(target),
                },
                snap.stamp,
            );
            self.set_state(BehaviorState::Approach, "marker in range");
            return ControlOutput {
                docking: Some(self.docking.state()),
                tones: vec![Tone::MarkerAcquired],
                ..ControlOutput::idle(self.state)
            };
        }

        let Some(waypoint) = self.profile.waypoint(target) else {
            tracing::warn!("Station {} has no waypoint, waiting", target);
            self.set_state(BehaviorState::Wait, "no waypoint");
            return ControlOutput::idle(self.state);
        };

        let velocity = if snap.pose.distance(&Pose2D::new(waypoint.0, waypoint.1, 0.0))
            <= self.config.waypoint_tolerance
        {
            // At the waypoint without the marker: scan in place
            Twist::rotate(self.config.scan_angular_vel)
        } else {
            self.steer_to(snap.pose, waypoint)
        };

        ControlOutput {
            velocity,
            ..ControlOutput::idle(self.state)
        }
    }

    /// Orient toward the detour waypoint, drive a fixed leg, then continue
    /// to the real station.
    fn travel_detour(&mut self, target: StationId, snap: &SensorSnapshot) -> ControlOutput {
        let leg = Duration::from_secs_f32(self.config.detour_leg_secs);
        let velocity = match self.detour_leg {
            Some(started) if snap.stamp.duration_since(started) >= leg => {
                let real = target.decode();
                tracing::info!("Detour {} complete, heading for station {}", target, real);
                self.target = Some(real);
                self.detour_leg = None;
                Twist::STOP
            }
            Some(_) => Twist::forward(self.config.travel_linear_vel),
            None => match self.profile.waypoint(target) {
                Some(waypoint) => {
                    let velocity = self.steer_to(snap.pose, waypoint);
                    if velocity.angular == 0.0 {
                        tracing::debug!("Detour {}: oriented, starting leg", target);
                        self.detour_leg = Some(snap.stamp);
                    }
                    velocity
                }
                None => {
                    tracing::warn!("Detour {} has no waypoint, skipping", target);
                    self.target = Some(target.decode());
                    Twist::STOP
                }
            },
        };

        ControlOutput {
            velocity,
            ..ControlOutput::idle(self.state)
        }
    }

    /// Turn in place until facing the point, then drive straight.
    fn steer_to(&self, pose: Pose2D, (x, y): (f32, f32)) -> Twist {
        let error = angle_diff(pose.bearing_to(x, y), pose.theta);
        if error.abs() >= self.config.heading_tolerance_deg.to_radians() {
            let angular = error.signum() * self.config.heading_law.speed(error);
            tracing::debug!(
                "travel: heading error={:.1}°, angular={:.3}",
                error.to_degrees(),
                angular
            );
            Twist::rotate(angular)
        } else {
            Twist::forward(self.config.travel_linear_vel)
        }
    }

    fn dock(&mut self, snap: &SensorSnapshot) -> ControlOutput {
        let step = self.docking.update(snap);
        let mut tones = Vec::new();

        let phase = if step.state.is_contact_phase() {
            BehaviorState::Dock
        } else {
            BehaviorState::Approach
        };
        if phase != self.state {
            self.set_state(phase, "docking progressed");
        }

        match step.status {
            DockStatus::InProgress => {}
            DockStatus::Docked => {
                tones.push(Tone::Docked);
                self.finish_docking();
            }
            DockStatus::Failed => {
                tones.push(Tone::DockFailed);
                self.marker_seen = false;
                self.docking.reset();
                self.set_state(BehaviorState::Travel, "docking failed");
            }
        }

        ControlOutput {
            state: self.state,
            docking: Some(step.state),
            velocity: step.velocity,
            tones,
            reanchor: step.reanchor,
            mission_complete: self.complete,
        }
    }

    fn finish_docking(&mut self) {
        let Some(target) = self.target else {
            return;
        };
        self.marker_seen = false;
        self.docking.reset();

        if self.profile.is_home(target) {
            tracing::info!("Docked at home station {}, mission complete", target.decode());
            self.target = None;
            self.complete = true;
            self.set_state(BehaviorState::Wait, "home reached");
        } else {
            let home = self.profile.return_target();
            tracing::info!("Docked at station {}, returning via {}", target, home);
            self.target = Some(home);
            self.set_state(BehaviorState::Travel, "returning home");
        }
    }

    fn set_state(&mut self, next: BehaviorState, reason: &str) {
        if next != self.state {
            tracing::info!("Behavior: {:?} -> {:?} ({})", self.state, next, reason);
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::{MarkerBatch, MarkerDetection, MarkerFilter};

    fn snapshot_with_marker(
        filter: &mut MarkerFilter,
        id: u32,
        z: f32,
        now: Instant,
    ) -> SensorSnapshot {
        let fresh = filter.apply(&MarkerBatch {
            detections: vec![MarkerDetection {
                id,
                position: [0.0, 0.0, z],
                orientation: [0.0, 1.0, 0.0, 0.0],
            }],
        });
        SensorSnapshot {
            markers: filter.memory().clone(),
            fresh,
            ..SensorSnapshot::new(now)
        }
    }

    #[test]
    fn test_wait_until_target() {
        let mut behavior = BehaviorController::new(&DockConfig::default());
        let out = behavior.tick(&SensorSnapshot::new(Instant::now()));
        assert_eq!(out.state, BehaviorState::Wait);
        assert_eq!(out.velocity, Twist::STOP);

        assert!(behavior.assign_target(StationId(7)).is_err());
        behavior.assign_target(StationId(1)).unwrap();
        assert_eq!(behavior.state(), BehaviorState::Travel);
    }

    #[test]
    fn test_travel_turns_then_drives() {
        let mut behavior = BehaviorController::new(&DockConfig::default());
        behavior.assign_target(StationId(1)).unwrap();

        // Waypoint (2, 1) from origin facing +x: ~26.6° to the left
        let out = behavior.tick(&SensorSnapshot::new(Instant::now()));
        assert!(out.velocity.angular > 0.0);
        assert_eq!(out.velocity.linear, 0.0);

        let facing = SensorSnapshot {
            pose: Pose2D::new(0.0, 0.0, 0.5f32.atan()),
            ..SensorSnapshot::new(Instant::now())
        };
        let out = behavior.tick(&facing);
        assert!(out.velocity.linear > 0.0);
        assert_eq!(out.velocity.angular, 0.0);
    }

    #[test]
    fn test_marker_in_range_starts_approach() {
        let mut behavior = BehaviorController::new(&DockConfig::default());
        behavior.assign_target(StationId(1)).unwrap();
        let mut filter = MarkerFilter::new(0..18);

        // Beyond the approach threshold: keep traveling
        let out = behavior.tick(&snapshot_with_marker(&mut filter, 1, 2.0, Instant::now()));
        assert_eq!(out.state, BehaviorState::Travel);

        let out = behavior.tick(&snapshot_with_marker(&mut filter, 1, 1.2, Instant::now()));
        assert_eq!(out.state, BehaviorState::Approach);
        assert_eq!(out.tones, vec![Tone::MarkerAcquired]);
        assert!(behavior.marker_seen());
        assert_eq!(behavior.docking_state(), Some(DockState::Searching));
    }

    #[test]
    fn test_detour_leg_then_real_station() {
        let config = DockConfig::default();
        let mut behavior = BehaviorController::new(&config);
        behavior.assign_target(StationId(21)).unwrap();

        // Detour waypoint (1.2, 0.2) is within tolerance of straight ahead
        let t0 = Instant::now();
        let pose = Pose2D::new(0.0, 0.0, 0.2f32.atan2(1.2));
        let out = behavior.tick(&SensorSnapshot {
            pose,
            ..SensorSnapshot::new(t0)
        });
        assert!(out.velocity.linear > 0.0);
        assert_eq!(behavior.target(), Some(StationId(21)));

        let later = t0 + Duration::from_secs_f32(config.behavior.detour_leg_secs);
        behavior.tick(&SensorSnapshot {
            pose,
            ..SensorSnapshot::new(later)
        });
        assert_eq!(behavior.target(), Some(StationId(2)));
    }

    #[test]
    fn test_resume_policy() {
        let mut behavior = BehaviorController::new(&DockConfig::default());
        behavior.assign_target(StationId(1)).unwrap();
        let remembered = behavior.interrupt(BehaviorState::Bumped);
        assert_eq!(remembered, BehaviorState::Travel);
        assert_eq!(
            behavior.resume_after_interrupt(BehaviorState::Approach, false),
            BehaviorState::Travel
        );
        assert!(!behavior.marker_seen());

        let mut config = DockConfig::default();
        config.mission.resume_policy = ResumePolicy::Previous;
        let mut idle = BehaviorController::new(&config);
        idle.interrupt(BehaviorState::Bumped);
        assert_eq!(
            idle.resume_after_interrupt(BehaviorState::Wait, false),
            BehaviorState::Wait
        );
    }
}
