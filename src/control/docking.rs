//! Precision docking state machine.
//!
//! Aligns with a fiducial marker, repositions onto the marker's normal by
//! triangulation, drives in to the contact distance, dwells, and backs out.
//! Transient marker loss is handled by an oscillating search bounded by the
//! lost timeout, which is the only failure exit.
//!
//! ```text
//! SEARCHING ─► ZERO_X ─► TURN_ALPHA ─► MOVE_ALPHA ─► MOVE_PERF ─► SLEEPING ─► BACK_OUT ─► DONE_PARKING
//!                ▲  │         └──────(skip)───────────►  │  ▲        (home) ──────────────────►
//!                │  └──────────(correction)─────────────►┘  │
//!                └────────────── SEARCHING_LOST ◄─── (marker lost) ── timeout ─► failure
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::DockingConfig;
use crate::geometry::{ApproachPlan, triangulate};
use crate::sensors::SensorSnapshot;
use crate::types::{MarkerObservation, Pose2D, Twist};
use crate::utils::angle_diff;

/// State of the docking sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DockState {
    /// Waiting for the target marker to be recorded
    Searching,
    /// Rotating to null the marker's lateral offset
    ZeroX,
    /// Rotating away from the marker by the triangulated angle
    TurnAlpha,
    /// Driving the triangulated repositioning distance
    MoveAlpha,
    /// Final straight approach
    MovePerf,
    /// Dwelling at the dispenser
    Sleeping,
    /// Reversing away from the dispenser
    BackOut,
    /// Docking finished
    DoneParking,
    /// Oscillating to rediscover a lost marker
    SearchingLost,
}

impl DockState {
    /// The robot is at (or leaving) the dispenser.
    pub fn is_contact_phase(self) -> bool {
        matches!(
            self,
            DockState::Sleeping | DockState::BackOut | DockState::DoneParking
        )
    }
}

/// Outcome reported to the behavior controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DockStatus {
    InProgress,
    Docked,
    /// Marker stayed lost past the lost timeout
    Failed,
}

/// Marker being docked with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DockTarget {
    pub marker_id: u32,
    /// Docking at home finishes on contact without dwell or back-out
    pub is_home: bool,
    /// Known contact pose used to re-anchor the pose estimate
    pub dock_pose: Option<Pose2D>,
}

/// Result of one docking tick.
#[derive(Clone, Debug, PartialEq)]
pub struct DockingStep {
    pub state: DockState,
    pub status: DockStatus,
    pub velocity: Twist,
    /// Pose the estimator should be re-anchored to this tick
    pub reanchor: Option<Pose2D>,
}

/// Recent marker freshness, one entry per tick.
#[derive(Clone, Debug)]
struct FreshnessHistory {
    window: VecDeque<bool>,
    capacity: usize,
    last_fresh_at: Option<Instant>,
}

impl FreshnessHistory {
    fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            last_fresh_at: None,
        }
    }

    fn record(&mut self, fresh: bool, now: Instant) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(fresh);
        if fresh {
            self.last_fresh_at = Some(now);
        }
    }

    /// Trailing run of fresh ticks.
    fn fresh_run(&self) -> usize {
        self.window.iter().rev().take_while(|f| **f).count()
    }

    fn fresh_count(&self) -> usize {
        self.window.iter().filter(|f| **f).count()
    }

    fn clear(&mut self) {
        self.window.clear();
        self.last_fresh_at = None;
    }
}

/// Docking controller.
pub struct DockingController {
    config: DockingConfig,
    state: DockState,
    status: DockStatus,
    target: Option<DockTarget>,
    freshness: FreshnessHistory,
    /// Last fresh observation of the target
    last_observation: Option<MarkerObservation>,
    /// Signed deviation of the marker normal from the line of sight
    beta: f32,
    /// ZERO_X was entered to correct alignment on the final approach
    correction: bool,
    /// Rotation direction in ZERO_X while the marker is out of view
    reacquire_direction: Option<f32>,
    plan: Option<ApproachPlan>,
    /// +1 rotates CCW away from the marker, -1 CW
    turn_sign: f32,
    state_entered_at: Instant,
    /// Consecutive stale ticks in the current state
    stale_ticks: u32,
    entry_pose: Option<Pose2D>,
    lost_since: Option<Instant>,
}

impl DockingController {
    pub fn new(config: DockingConfig) -> Self {
        let window = config.freshness_window;
        Self {
            config,
            state: DockState::Searching,
            status: DockStatus::InProgress,
            target: None,
            freshness: FreshnessHistory::new(window),
            last_observation: None,
            beta: 0.0,
            correction: false,
            reacquire_direction: None,
            plan: None,
            turn_sign: 1.0,
            state_entered_at: Instant::now(),
            stale_ticks: 0,
            entry_pose: None,
            lost_since: None,
        }
    }

    /// Begin docking with `target`.
    pub fn start(&mut self, target: DockTarget, now: Instant) {
        tracing::info!(
            "Docking started: marker={}, home={}",
            target.marker_id,
            target.is_home
        );
        self.target = Some(target);
        self.state = DockState::Searching;
        self.status = DockStatus::InProgress;
        self.freshness.clear();
        self.last_observation = None;
        self.beta = 0.0;
        self.correction = false;
        self.reacquire_direction = None;
        self.plan = None;
        self.turn_sign = 1.0;
        self.state_entered_at = now;
        self.stale_ticks = 0;
        self.entry_pose = None;
        self.lost_since = None;
    }

    /// Abandon the current docking context.
    pub fn reset(&mut self) {
        self.target = None;
        self.state = DockState::Searching;
        self.status = DockStatus::InProgress;
        self.freshness.clear();
        self.last_observation = None;
        self.lost_since = None;
    }

    pub fn state(&self) -> DockState {
        self.state
    }

    pub fn status(&self) -> DockStatus {
        self.status
    }

    pub fn target(&self) -> Option<DockTarget> {
        self.target
    }

    pub fn plan(&self) -> Option<ApproachPlan> {
        self.plan
    }

    /// Advance one control tick.
    pub fn update(&mut self, snap: &SensorSnapshot) -> DockingStep {
        let now = snap.stamp;
        let Some(target) = self.target else {
            return self.step(Twist::STOP, None);
        };

        if self.status != DockStatus::InProgress {
            return self.step(Twist::STOP, None);
        }

        let fresh = snap.fresh_observation(target.marker_id).copied();
        self.freshness.record(fresh.is_some(), now);
        if fresh.is_some() {
            self.last_observation = fresh;
            self.stale_ticks = 0;
        } else {
            self.stale_ticks += 1;
        }

        match self.state {
            DockState::Searching => self.searching(snap, target),
            DockState::ZeroX => self.zero_x(fresh, now),
            DockState::TurnAlpha => self.turn_alpha(snap.pose, now),
            DockState::MoveAlpha => self.move_alpha(fresh, snap.pose, now),
            DockState::MovePerf => self.move_perf(fresh, target, now),
            DockState::Sleeping => self.sleeping(target, now),
            DockState::BackOut => self.back_out(fresh, now),
            DockState::DoneParking => self.step(Twist::STOP, None),
            DockState::SearchingLost => self.searching_lost(fresh, now),
        }
    }

    fn searching(&mut self, snap: &SensorSnapshot, target: DockTarget) -> DockingStep {
        let now = snap.stamp;
        // The approach trigger usually saw the marker a tick ago
        let observation = self
            .last_observation
            .or_else(|| snap.markers.observation(target.marker_id).copied());

        if let Some(obs) = observation {
            self.last_observation = Some(obs);
            self.beta = obs.normal_deviation();
            tracing::debug!(
                "Marker {} recorded: depth={:.2}m, x={:.3}m, beta={:.1}°",
                obs.id,
                obs.z,
                obs.x,
                self.beta.to_degrees()
            );
            self.transition(DockState::ZeroX, now, "marker recorded");
            return self.step(Twist::STOP, None);
        }

        if self.stale_ticks > self.config.lost_confirm_ticks {
            self.enter_searching_lost(now, false);
        }
        self.step(Twist::STOP, None)
    }

    fn zero_x(&mut self, fresh: Option<MarkerObservation>, now: Instant) -> DockingStep {
        let Some(obs) = fresh else {
            let repositioning = self.reacquire_direction.is_some();
            let limit = if repositioning {
                self.config.move_alpha_lost_ticks
            } else {
                self.config.lost_confirm_ticks
            };
            if self.stale_ticks > limit {
                self.enter_searching_lost(now, repositioning);
                return self.step(Twist::STOP, None);
            }
            let velocity = match self.reacquire_direction {
                Some(dir) => Twist::rotate(dir * self.config.search_angular_vel),
                None => Twist::STOP,
            };
            return self.step(velocity, None);
        };

        if obs.x.abs() > self.config.lateral_tolerance {
            // Positive x is right of the forward axis: turn clockwise
            let angular = -obs.x.signum() * self.config.lateral_law.speed(obs.x);
            tracing::debug!("zero_x: x={:.3}m, angular={:.3}", obs.x, angular);
            return self.step(Twist::rotate(angular), None);
        }

        self.reacquire_direction = None;

        if self.correction {
            self.correction = false;
            self.transition(DockState::MovePerf, now, "realigned");
            return self.step(Twist::STOP, None);
        }

        self.beta = obs.normal_deviation();
        self.turn_sign = if self.beta >= 0.0 { 1.0 } else { -1.0 };
        self.plan = triangulate(obs.z, self.config.standoff_distance, self.beta);
        match self.plan {
            Some(plan) => tracing::info!(
                "Triangulated: depth={:.2}m, beta={:.1}°, alpha={:.1}°, distance={:.2}m",
                obs.z,
                self.beta.to_degrees(),
                plan.alpha.to_degrees(),
                plan.distance
            ),
            None => tracing::info!(
                "Triangulation degenerate: depth={:.2}m <= standoff={:.2}m",
                obs.z,
                self.config.standoff_distance
            ),
        }
        self.transition(DockState::TurnAlpha, now, "aligned");
        self.step(Twist::STOP, None)
    }

    fn turn_alpha(&mut self, pose: Pose2D, now: Instant) -> DockingStep {
        let entry = match self.entry_pose {
            Some(p) => p,
            None => {
                let depth = self.last_observation.map(|o| o.z).unwrap_or(f32::INFINITY);
                if depth <= self.config.skip_distance() {
                    self.transition(DockState::MovePerf, now, "already close");
                    return self.step(Twist::STOP, None);
                }
                let usable = self
                    .plan
                    .filter(|p| p.alpha > self.config.angular_close && p.distance.is_finite());
                if usable.is_none() {
                    self.transition(DockState::MovePerf, now, "no repositioning needed");
                    return self.step(Twist::STOP, None);
                }
                self.entry_pose = Some(pose);
                pose
            }
        };

        let Some(plan) = self.plan else {
            self.transition(DockState::MovePerf, now, "no plan");
            return self.step(Twist::STOP, None);
        };

        let rotated = angle_diff(pose.theta, entry.theta).abs();
        let remaining = plan.alpha - rotated;
        if remaining <= self.config.angular_close {
            self.transition(DockState::MoveAlpha, now, "turned");
            return self.step(Twist::STOP, None);
        }

        let angular = self.turn_sign * self.config.rotation_law.speed(remaining);
        tracing::debug!(
            "turn_alpha: rotated={:.1}°, remaining={:.1}°, angular={:.3}",
            rotated.to_degrees(),
            remaining.to_degrees(),
            angular
        );
        self.step(Twist::rotate(angular), None)
    }

    fn move_alpha(
        &mut self,
        fresh: Option<MarkerObservation>,
        pose: Pose2D,
        now: Instant,
    ) -> DockingStep {
        let entry = *self.entry_pose.get_or_insert(pose);
        let Some(plan) = self.plan else {
            self.transition(DockState::MovePerf, now, "no plan");
            return self.step(Twist::STOP, None);
        };

        let traveled = pose.distance(&entry);
        let close = fresh.is_some_and(|o| o.z <= self.config.skip_distance());
        if close || traveled >= plan.distance - self.config.linear_close {
            return self.finish_reposition(fresh, now);
        }

        if self.stale_ticks > self.config.move_alpha_lost_ticks {
            self.enter_searching_lost(now, true);
            return self.step(Twist::STOP, None);
        }

        let depth = self
            .last_observation
            .map(|o| o.z)
            .unwrap_or(plan.distance);
        let linear = self.config.approach_speed(depth);
        tracing::debug!(
            "move_alpha: traveled={:.2}/{:.2}m, linear={:.3}",
            traveled,
            plan.distance,
            linear
        );
        self.step(Twist::forward(linear), None)
    }

    fn finish_reposition(&mut self, fresh: Option<MarkerObservation>, now: Instant) -> DockingStep {
        match fresh {
            Some(obs) if obs.x.abs() <= self.config.lateral_tolerance => {
                self.transition(DockState::MovePerf, now, "repositioned and aligned");
            }
            _ => {
                self.correction = true;
                self.reacquire_direction = Some(-self.turn_sign);
                self.transition(DockState::ZeroX, now, "repositioned, realigning");
            }
        }
        self.step(Twist::STOP, None)
    }

    fn move_perf(
        &mut self,
        fresh: Option<MarkerObservation>,
        target: DockTarget,
        now: Instant,
    ) -> DockingStep {
        let Some(obs) = fresh else {
            if self.stale_ticks > self.config.lost_confirm_ticks {
                self.enter_searching_lost(now, false);
            }
            return self.step(Twist::STOP, None);
        };

        let near = self.config.near_contact_distance;
        if obs.z <= near {
            if target.is_home {
                self.transition(DockState::DoneParking, now, "home contact");
                self.status = DockStatus::Docked;
            } else {
                self.transition(DockState::Sleeping, now, "contact");
            }
            return self.step(Twist::STOP, None);
        }

        if obs.z <= near * self.config.arrive_band_factor
            && obs.x.abs() > self.config.lateral_tolerance
        {
            self.correction = true;
            self.transition(DockState::ZeroX, now, "misaligned on arrival");
            return self.step(Twist::STOP, None);
        }

        let linear = self.config.approach_speed(obs.z);
        tracing::debug!("move_perf: depth={:.2}m, linear={:.3}", obs.z, linear);
        self.step(Twist::forward(linear), None)
    }

    fn sleeping(&mut self, target: DockTarget, now: Instant) -> DockingStep {
        let dwell = Duration::from_secs_f32(self.config.dwell_secs);
        if now.duration_since(self.state_entered_at) >= dwell {
            self.transition(DockState::BackOut, now, "dwell complete");
            // Still at the contact pose: correct drift before reversing
            return self.step(Twist::STOP, target.dock_pose);
        }
        self.step(Twist::STOP, None)
    }

    fn back_out(&mut self, fresh: Option<MarkerObservation>, now: Instant) -> DockingStep {
        let elapsed = now.duration_since(self.state_entered_at);
        let clear = fresh.is_some_and(|o| o.z >= self.config.backout_clear_distance);
        if clear || elapsed >= Duration::from_secs_f32(self.config.backout_max_secs) {
            self.transition(DockState::DoneParking, now, "backed out");
            self.status = DockStatus::Docked;
            return self.step(Twist::STOP, None);
        }

        self.step(Twist::forward(-self.config.backout_speed), None)
    }

    fn searching_lost(&mut self, fresh: Option<MarkerObservation>, now: Instant) -> DockingStep {
        let lost_since = *self.lost_since.get_or_insert(now);
        let reacquired = self.freshness.fresh_run() >= self.config.reacquire_ticks as usize
            && self.freshness.fresh_count() * 2 >= self.freshness.window.len();

        if reacquired {
            self.lost_since = None;
            tracing::info!(
                "Marker reacquired after {:.1}s",
                now.duration_since(lost_since).as_secs_f32()
            );
            self.transition(DockState::ZeroX, now, "marker reacquired");
            return self.step(Twist::STOP, None);
        }

        if now.duration_since(lost_since) > Duration::from_secs_f32(self.config.lost_timeout_secs) {
            tracing::warn!(
                "Marker lost for {:.1}s, docking failed",
                now.duration_since(lost_since).as_secs_f32()
            );
            self.status = DockStatus::Failed;
            return self.step(Twist::STOP, None);
        }

        if fresh.is_some() {
            return self.step(Twist::STOP, None);
        }

        let angular = self.search_velocity(now);
        self.step(Twist::rotate(angular), None)
    }

    /// Oscillation: + for the first half-period, - for the next, and so on.
    fn search_velocity(&self, now: Instant) -> f32 {
        let elapsed = now.duration_since(self.state_entered_at).as_secs_f32();
        let phase = (elapsed / self.config.search_half_period_secs).floor() as u64;
        if phase % 2 == 0 {
            self.config.search_angular_vel
        } else {
            -self.config.search_angular_vel
        }
    }

    /// `repositioning`: the marker was expected out of view while driving off
    /// the line of sight, so the lost timer starts at confirmation.
    fn enter_searching_lost(&mut self, now: Instant, repositioning: bool) {
        // Otherwise it runs from the last sighting, but not from before this state began
        let since = match self.freshness.last_fresh_at {
            _ if repositioning => now,
            Some(t) if t > self.state_entered_at => t,
            _ => self.state_entered_at,
        };
        self.lost_since = Some(since);
        self.transition(DockState::SearchingLost, now, "marker lost");
    }

    fn transition(&mut self, next: DockState, now: Instant, reason: &str) {
        tracing::info!("Docking: {:?} -> {:?} ({})", self.state, next, reason);
        self.state = next;
        self.state_entered_at = now;
        self.stale_ticks = 0;
        self.entry_pose = None;
    }

    fn step(&self, velocity: Twist, reanchor: Option<Pose2D>) -> DockingStep {
        DockingStep {
            state: self.state,
            status: self.status,
            velocity,
            reanchor,
        }
    }
}
