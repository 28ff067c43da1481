//! Bump and obstacle interrupts.
//!
//! Wraps the behavior controller and preempts it. A bumper press wins over
//! everything, including an avoidance already in progress. Obstacles must be
//! reported for several consecutive ticks, and are ignored while the robot is
//! very close to its target marker (the dispenser itself looks like one).

use std::time::{Duration, Instant};

use crate::config::{DockConfig, InterruptConfig};
use crate::error::Result;
use crate::sensors::SensorSnapshot;
use crate::types::{Side, StationId, Tone, Twist};

use super::behavior::{BehaviorController, BehaviorState, ControlOutput};
use super::docking::DockState;

/// Recovery maneuver in progress.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Recovery {
    /// Reverse until `until`
    Bump { until: Instant },
    /// Turn away until `turn_until`, then drive forward until `forward_until`
    Avoid {
        angular: f32,
        turn_until: Instant,
        forward_until: Instant,
    },
}

/// Interrupt layer on top of [`BehaviorController`].
pub struct InterruptHandler {
    config: InterruptConfig,
    behavior: BehaviorController,
    /// Consecutive ticks with an obstacle ahead
    obstacle_ticks: u32,
    /// State to resume once recovery completes; never an interrupt state
    remembered: Option<BehaviorState>,
    recovery: Option<Recovery>,
}

impl InterruptHandler {
    pub fn new(config: &DockConfig) -> Self {
        Self {
            config: config.interrupt.clone(),
            behavior: BehaviorController::new(config),
            obstacle_ticks: 0,
            remembered: None,
            recovery: None,
        }
    }

    pub fn state(&self) -> BehaviorState {
        self.behavior.state()
    }

    pub fn docking_state(&self) -> Option<DockState> {
        self.behavior.docking_state()
    }

    pub fn behavior(&self) -> &BehaviorController {
        &self.behavior
    }

    pub fn assign_target(&mut self, id: StationId) -> Result<()> {
        self.recovery = None;
        self.remembered = None;
        self.obstacle_ticks = 0;
        self.behavior.assign_target(id)
    }

    /// Advance one control tick.
    pub fn tick(&mut self, snap: &SensorSnapshot) -> ControlOutput {
        let now = snap.stamp;
        let state = self.behavior.state();
        let very_close = self.behavior.very_close(snap);

        if snap.bumped {
            return self.begin_bump(very_close, now);
        }

        if snap.obstacle.present && !very_close && state.is_interruptible() {
            self.obstacle_ticks += 1;
        } else {
            self.obstacle_ticks = 0;
        }

        if self.obstacle_ticks >= self.config.obstacle_debounce_ticks {
            self.obstacle_ticks = 0;
            return self.begin_avoid(snap.obstacle.side, now);
        }

        match self.recovery {
            Some(recovery) => self.recover(recovery, very_close, now),
            None => self.behavior.tick(snap),
        }
    }

    fn begin_bump(&mut self, very_close: bool, now: Instant) -> ControlOutput {
        let remembered = self.remember(BehaviorState::Bumped);
        let secs = if very_close {
            self.config.bump_recovery_close_secs
        } else {
            self.config.bump_recovery_secs
        };
        tracing::warn!(
            "Bump detected, reversing for {:.1}s (resume from {:?})",
            secs,
            remembered
        );
        self.obstacle_ticks = 0;
        self.recovery = Some(Recovery::Bump {
            until: now + Duration::from_secs_f32(secs),
        });
        self.output(Twist::forward(-self.config.bump_reverse_speed), vec![Tone::Bump])
    }

    fn begin_avoid(&mut self, side: Side, now: Instant) -> ControlOutput {
        let remembered = self.remember(BehaviorState::AvoidObstacle);
        // Turn away from the side the obstacle was reported on
        let angular = match side {
            Side::Left => -self.config.obstacle_turn_vel,
            Side::Right => self.config.obstacle_turn_vel,
        };
        tracing::warn!(
            "Obstacle on {:?}, avoiding (resume from {:?})",
            side,
            remembered
        );
        let turn_until = now + Duration::from_secs_f32(self.config.obstacle_turn_secs);
        self.recovery = Some(Recovery::Avoid {
            angular,
            turn_until,
            forward_until: turn_until + Duration::from_secs_f32(self.config.obstacle_forward_secs),
        });
        self.output(Twist::rotate(angular), vec![Tone::Obstacle])
    }

    /// Enter `kind`, keeping the first non-interrupt state as the resume point.
    fn remember(&mut self, kind: BehaviorState) -> BehaviorState {
        let previous = self.behavior.interrupt(kind);
        *self.remembered.get_or_insert(previous)
    }

    fn recover(&mut self, recovery: Recovery, very_close: bool, now: Instant) -> ControlOutput {
        let velocity = match recovery {
            Recovery::Bump { until } if now < until => {
                Some(Twist::forward(-self.config.bump_reverse_speed))
            }
            Recovery::Avoid {
                angular,
                turn_until,
                ..
            } if now < turn_until => Some(Twist::rotate(angular)),
            Recovery::Avoid { forward_until, .. } if now < forward_until => {
                Some(Twist::forward(self.config.obstacle_forward_vel))
            }
            _ => None,
        };

        if let Some(velocity) = velocity {
            return self.output(velocity, Vec::new());
        }

        self.recovery = None;
        let remembered = self.remembered.take().unwrap_or(BehaviorState::Travel);
        self.behavior.resume_after_interrupt(remembered, very_close);
        self.output(Twist::STOP, Vec::new())
    }

    fn output(&self, velocity: Twist, tones: Vec<Tone>) -> ControlOutput {
        ControlOutput {
            velocity,
            tones,
            ..ControlOutput::idle(self.behavior.state())
        }
    }
}
