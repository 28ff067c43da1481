//! Core value types shared by the sensor and control layers.

use std::fmt;

use serde::Deserialize;

use crate::utils::normalize_angle;

/// Planar robot pose. Orientation is CCW positive, radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose2D {
    pub x: f32,
    pub y: f32,
    pub theta: f32,
}

impl Pose2D {
    pub const ORIGIN: Pose2D = Pose2D {
        x: 0.0,
        y: 0.0,
        theta: 0.0,
    };

    pub fn new(x: f32, y: f32, theta: f32) -> Self {
        Self { x, y, theta }
    }

    /// Compose `self ⊕ other`: apply `other` expressed in the frame of `self`.
    pub fn compose(&self, other: &Pose2D) -> Pose2D {
        let (s, c) = self.theta.sin_cos();
        Pose2D::new(
            self.x + c * other.x - s * other.y,
            self.y + s * other.x + c * other.y,
            normalize_angle(self.theta + other.theta),
        )
    }

    /// Inverse transform, such that `p.compose(&p.inverse())` is the origin.
    pub fn inverse(&self) -> Pose2D {
        let (s, c) = self.theta.sin_cos();
        Pose2D::new(
            -c * self.x - s * self.y,
            s * self.x - c * self.y,
            normalize_angle(-self.theta),
        )
    }

    /// Euclidean distance between the positions of two poses.
    pub fn distance(&self, other: &Pose2D) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Bearing from this pose's position to a point, in the world frame.
    pub fn bearing_to(&self, x: f32, y: f32) -> f32 {
        (y - self.y).atan2(x - self.x)
    }
}

/// Linear/angular velocity command for the motion sink.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Twist {
    /// Linear velocity (m/s), forward positive
    pub linear: f32,
    /// Angular velocity (rad/s), CCW positive
    pub angular: f32,
}

impl Twist {
    pub const STOP: Twist = Twist {
        linear: 0.0,
        angular: 0.0,
    };

    pub fn new(linear: f32, angular: f32) -> Self {
        Self { linear, angular }
    }

    pub fn forward(linear: f32) -> Self {
        Self::new(linear, 0.0)
    }

    pub fn rotate(angular: f32) -> Self {
        Self::new(0.0, angular)
    }

    pub fn is_stop(&self) -> bool {
        self.linear == 0.0 && self.angular == 0.0
    }
}

/// Station identifier.
///
/// Ids above 10 are detour-encoded waypoints: `real_id * 10 + 1` routes around
/// a known fixed obstacle before heading for `real_id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct StationId(pub u32);

impl StationId {
    pub fn is_detour(self) -> bool {
        self.0 > 10
    }

    /// Real station behind a detour waypoint; identity for real ids.
    pub fn decode(self) -> StationId {
        if self.is_detour() {
            StationId(self.0 / 10)
        } else {
            self
        }
    }

    pub fn detour_of(real: StationId) -> StationId {
        StationId(real.0 * 10 + 1)
    }

    /// Marker id carried by the station's dispenser.
    pub fn marker_id(self) -> u32 {
        self.decode().0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Relative pose of a detected fiducial marker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerObservation {
    pub id: u32,
    /// Lateral offset (m), right of the forward axis positive
    pub x: f32,
    /// Depth along the forward axis (m)
    pub z: f32,
    /// Marker yaw about the camera vertical axis; ±π when facing the robot
    pub bearing: f32,
}

impl MarkerObservation {
    pub fn range(&self) -> f32 {
        (self.x * self.x + self.z * self.z).sqrt()
    }

    /// Signed deviation of the marker normal from the line back to the robot.
    ///
    /// Zero when the robot sits on the marker's normal. Positive when the
    /// normal swings to the robot's left.
    pub fn normal_deviation(&self) -> f32 {
        let line_to_robot = (-self.x).atan2(-self.z);
        normalize_angle(self.bearing - line_to_robot)
    }
}

/// Side on which an obstacle was reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Large-obstacle-ahead signal from the image pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObstacleSignal {
    pub present: bool,
    pub side: Side,
}

impl ObstacleSignal {
    pub const CLEAR: ObstacleSignal = ObstacleSignal {
        present: false,
        side: Side::Left,
    };
}

impl Default for ObstacleSignal {
    fn default() -> Self {
        Self::CLEAR
    }
}

/// Bumper event; only `pressed` edges preempt the mission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BumpEvent {
    pub pressed: bool,
}

/// Discrete audible feedback events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    Bump,
    Obstacle,
    MarkerAcquired,
    Docked,
    DockFailed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_compose_inverse_is_identity() {
        let p = Pose2D::new(1.5, -0.4, 0.7);
        let id = p.compose(&p.inverse());
        assert_abs_diff_eq!(id.x, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(id.y, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(id.theta, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_compose_rotates_offset() {
        let p = Pose2D::new(1.0, 0.0, FRAC_PI_2);
        let q = p.compose(&Pose2D::new(1.0, 0.0, 0.0));
        assert_abs_diff_eq!(q.x, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(q.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_detour_encoding() {
        let detour = StationId::detour_of(StationId(3));
        assert_eq!(detour, StationId(31));
        assert!(detour.is_detour());
        assert_eq!(detour.decode(), StationId(3));
        assert!(!StationId(7).is_detour());
        assert_eq!(StationId(7).decode(), StationId(7));
        assert_eq!(detour.marker_id(), 3);
    }

    #[test]
    fn test_normal_deviation_head_on() {
        let obs = MarkerObservation {
            id: 1,
            x: 0.0,
            z: 1.0,
            bearing: PI,
        };
        assert_abs_diff_eq!(obs.normal_deviation(), 0.0, epsilon = 1e-5);

        let tilted = MarkerObservation {
            bearing: PI - 0.3,
            ..obs
        };
        assert_abs_diff_eq!(tilted.normal_deviation(), -0.3, epsilon = 1e-5);
    }
}
