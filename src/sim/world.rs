//! Kinematic bench world: a differential-drive robot, dispensers carrying
//! fiducial markers, and circular obstacles.
//!
//! The world is in map coordinates. Pose samples are published in the
//! estimator frame, which starts at the home origin.

use std::f32::consts::FRAC_PI_2;

use crate::config::{DockConfig, SimConfig, SimMarker};
use crate::control::MapTransform;
use crate::sensors::{
    BoundingBox, MarkerBatch, MarkerDetection, ObstacleClassifier, PoseSample,
};
use crate::types::{BumpEvent, ObstacleSignal, Pose2D, Twist};
use crate::utils::{angle_diff, normalize_angle};

use super::noise::NoiseGenerator;

/// Depth camera image width (pixels)
const IMAGE_WIDTH: f32 = 320.0;

/// Markers closer than this are not decodable
const MIN_DETECTION_DEPTH: f32 = 0.05;

/// Simulated robot and environment.
pub struct SimWorld {
    config: SimConfig,
    pose: Pose2D,
    frame: MapTransform,
    classifier: ObstacleClassifier,
    noise: NoiseGenerator,
    in_contact: bool,
}

impl SimWorld {
    pub fn new(config: &DockConfig) -> Self {
        let [x, y, theta] = config.sim.start;
        Self {
            config: config.sim.clone(),
            pose: Pose2D::new(x, y, normalize_angle(theta)),
            frame: MapTransform::new(config.home_origin()),
            classifier: ObstacleClassifier::new(config.obstacle.clone()),
            noise: NoiseGenerator::new(config.sim.random_seed),
            in_contact: false,
        }
    }

    /// True pose, map frame.
    pub fn pose(&self) -> Pose2D {
        self.pose
    }

    pub fn set_pose(&mut self, pose: Pose2D) {
        self.pose = pose;
    }

    /// Integrate one step. Returns a press event when contact begins.
    pub fn step(&mut self, cmd: Twist, dt: f32) -> Option<BumpEvent> {
        let dt = dt * self.config.speed_factor;
        let Pose2D { x, y, theta } = self.pose;

        let (new_x, new_y, new_theta) = if cmd.angular.abs() < 1e-6 {
            (
                x + cmd.linear * theta.cos() * dt,
                y + cmd.linear * theta.sin() * dt,
                theta,
            )
        } else {
            // Arc motion
            let r = cmd.linear / cmd.angular;
            let new_theta = theta + cmd.angular * dt;
            (
                x + r * (new_theta.sin() - theta.sin()),
                y + r * (theta.cos() - new_theta.cos()),
                new_theta,
            )
        };

        let collides = self.collides(new_x, new_y);
        if collides {
            // Blocked: rotation only
            self.pose.theta = normalize_angle(new_theta);
        } else {
            self.pose = Pose2D::new(new_x, new_y, normalize_angle(new_theta));
        }

        let edge = collides && !self.in_contact;
        self.in_contact = collides;
        if edge {
            tracing::debug!(
                "Sim: bumper pressed at ({:.2}, {:.2})",
                self.pose.x,
                self.pose.y
            );
            Some(BumpEvent { pressed: true })
        } else {
            None
        }
    }

    fn collides(&self, x: f32, y: f32) -> bool {
        let radius = self.config.robot_radius;
        self.config.obstacles.iter().any(|&[ox, oy, r]| {
            let dist = ((x - ox).powi(2) + (y - oy).powi(2)).sqrt();
            dist < r + radius
        })
    }

    /// Pose estimate in the estimator frame.
    pub fn pose_sample(&self) -> PoseSample {
        let local = self.frame.to_local(self.pose);
        PoseSample::planar(local.x, local.y, local.theta)
    }

    /// One camera frame worth of marker detections.
    pub fn detect_markers(&mut self) -> MarkerBatch {
        let markers = self.config.markers.clone();
        let detections = markers
            .iter()
            .filter_map(|m| self.detect(m))
            .collect();
        MarkerBatch { detections }
    }

    fn detect(&mut self, marker: &SimMarker) -> Option<MarkerDetection> {
        let (forward, left) = self.robot_frame(marker.x, marker.y);
        if forward <= MIN_DETECTION_DEPTH {
            return None;
        }
        if forward.hypot(left) > self.config.camera_range {
            return None;
        }
        if left.atan2(forward).abs() > self.config.camera_half_fov {
            return None;
        }

        // Printed face must be turned toward the camera
        let to_robot = (self.pose.y - marker.y).atan2(self.pose.x - marker.x);
        if angle_diff(to_robot, marker.normal).abs() > self.config.max_view_angle {
            return None;
        }

        if self.noise.chance(self.config.dropout_probability) {
            return None;
        }

        let sigma = self.config.marker_noise;
        let x = -left + self.noise.gaussian(sigma);
        let z = forward + self.noise.gaussian(sigma);
        // Camera yaw of the marker's normal, ±π when facing head-on
        let yaw = normalize_angle(self.pose.theta - marker.normal);
        let half = yaw / 2.0;

        Some(MarkerDetection {
            id: marker.id,
            position: [x, 0.0, z],
            orientation: [0.0, half.sin(), 0.0, half.cos()],
        })
    }

    /// Obstacle-ahead signal from the largest obstacle blob in view.
    pub fn obstacle_signal(&self) -> ObstacleSignal {
        let reading = self.classifier.classify(self.largest_obstacle());
        if reading.noted && !reading.signal.present {
            tracing::debug!("Sim: small obstacle in view");
        }
        reading.signal
    }

    fn largest_obstacle(&self) -> Option<BoundingBox> {
        let half_fov = self.config.camera_half_fov;
        self.config
            .obstacles
            .iter()
            .filter_map(|&[ox, oy, r]| {
                let (forward, left) = self.robot_frame(ox, oy);
                let center_dist = forward.hypot(left);
                if forward <= 0.0 || center_dist - r > self.config.obstacle_range {
                    return None;
                }

                let half_width = (r / center_dist.max(r)).asin().min(FRAC_PI_2);
                let bearing = left.atan2(forward);
                if bearing.abs() - half_width > half_fov {
                    return None;
                }

                let px_per_rad = IMAGE_WIDTH / (2.0 * half_fov);
                let width = (2.0 * half_width * px_per_rad).min(IMAGE_WIDTH);
                // Left of the optical axis maps to low columns
                let center = IMAGE_WIDTH / 2.0 - bearing * px_per_rad;
                let left_edge = (center - width / 2.0).clamp(0.0, IMAGE_WIDTH);
                Some(BoundingBox {
                    x: left_edge,
                    y: 0.0,
                    width,
                    height: width * 0.75,
                })
            })
            .max_by(|a, b| a.area().total_cmp(&b.area()))
    }

    /// (forward, left) of a map point relative to the robot.
    fn robot_frame(&self, x: f32, y: f32) -> (f32, f32) {
        let dx = x - self.pose.x;
        let dy = y - self.pose.y;
        let (s, c) = self.pose.theta.sin_cos();
        (c * dx + s * dy, -s * dx + c * dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::PI;

    fn quiet_config() -> DockConfig {
        let mut config = DockConfig::default();
        config.sim.dropout_probability = 0.0;
        config.sim.marker_noise = 0.0;
        config
    }

    #[test]
    fn test_straight_and_arc_motion() {
        let mut world = SimWorld::new(&quiet_config());
        world.step(Twist::forward(0.2), 1.0);
        assert_abs_diff_eq!(world.pose().x, 0.2, epsilon = 1e-5);

        world.set_pose(Pose2D::ORIGIN);
        for _ in 0..50 {
            world.step(Twist::rotate(PI / 2.0), 0.02);
        }
        assert_abs_diff_eq!(world.pose().theta, PI / 2.0, epsilon = 1e-4);
        assert_abs_diff_eq!(world.pose().x, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_head_on_marker_detection() {
        let mut world = SimWorld::new(&quiet_config());
        world.set_pose(Pose2D::new(2.0, 1.0, 0.0));
        let batch = world.detect_markers();
        assert_eq!(batch.detections.len(), 1);

        let obs = batch.detections[0].observation();
        assert_eq!(obs.id, 1);
        assert_abs_diff_eq!(obs.x, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(obs.z, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(obs.normal_deviation(), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_marker_behind_or_edge_on_is_hidden() {
        let mut world = SimWorld::new(&quiet_config());
        world.set_pose(Pose2D::new(2.0, 1.0, PI));
        assert!(world.detect_markers().detections.is_empty());

        // Behind the dispenser, looking at its back
        world.set_pose(Pose2D::new(3.5, 1.0, PI));
        assert!(world.detect_markers().detections.is_empty());
    }

    #[test]
    fn test_off_normal_deviation_sign() {
        let mut world = SimWorld::new(&quiet_config());
        // Left of marker 1's normal, facing it
        let theta = (-0.5f32).atan2(1.0);
        world.set_pose(Pose2D::new(2.0, 1.5, theta));
        let batch = world.detect_markers();
        let obs = batch.detections[0].observation();
        // Normal swings to the robot's right
        assert!(obs.normal_deviation() < 0.0);
    }

    #[test]
    fn test_bump_edge_once() {
        let mut world = SimWorld::new(&quiet_config());
        // Pillar at (1.5, 2.0), r = 0.25: stop just short, facing it
        world.set_pose(Pose2D::new(1.5, 1.57, PI / 2.0));
        assert_eq!(
            world.step(Twist::forward(0.2), 0.1),
            Some(BumpEvent { pressed: true })
        );
        assert_eq!(world.step(Twist::forward(0.2), 0.1), None);
        assert_abs_diff_eq!(world.pose().y, 1.57, epsilon = 1e-5);
    }

    #[test]
    fn test_obstacle_signal_side() {
        let world_at = |pose| {
            let mut world = SimWorld::new(&quiet_config());
            world.set_pose(pose);
            world.obstacle_signal()
        };

        let ahead = world_at(Pose2D::new(1.5, 1.4, PI / 2.0));
        assert!(ahead.present);

        // Obstacle off to the robot's left
        let left = world_at(Pose2D::new(1.8, 1.45, PI / 2.0 + 0.2));
        assert!(left.present);
        assert_eq!(left.side, Side::Left);

        let clear = world_at(Pose2D::ORIGIN);
        assert!(!clear.present);
    }
}
