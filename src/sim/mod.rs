//! Bench simulator standing in for the robot transport layer.
//!
//! - Differential-drive kinematics with circular-obstacle bumper
//! - Marker detections inside the camera FOV with dropout and noise
//! - Obstacle-ahead signal through the same classifier as live data

mod noise;
mod world;

pub use noise::NoiseGenerator;
pub use world::SimWorld;
