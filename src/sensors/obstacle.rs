//! Obstacle classification from the largest contour's bounding box.
//!
//! Contour extraction happens upstream in the image pipeline; this only turns
//! its bounding box into the avoid/ignore decision and a side.

use crate::config::ObstacleConfig;
use crate::types::{ObstacleSignal, Side};

/// Axis-aligned bounding box in image pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// Classification of one depth frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObstacleReading {
    pub signal: ObstacleSignal,
    /// Large enough to be worth recording, but not to avoid
    pub noted: bool,
}

/// Bounding box → [`ObstacleSignal`].
#[derive(Clone, Debug)]
pub struct ObstacleClassifier {
    config: ObstacleConfig,
}

impl ObstacleClassifier {
    pub fn new(config: ObstacleConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, largest: Option<BoundingBox>) -> ObstacleReading {
        let Some(bbox) = largest else {
            return ObstacleReading {
                signal: ObstacleSignal::CLEAR,
                noted: false,
            };
        };

        let area = bbox.area();
        let side = if bbox.x < self.config.split_column {
            Side::Left
        } else {
            Side::Right
        };

        ObstacleReading {
            signal: ObstacleSignal {
                present: area > self.config.avoid_area,
                side,
            },
            noted: area > self.config.note_area,
        }
    }
}
