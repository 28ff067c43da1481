//! Sensor input layer.
//!
//! - Per-source channels and the per-tick snapshot aggregator
//! - Marker memory with explicit absent marking
//! - Bounding-box obstacle classification

mod aggregator;
mod markers;
mod obstacle;

pub use aggregator::{
    PoseSample, PoseTracker, PoseVariance, SensorAggregator, SensorChannels, SensorReceivers,
    SensorSnapshot, sensor_channels,
};
pub use markers::{MarkerBatch, MarkerDetection, MarkerEntry, MarkerFilter, MarkerMemory};
pub use obstacle::{BoundingBox, ObstacleClassifier, ObstacleReading};
