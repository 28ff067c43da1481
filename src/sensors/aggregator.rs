//! Sensor state aggregator.
//!
//! Each asynchronous source owns one bounded channel. Once per control tick
//! the aggregator drains every channel and produces a [`SensorSnapshot`]:
//! a consistent view in which a marker observation (lateral offset, depth,
//! bearing) always comes from a single detection batch.

use std::collections::BTreeSet;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};

use crate::config::DockConfig;
use crate::geometry::yaw_from_quaternion;
use crate::types::{BumpEvent, MarkerObservation, ObstacleSignal, Pose2D};

use super::markers::{MarkerBatch, MarkerFilter, MarkerMemory};

/// Pose estimate sample from the localization filter.
#[derive(Clone, Debug, PartialEq)]
pub struct PoseSample {
    pub x: f32,
    pub y: f32,
    /// Orientation quaternion [x, y, z, w]
    pub orientation: [f32; 4],
    /// Row-major 6×6 covariance (x, y, z, roll, pitch, yaw)
    pub covariance: [f32; 36],
}

impl PoseSample {
    /// Planar sample with zero covariance.
    pub fn planar(x: f32, y: f32, theta: f32) -> Self {
        let half = theta / 2.0;
        Self {
            x,
            y,
            orientation: [0.0, 0.0, half.sin(), half.cos()],
            covariance: [0.0; 36],
        }
    }

    pub fn pose(&self) -> Pose2D {
        Pose2D::new(self.x, self.y, yaw_from_quaternion(self.orientation))
    }

    pub fn variance(&self) -> PoseVariance {
        PoseVariance {
            x: self.covariance[0],
            y: self.covariance[7],
            yaw: self.covariance[35],
        }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.orientation.iter().all(|v| v.is_finite())
    }
}

/// Diagonal uncertainty terms of a pose sample.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PoseVariance {
    pub x: f32,
    pub y: f32,
    pub yaw: f32,
}

/// Producer side of the sensor channels, handed to the transport layer.
#[derive(Clone)]
pub struct SensorChannels {
    pub pose: Sender<PoseSample>,
    pub markers: Sender<MarkerBatch>,
    pub obstacle: Sender<ObstacleSignal>,
    pub bump: Sender<BumpEvent>,
}

/// Consumer side of the sensor channels, owned by the aggregator.
pub struct SensorReceivers {
    pub pose: Receiver<PoseSample>,
    pub markers: Receiver<MarkerBatch>,
    pub obstacle: Receiver<ObstacleSignal>,
    pub bump: Receiver<BumpEvent>,
}

/// Create one bounded channel per sensor source.
pub fn sensor_channels(capacity: usize) -> (SensorChannels, SensorReceivers) {
    let (pose_tx, pose_rx) = bounded(capacity);
    let (markers_tx, markers_rx) = bounded(capacity);
    let (obstacle_tx, obstacle_rx) = bounded(capacity);
    let (bump_tx, bump_rx) = bounded(capacity);
    (
        SensorChannels {
            pose: pose_tx,
            markers: markers_tx,
            obstacle: obstacle_tx,
            bump: bump_tx,
        },
        SensorReceivers {
            pose: pose_rx,
            markers: markers_rx,
            obstacle: obstacle_rx,
            bump: bump_rx,
        },
    )
}

/// Everything the control tick reads, captured at one instant.
#[derive(Clone, Debug)]
pub struct SensorSnapshot {
    /// Tick timestamp; all controller timeouts are measured against it
    pub stamp: Instant,
    pub pose: Pose2D,
    pub pose_variance: PoseVariance,
    pub markers: MarkerMemory,
    /// Ids present in a batch received during this tick
    pub fresh: BTreeSet<u32>,
    pub obstacle: ObstacleSignal,
    /// A bumper press arrived since the previous tick
    pub bumped: bool,
}

impl SensorSnapshot {
    pub fn new(stamp: Instant) -> Self {
        Self {
            stamp,
            pose: Pose2D::ORIGIN,
            pose_variance: PoseVariance::default(),
            markers: MarkerMemory::default(),
            fresh: BTreeSet::new(),
            obstacle: ObstacleSignal::CLEAR,
            bumped: false,
        }
    }

    pub fn is_fresh(&self, id: u32) -> bool {
        self.fresh.contains(&id)
    }

    /// Observation of `id` only if it was refreshed this tick.
    pub fn fresh_observation(&self, id: u32) -> Option<&MarkerObservation> {
        if self.is_fresh(id) {
            self.markers.observation(id)
        } else {
            None
        }
    }
}

/// Pose estimate with drift re-anchoring.
///
/// Reported pose = anchor ⊕ (raw_at_anchor⁻¹ ⊕ raw_now).
#[derive(Clone, Debug, Default)]
pub struct PoseTracker {
    raw: Pose2D,
    anchor: Option<(Pose2D, Pose2D)>,
}

impl PoseTracker {
    pub fn set_raw(&mut self, raw: Pose2D) {
        self.raw = raw;
    }

    pub fn pose(&self) -> Pose2D {
        match self.anchor {
            Some((corrected, raw_at_anchor)) => {
                corrected.compose(&raw_at_anchor.inverse().compose(&self.raw))
            }
            None => self.raw,
        }
    }

    /// Declare that the robot is at `pose` right now.
    pub fn reanchor(&mut self, pose: Pose2D) {
        self.anchor = Some((pose, self.raw));
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Disconnected {
    pose: bool,
    markers: bool,
    obstacle: bool,
    bump: bool,
}

/// Drains the sensor channels into per-tick snapshots.
pub struct SensorAggregator {
    receivers: SensorReceivers,
    filter: MarkerFilter,
    tracker: PoseTracker,
    variance: PoseVariance,
    obstacle: ObstacleSignal,
    pose_variance_warn: f32,
    disconnected: Disconnected,
}

impl SensorAggregator {
    pub fn new(config: &DockConfig, receivers: SensorReceivers) -> Self {
        Self {
            receivers,
            filter: MarkerFilter::new(config.markers.valid_id_start..config.markers.valid_id_end),
            tracker: PoseTracker::default(),
            variance: PoseVariance::default(),
            obstacle: ObstacleSignal::CLEAR,
            pose_variance_warn: config.control.pose_variance_warn,
            disconnected: Disconnected::default(),
        }
    }

    /// Drain all sources and build the snapshot for this tick.
    pub fn snapshot(&mut self, stamp: Instant) -> SensorSnapshot {
        self.drain_pose();
        let fresh = self.drain_markers();
        self.drain_obstacle();
        let bumped = self.drain_bump();

        SensorSnapshot {
            stamp,
            pose: self.tracker.pose(),
            pose_variance: self.variance,
            markers: self.filter.memory().clone(),
            fresh,
            obstacle: self.obstacle,
            bumped,
        }
    }

    /// Correct accumulated drift: the robot is at `pose` now.
    pub fn reanchor(&mut self, pose: Pose2D) {
        let before = self.tracker.pose();
        self.tracker.reanchor(pose);
        tracing::info!(
            "Pose re-anchored: ({:.2}, {:.2}, {:.1}°) -> ({:.2}, {:.2}, {:.1}°)",
            before.x,
            before.y,
            before.theta.to_degrees(),
            pose.x,
            pose.y,
            pose.theta.to_degrees()
        );
    }

    fn drain_pose(&mut self) {
        loop {
            match self.receivers.pose.try_recv() {
                Ok(sample) => {
                    if !sample.is_finite() {
                        tracing::warn!("Skipping non-finite pose sample");
                        continue;
                    }
                    self.tracker.set_raw(sample.pose());
                    self.variance = sample.variance();
                    if self.variance.x.max(self.variance.y) > self.pose_variance_warn {
                        tracing::warn!(
                            "Pose uncertainty high: var_x={:.3}, var_y={:.3}, var_yaw={:.3}",
                            self.variance.x,
                            self.variance.y,
                            self.variance.yaw
                        );
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected.pose {
                        tracing::warn!("Pose source disconnected, holding last pose");
                        self.disconnected.pose = true;
                    }
                    break;
                }
            }
        }
    }

    fn drain_markers(&mut self) -> BTreeSet<u32> {
        let mut fresh = BTreeSet::new();
        loop {
            match self.receivers.markers.try_recv() {
                // Later batches supersede earlier ones within a tick
                Ok(batch) => fresh = self.filter.apply(&batch),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected.markers {
                        tracing::warn!("Marker source disconnected");
                        self.disconnected.markers = true;
                    }
                    break;
                }
            }
        }
        fresh
    }

    fn drain_obstacle(&mut self) {
        loop {
            match self.receivers.obstacle.try_recv() {
                Ok(signal) => self.obstacle = signal,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected.obstacle {
                        tracing::warn!("Obstacle source disconnected, clearing signal");
                        self.disconnected.obstacle = true;
                        self.obstacle = ObstacleSignal::CLEAR;
                    }
                    break;
                }
            }
        }
    }

    fn drain_bump(&mut self) -> bool {
        let mut pressed = false;
        loop {
            match self.receivers.bump.try_recv() {
                Ok(event) => pressed |= event.pressed,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected.bump {
                        tracing::warn!("Bump source disconnected");
                        self.disconnected.bump = true;
                    }
                    break;
                }
            }
        }
        pressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::markers::{MarkerDetection, MarkerEntry};
    use crate::types::Side;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::FRAC_PI_2;

    fn detection(id: u32, x: f32, z: f32) -> MarkerDetection {
        MarkerDetection {
            id,
            position: [x, 0.0, z],
            orientation: [0.0, 1.0, 0.0, 0.0],
        }
    }

    fn setup() -> (SensorChannels, SensorAggregator) {
        let config = DockConfig::default();
        let (tx, rx) = sensor_channels(8);
        (tx, SensorAggregator::new(&config, rx))
    }

    #[test]
    fn test_latest_pose_wins() {
        let (tx, mut agg) = setup();
        tx.pose.send(PoseSample::planar(1.0, 0.0, 0.0)).unwrap();
        tx.pose.send(PoseSample::planar(2.0, 1.0, FRAC_PI_2)).unwrap();

        let snap = agg.snapshot(Instant::now());
        assert_abs_diff_eq!(snap.pose.x, 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(snap.pose.y, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(snap.pose.theta, FRAC_PI_2, epsilon = 1e-5);
    }

    #[test]
    fn test_marker_freshness_per_tick() {
        let (tx, mut agg) = setup();
        tx.markers
            .send(MarkerBatch {
                detections: vec![detection(1, 0.1, 1.0)],
            })
            .unwrap();

        let first = agg.snapshot(Instant::now());
        assert!(first.is_fresh(1));
        assert!(first.fresh_observation(1).is_some());

        // No batch this tick: still present in memory, but stale
        let second = agg.snapshot(Instant::now());
        assert!(!second.is_fresh(1));
        assert!(second.markers.observation(1).is_some());
        assert!(second.fresh_observation(1).is_none());

        // Empty batch: flipped to absent
        tx.markers.send(MarkerBatch::default()).unwrap();
        let third = agg.snapshot(Instant::now());
        assert_eq!(third.markers.get(1), Some(&MarkerEntry::Absent));
    }

    #[test]
    fn test_observation_fields_come_from_one_batch() {
        let (tx, mut agg) = setup();
        tx.markers
            .send(MarkerBatch {
                detections: vec![detection(4, 0.3, 2.0)],
            })
            .unwrap();
        tx.markers
            .send(MarkerBatch {
                detections: vec![detection(4, -0.1, 1.0)],
            })
            .unwrap();

        let snap = agg.snapshot(Instant::now());
        let obs = snap.fresh_observation(4).unwrap();
        assert_eq!((obs.x, obs.z), (-0.1, 1.0));
    }

    #[test]
    fn test_bump_edge_and_obstacle_latch() {
        let (tx, mut agg) = setup();
        tx.bump.send(BumpEvent { pressed: true }).unwrap();
        tx.bump.send(BumpEvent { pressed: false }).unwrap();
        tx.obstacle
            .send(ObstacleSignal {
                present: true,
                side: Side::Right,
            })
            .unwrap();

        let snap = agg.snapshot(Instant::now());
        assert!(snap.bumped);
        assert!(snap.obstacle.present);

        let next = agg.snapshot(Instant::now());
        assert!(!next.bumped);
        assert!(next.obstacle.present);
    }

    #[test]
    fn test_non_finite_pose_skipped() {
        let (tx, mut agg) = setup();
        tx.pose.send(PoseSample::planar(1.0, 1.0, 0.0)).unwrap();
        tx.pose.send(PoseSample::planar(f32::NAN, 0.0, 0.0)).unwrap();
        let snap = agg.snapshot(Instant::now());
        assert_abs_diff_eq!(snap.pose.x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_reanchor_applies_subsequent_motion() {
        let mut tracker = PoseTracker::default();
        tracker.set_raw(Pose2D::new(5.0, 0.0, 0.0));
        tracker.reanchor(Pose2D::new(1.0, 1.0, FRAC_PI_2));

        // Raw estimator drives 1 m forward along its own +x
        tracker.set_raw(Pose2D::new(6.0, 0.0, 0.0));
        let pose = tracker.pose();
        assert_abs_diff_eq!(pose.x, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(pose.y, 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(pose.theta, FRAC_PI_2, epsilon = 1e-5);
    }

    #[test]
    fn test_disconnected_sources_keep_last_values() {
        let (tx, mut agg) = setup();
        tx.pose.send(PoseSample::planar(0.5, 0.0, 0.0)).unwrap();
        drop(tx);
        let snap = agg.snapshot(Instant::now());
        assert_abs_diff_eq!(snap.pose.x, 0.5, epsilon = 1e-5);
        let again = agg.snapshot(Instant::now());
        assert_abs_diff_eq!(again.pose.x, 0.5, epsilon = 1e-5);
    }
}
