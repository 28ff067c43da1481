//! Marker memory: last-known relative pose per fiducial id.
//!
//! Entries are never removed. An id that drops out of a detection batch is
//! flipped to [`MarkerEntry::Absent`], so consumers can tell "never seen"
//! (no entry) from "seen, then lost" (absent entry).

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use crate::geometry::camera_yaw_from_quaternion;
use crate::types::MarkerObservation;

/// Raw detection as delivered by the marker tracker.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerDetection {
    pub id: u32,
    /// Position in the camera optical frame [x right, y down, z forward] (m)
    pub position: [f32; 3],
    /// Orientation quaternion [x, y, z, w] in the camera optical frame
    pub orientation: [f32; 4],
}

impl MarkerDetection {
    /// Reduce to the planar observation used by the controllers.
    pub fn observation(&self) -> MarkerObservation {
        MarkerObservation {
            id: self.id,
            x: self.position[0],
            z: self.position[2],
            bearing: camera_yaw_from_quaternion(self.orientation),
        }
    }

    fn is_finite(&self) -> bool {
        self.position.iter().chain(self.orientation.iter()).all(|v| v.is_finite())
    }
}

/// One detection batch (one camera frame).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MarkerBatch {
    pub detections: Vec<MarkerDetection>,
}

/// Memory entry for a marker id.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MarkerEntry {
    Present(MarkerObservation),
    Absent,
}

/// Mapping marker id → last observation or absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MarkerMemory {
    entries: BTreeMap<u32, MarkerEntry>,
}

impl MarkerMemory {
    pub fn get(&self, id: u32) -> Option<&MarkerEntry> {
        self.entries.get(&id)
    }

    /// Observation for `id` if it was in the latest batch.
    pub fn observation(&self, id: u32) -> Option<&MarkerObservation> {
        match self.entries.get(&id) {
            Some(MarkerEntry::Present(obs)) => Some(obs),
            _ => None,
        }
    }

    /// True once any marker has ever been recorded.
    pub fn any_recorded(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn ever_seen(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Applies detection batches to a [`MarkerMemory`].
#[derive(Clone, Debug)]
pub struct MarkerFilter {
    valid_ids: Range<u32>,
    memory: MarkerMemory,
}

impl MarkerFilter {
    pub fn new(valid_ids: Range<u32>) -> Self {
        Self {
            valid_ids,
            memory: MarkerMemory::default(),
        }
    }

    /// Apply one batch. Returns the ids recorded from it.
    pub fn apply(&mut self, batch: &MarkerBatch) -> BTreeSet<u32> {
        let mut seen = BTreeSet::new();

        for detection in &batch.detections {
            if !self.valid_ids.contains(&detection.id) {
                tracing::trace!("Ignoring marker id {} outside valid range", detection.id);
                continue;
            }
            if !detection.is_finite() {
                tracing::warn!("Skipping non-finite detection for marker {}", detection.id);
                continue;
            }
            self.memory
                .entries
                .insert(detection.id, MarkerEntry::Present(detection.observation()));
            seen.insert(detection.id);
        }

        for (id, entry) in self.memory.entries.iter_mut() {
            if !seen.contains(id) && matches!(entry, MarkerEntry::Present(_)) {
                tracing::debug!("Marker {} dropped out of view", id);
                *entry = MarkerEntry::Absent;
            }
        }

        seen
    }

    pub fn memory(&self) -> &MarkerMemory {
        &self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(id: u32, z: f32) -> MarkerDetection {
        MarkerDetection {
            id,
            position: [0.0, 0.0, z],
            orientation: [0.0, 1.0, 0.0, 0.0],
        }
    }

    #[test]
    fn test_present_then_absent_reads_absent() {
        let mut filter = MarkerFilter::new(0..18);
        filter.apply(&MarkerBatch {
            detections: vec![detection(3, 1.2)],
        });
        assert_eq!(filter.memory().observation(3).map(|o| o.z), Some(1.2));

        filter.apply(&MarkerBatch::default());
        assert_eq!(filter.memory().get(3), Some(&MarkerEntry::Absent));
        assert!(filter.memory().observation(3).is_none());
        assert!(filter.memory().ever_seen(3));
    }

    #[test]
    fn test_never_seen_has_no_entry() {
        let filter = MarkerFilter::new(0..18);
        assert!(filter.memory().get(5).is_none());
        assert!(!filter.memory().any_recorded());
    }

    #[test]
    fn test_out_of_range_ids_ignored() {
        let mut filter = MarkerFilter::new(0..18);
        let seen = filter.apply(&MarkerBatch {
            detections: vec![detection(18, 1.0), detection(42, 1.0), detection(2, 0.8)],
        });
        assert_eq!(seen.into_iter().collect::<Vec<_>>(), vec![2]);
        assert!(filter.memory().get(18).is_none());
        assert!(filter.memory().get(42).is_none());
    }

    #[test]
    fn test_reappearing_marker_refreshes_value() {
        let mut filter = MarkerFilter::new(0..18);
        filter.apply(&MarkerBatch {
            detections: vec![detection(1, 1.0), detection(2, 2.0)],
        });
        filter.apply(&MarkerBatch {
            detections: vec![detection(2, 1.5)],
        });
        filter.apply(&MarkerBatch {
            detections: vec![detection(1, 0.7)],
        });
        assert_eq!(filter.memory().observation(1).map(|o| o.z), Some(0.7));
        assert_eq!(filter.memory().get(2), Some(&MarkerEntry::Absent));
        assert_eq!(filter.memory().len(), 2);
    }
}
