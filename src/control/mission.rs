//! Mission profile: station catalog, detour routing and interrupt-resume policy.

use std::collections::BTreeMap;

use crate::config::{DockConfig, ResumePolicy, StationConfig};
use crate::types::{Pose2D, StationId};

/// Catalog entry, in map coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Station {
    pub id: StationId,
    pub waypoint: (f32, f32),
    pub approach_threshold: f32,
    pub dock: Option<Pose2D>,
}

impl From<&StationConfig> for Station {
    fn from(c: &StationConfig) -> Self {
        Self {
            id: c.id,
            waypoint: (c.waypoint[0], c.waypoint[1]),
            approach_threshold: c.approach_threshold,
            dock: c.dock.map(|[x, y, theta]| Pose2D::new(x, y, theta)),
        }
    }
}

/// Station id → waypoint and approach threshold.
#[derive(Clone, Debug, Default)]
pub struct StationCatalog {
    stations: BTreeMap<StationId, Station>,
}

impl StationCatalog {
    pub fn new(stations: impl IntoIterator<Item = Station>) -> Self {
        Self {
            stations: stations.into_iter().map(|s| (s.id, s)).collect(),
        }
    }

    pub fn get(&self, id: StationId) -> Option<&Station> {
        self.stations.get(&id)
    }

    pub fn contains(&self, id: StationId) -> bool {
        self.stations.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

/// Map frame → pose-estimator frame. The estimator starts at the home origin.
#[derive(Clone, Copy, Debug, Default)]
pub struct MapTransform {
    origin: Pose2D,
}

impl MapTransform {
    pub fn new(origin: Pose2D) -> Self {
        Self { origin }
    }

    pub fn to_local(&self, map_pose: Pose2D) -> Pose2D {
        self.origin.inverse().compose(&map_pose)
    }

    pub fn point_to_local(&self, (x, y): (f32, f32)) -> (f32, f32) {
        let p = self.to_local(Pose2D::new(x, y, 0.0));
        (p.x, p.y)
    }
}

/// Everything that distinguishes one mission variant from another.
#[derive(Clone, Debug)]
pub struct MissionProfile {
    pub catalog: StationCatalog,
    pub home: StationId,
    pub resume_policy: ResumePolicy,
    pub transform: MapTransform,
}

impl MissionProfile {
    pub fn from_config(config: &DockConfig) -> Self {
        Self {
            catalog: StationCatalog::new(config.stations.iter().map(Station::from)),
            home: config.mission.home,
            resume_policy: config.mission.resume_policy,
            transform: MapTransform::new(config.home_origin()),
        }
    }

    /// Waypoint of `id` in the estimator frame.
    pub fn waypoint(&self, id: StationId) -> Option<(f32, f32)> {
        self.catalog
            .get(id)
            .map(|s| self.transform.point_to_local(s.waypoint))
    }

    /// Known contact pose of the station behind `id`, estimator frame.
    pub fn dock_pose(&self, id: StationId) -> Option<Pose2D> {
        self.catalog
            .get(id.decode())
            .and_then(|s| s.dock)
            .map(|p| self.transform.to_local(p))
    }

    pub fn approach_threshold(&self, id: StationId) -> Option<f32> {
        self.catalog.get(id.decode()).map(|s| s.approach_threshold)
    }

    pub fn is_home(&self, id: StationId) -> bool {
        id.decode() == self.home
    }

    /// Target for the return leg: the home detour waypoint when cataloged.
    pub fn return_target(&self) -> StationId {
        let detour = StationId::detour_of(self.home);
        // Home 0 would encode to 1, a real station
        if detour.is_detour() && self.catalog.contains(detour) {
            detour
        } else {
            self.home
        }
    }
}
