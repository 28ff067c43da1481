//! Configuration loading for DhruvaDock

use crate::error::{DockError, Result};
use crate::types::{Pose2D, StationId};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Clone, Debug, Deserialize)]
pub struct DockConfig {
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub markers: MarkerConfig,
    #[serde(default)]
    pub obstacle: ObstacleConfig,
    #[serde(default)]
    pub docking: DockingConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub interrupt: InterruptConfig,
    #[serde(default)]
    pub mission: MissionConfig,
    #[serde(default = "default_stations")]
    pub stations: Vec<StationConfig>,
    #[serde(default)]
    pub sim: SimConfig,
}

/// Control loop settings
#[derive(Clone, Debug, Deserialize)]
pub struct ControlConfig {
    /// Control tick rate in Hz (default: 5.0)
    #[serde(default = "default_rate_hz")]
    pub rate_hz: f32,

    /// How long the stop command is held on shutdown, in milliseconds (default: 1000)
    #[serde(default = "default_stop_hold_ms")]
    pub stop_hold_ms: u64,

    /// Interval between status log lines in seconds (default: 3.0)
    #[serde(default = "default_status_interval")]
    pub status_interval_secs: f32,

    /// Pose variance above which a warning is logged (default: 0.05)
    #[serde(default = "default_pose_variance_warn")]
    pub pose_variance_warn: f32,

    /// Capacity of each sensor channel (default: 16)
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Fiducial marker settings
#[derive(Clone, Debug, Deserialize)]
pub struct MarkerConfig {
    /// First accepted marker id, inclusive (default: 0)
    #[serde(default)]
    pub valid_id_start: u32,

    /// End of accepted marker ids, exclusive (default: 18)
    #[serde(default = "default_valid_id_end")]
    pub valid_id_end: u32,
}

/// Bounding-box thresholds for the obstacle classifier (pixels)
#[derive(Clone, Debug, Deserialize)]
pub struct ObstacleConfig {
    /// Box area above which the robot must avoid (default: 400)
    #[serde(default = "default_avoid_area")]
    pub avoid_area: f32,

    /// Box area above which the obstacle is worth noting (default: 200)
    #[serde(default = "default_note_area")]
    pub note_area: f32,

    /// Image column splitting left from right obstacles (default: 160)
    #[serde(default = "default_split_column")]
    pub split_column: f32,
}

/// Proportional turn law with extra gain near zero error.
///
/// `|ω| = gain·|e|·(1 + boost·(1 − min(|e|/reference, 1)))`, clamped to
/// `[min_speed, max_speed]`.
#[derive(Clone, Debug, Deserialize)]
pub struct TurnLaw {
    pub gain: f32,
    pub boost: f32,
    pub reference: f32,
    pub min_speed: f32,
    pub max_speed: f32,
}

impl TurnLaw {
    /// Magnitude of the angular velocity for an error magnitude.
    pub fn speed(&self, error: f32) -> f32 {
        let e = error.abs();
        let closeness = 1.0 - (e / self.reference).min(1.0);
        (self.gain * e * (1.0 + self.boost * closeness)).clamp(self.min_speed, self.max_speed)
    }
}

/// Docking controller tuning
#[derive(Clone, Debug, Deserialize)]
pub struct DockingConfig {
    /// Final distance between robot and marker (m)
    #[serde(default = "default_standoff")]
    pub standoff_distance: f32,

    /// Depth at which the robot is considered in contact (m)
    #[serde(default = "default_near_contact")]
    pub near_contact_distance: f32,

    /// Within this multiple of near-contact, skip repositioning (default: 2.5)
    #[serde(default = "default_skip_factor")]
    pub skip_factor: f32,

    /// Upper edge of the "about to arrive" band as a multiple of near-contact
    #[serde(default = "default_arrive_band_factor")]
    pub arrive_band_factor: f32,

    /// Lateral offset considered aligned (m)
    #[serde(default = "default_lateral_tolerance")]
    pub lateral_tolerance: f32,

    /// Remaining rotation considered done (rad)
    #[serde(default = "default_angular_close")]
    pub angular_close: f32,

    /// Remaining distance considered done (m)
    #[serde(default = "default_linear_close")]
    pub linear_close: f32,

    /// Dwell at the dispenser (s)
    #[serde(default = "default_dwell_secs")]
    pub dwell_secs: f32,

    /// Half-period of the lost-marker search oscillation (s)
    #[serde(default = "default_search_half_period")]
    pub search_half_period_secs: f32,

    /// Angular speed of the lost-marker search (rad/s)
    #[serde(default = "default_search_angular")]
    pub search_angular_vel: f32,

    /// Stale ticks before the marker is declared lost in ZERO_X / MOVE_PERF
    #[serde(default = "default_lost_confirm_ticks")]
    pub lost_confirm_ticks: u32,

    /// Stale ticks before the marker is declared lost in MOVE_ALPHA
    #[serde(default = "default_move_alpha_lost_ticks")]
    pub move_alpha_lost_ticks: u32,

    /// Consecutive fresh ticks needed to leave SEARCHING_LOST
    #[serde(default = "default_reacquire_ticks")]
    pub reacquire_ticks: u32,

    /// Freshness history kept while searching (ticks)
    #[serde(default = "default_freshness_window")]
    pub freshness_window: usize,

    /// Total time without the marker before docking fails (s)
    #[serde(default = "default_lost_timeout")]
    pub lost_timeout_secs: f32,

    /// Forward speed per metre of depth (1/s)
    #[serde(default = "default_forward_gain")]
    pub forward_gain: f32,

    #[serde(default = "default_min_linear")]
    pub min_linear_vel: f32,

    #[serde(default = "default_max_linear")]
    pub max_linear_vel: f32,

    /// Turn law for nulling lateral offset (error in metres)
    #[serde(default = "default_lateral_law")]
    pub lateral_law: TurnLaw,

    /// Turn law for the TURN_ALPHA rotation (error in radians)
    #[serde(default = "default_rotation_law")]
    pub rotation_law: TurnLaw,

    /// Reverse speed while backing out (m/s)
    #[serde(default = "default_backout_speed")]
    pub backout_speed: f32,

    /// Marker depth at which back-out is complete (m)
    #[serde(default = "default_backout_clear")]
    pub backout_clear_distance: f32,

    /// Upper bound on back-out time (s)
    #[serde(default = "default_backout_max_secs")]
    pub backout_max_secs: f32,
}

impl DockingConfig {
    /// Depth below which TURN_ALPHA / MOVE_ALPHA are skipped.
    pub fn skip_distance(&self) -> f32 {
        self.skip_factor * self.near_contact_distance
    }

    /// Forward speed proportional to marker depth.
    pub fn approach_speed(&self, depth: f32) -> f32 {
        (self.forward_gain * depth).clamp(self.min_linear_vel, self.max_linear_vel)
    }
}

/// Behavior controller tuning
#[derive(Clone, Debug, Deserialize)]
pub struct BehaviorConfig {
    /// Bearing error below which the robot drives instead of turning (deg)
    #[serde(default = "default_heading_tolerance_deg")]
    pub heading_tolerance_deg: f32,

    #[serde(default = "default_travel_linear")]
    pub travel_linear_vel: f32,

    /// Turn law toward the waypoint (error in radians)
    #[serde(default = "default_heading_law")]
    pub heading_law: TurnLaw,

    /// Distance at which a waypoint counts as reached (m)
    #[serde(default = "default_waypoint_tolerance")]
    pub waypoint_tolerance: f32,

    /// Rotation speed while scanning for the marker at the waypoint (rad/s)
    #[serde(default = "default_scan_angular")]
    pub scan_angular_vel: f32,

    /// Duration of the straight detour leg (s)
    #[serde(default = "default_detour_leg_secs")]
    pub detour_leg_secs: f32,

    /// Marker depth under which the robot is "very close" to its target (m)
    #[serde(default = "default_very_close")]
    pub very_close_distance: f32,
}

/// Interrupt handler tuning
#[derive(Clone, Debug, Deserialize)]
pub struct InterruptConfig {
    /// Bump recovery duration when not near the target (s)
    #[serde(default = "default_bump_recovery")]
    pub bump_recovery_secs: f32,

    /// Bump recovery duration when very close to the target (s)
    #[serde(default = "default_bump_recovery_close")]
    pub bump_recovery_close_secs: f32,

    /// Reverse speed during bump recovery (m/s)
    #[serde(default = "default_bump_reverse")]
    pub bump_reverse_speed: f32,

    /// Consecutive obstacle ticks before avoiding
    #[serde(default = "default_obstacle_debounce")]
    pub obstacle_debounce_ticks: u32,

    #[serde(default = "default_obstacle_turn_secs")]
    pub obstacle_turn_secs: f32,

    #[serde(default = "default_obstacle_turn_vel")]
    pub obstacle_turn_vel: f32,

    #[serde(default = "default_obstacle_forward_secs")]
    pub obstacle_forward_secs: f32,

    #[serde(default = "default_obstacle_forward_vel")]
    pub obstacle_forward_vel: f32,
}

/// What the behavior controller resumes after an interrupt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumePolicy {
    /// Always resume TRAVEL
    #[default]
    AlwaysTravel,
    /// Resume the remembered state unless a docking context would be stale
    Previous,
}

/// Mission parameters
#[derive(Clone, Debug, Deserialize)]
pub struct MissionConfig {
    /// Station the robot returns to
    #[serde(default = "default_home")]
    pub home: StationId,

    /// Initial target station; none means wait for an assignment
    #[serde(default)]
    pub target: Option<StationId>,

    #[serde(default)]
    pub resume_policy: ResumePolicy,

    /// Pose of the home station in map coordinates [x, y, theta]
    #[serde(default)]
    pub home_origin: [f32; 3],
}

/// Station catalog entry (map frame)
#[derive(Clone, Debug, Deserialize)]
pub struct StationConfig {
    pub id: StationId,

    /// Waypoint from which the marker should become visible [x, y]
    pub waypoint: [f32; 2],

    /// Marker depth at which the approach begins (m)
    #[serde(default = "default_approach_threshold")]
    pub approach_threshold: f32,

    /// Known robot pose at docking contact [x, y, theta], used to re-anchor
    #[serde(default)]
    pub dock: Option<[f32; 3]>,
}

/// Fiducial placed in the simulated world (map frame)
#[derive(Clone, Debug, Deserialize)]
pub struct SimMarker {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    /// Direction the marker faces (rad)
    pub normal: f32,
}

/// Bench simulator settings
#[derive(Clone, Debug, Deserialize)]
pub struct SimConfig {
    /// Physics rate in Hz (default: 50)
    #[serde(default = "default_sim_rate")]
    pub rate_hz: f32,

    /// Marker detection rate in Hz (default: 10)
    #[serde(default = "default_camera_rate")]
    pub camera_rate_hz: f32,

    /// 2.0 = twice real time
    #[serde(default = "default_speed_factor")]
    pub speed_factor: f32,

    /// 0 = random each run
    #[serde(default = "default_seed")]
    pub random_seed: u64,

    /// Start pose in map coordinates [x, y, theta]
    #[serde(default)]
    pub start: [f32; 3],

    #[serde(default = "default_robot_radius")]
    pub robot_radius: f32,

    /// Half of the camera horizontal field of view (rad)
    #[serde(default = "default_camera_half_fov")]
    pub camera_half_fov: f32,

    #[serde(default = "default_camera_range")]
    pub camera_range: f32,

    /// Largest angle between marker normal and line of sight that still detects (rad)
    #[serde(default = "default_max_view_angle")]
    pub max_view_angle: f32,

    /// Probability a visible marker is missing from a batch
    #[serde(default = "default_dropout")]
    pub dropout_probability: f32,

    /// Standard deviation of marker position noise (m)
    #[serde(default = "default_marker_noise")]
    pub marker_noise: f32,

    /// Distance ahead within which obstacles are reported (m)
    #[serde(default = "default_obstacle_range")]
    pub obstacle_range: f32,

    #[serde(default = "default_sim_markers")]
    pub markers: Vec<SimMarker>,

    /// Circular obstacles [x, y, radius]
    #[serde(default = "default_sim_obstacles")]
    pub obstacles: Vec<[f32; 3]>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            rate_hz: default_rate_hz(),
            stop_hold_ms: default_stop_hold_ms(),
            status_interval_secs: default_status_interval(),
            pose_variance_warn: default_pose_variance_warn(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            valid_id_start: 0,
            valid_id_end: default_valid_id_end(),
        }
    }
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            avoid_area: default_avoid_area(),
            note_area: default_note_area(),
            split_column: default_split_column(),
        }
    }
}

impl Default for DockingConfig {
    fn default() -> Self {
        Self {
            standoff_distance: default_standoff(),
            near_contact_distance: default_near_contact(),
            skip_factor: default_skip_factor(),
            arrive_band_factor: default_arrive_band_factor(),
            lateral_tolerance: default_lateral_tolerance(),
            angular_close: default_angular_close(),
            linear_close: default_linear_close(),
            dwell_secs: default_dwell_secs(),
            search_half_period_secs: default_search_half_period(),
            search_angular_vel: default_search_angular(),
            lost_confirm_ticks: default_lost_confirm_ticks(),
            move_alpha_lost_ticks: default_move_alpha_lost_ticks(),
            reacquire_ticks: default_reacquire_ticks(),
            freshness_window: default_freshness_window(),
            lost_timeout_secs: default_lost_timeout(),
            forward_gain: default_forward_gain(),
            min_linear_vel: default_min_linear(),
            max_linear_vel: default_max_linear(),
            lateral_law: default_lateral_law(),
            rotation_law: default_rotation_law(),
            backout_speed: default_backout_speed(),
            backout_clear_distance: default_backout_clear(),
            backout_max_secs: default_backout_max_secs(),
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            heading_tolerance_deg: default_heading_tolerance_deg(),
            travel_linear_vel: default_travel_linear(),
            heading_law: default_heading_law(),
            waypoint_tolerance: default_waypoint_tolerance(),
            scan_angular_vel: default_scan_angular(),
            detour_leg_secs: default_detour_leg_secs(),
            very_close_distance: default_very_close(),
        }
    }
}

impl Default for InterruptConfig {
    fn default() -> Self {
        Self {
            bump_recovery_secs: default_bump_recovery(),
            bump_recovery_close_secs: default_bump_recovery_close(),
            bump_reverse_speed: default_bump_reverse(),
            obstacle_debounce_ticks: default_obstacle_debounce(),
            obstacle_turn_secs: default_obstacle_turn_secs(),
            obstacle_turn_vel: default_obstacle_turn_vel(),
            obstacle_forward_secs: default_obstacle_forward_secs(),
            obstacle_forward_vel: default_obstacle_forward_vel(),
        }
    }
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            home: default_home(),
            target: None,
            resume_policy: ResumePolicy::default(),
            home_origin: [0.0; 3],
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            rate_hz: default_sim_rate(),
            camera_rate_hz: default_camera_rate(),
            speed_factor: default_speed_factor(),
            random_seed: default_seed(),
            start: [0.0; 3],
            robot_radius: default_robot_radius(),
            camera_half_fov: default_camera_half_fov(),
            camera_range: default_camera_range(),
            max_view_angle: default_max_view_angle(),
            dropout_probability: default_dropout(),
            marker_noise: default_marker_noise(),
            obstacle_range: default_obstacle_range(),
            markers: default_sim_markers(),
            obstacles: default_sim_obstacles(),
        }
    }
}

// Default value functions
fn default_rate_hz() -> f32 {
    5.0
}
fn default_stop_hold_ms() -> u64 {
    1000
}
fn default_status_interval() -> f32 {
    3.0
}
fn default_pose_variance_warn() -> f32 {
    0.05
}
fn default_channel_capacity() -> usize {
    16
}
fn default_valid_id_end() -> u32 {
    18
}
fn default_avoid_area() -> f32 {
    400.0
}
fn default_note_area() -> f32 {
    200.0
}
fn default_split_column() -> f32 {
    160.0
}

// Docking defaults
fn default_standoff() -> f32 {
    0.50
}
fn default_near_contact() -> f32 {
    0.23
} // ~0.46 of standoff
fn default_skip_factor() -> f32 {
    2.5
}
fn default_arrive_band_factor() -> f32 {
    1.5
}
fn default_lateral_tolerance() -> f32 {
    0.02
}
fn default_angular_close() -> f32 {
    0.05
}
fn default_linear_close() -> f32 {
    0.03
}
fn default_dwell_secs() -> f32 {
    5.0
}
fn default_search_half_period() -> f32 {
    1.0
}
fn default_search_angular() -> f32 {
    0.4
}
fn default_lost_confirm_ticks() -> u32 {
    5
}
fn default_move_alpha_lost_ticks() -> u32 {
    25
}
fn default_reacquire_ticks() -> u32 {
    2
}
fn default_freshness_window() -> usize {
    6
}
fn default_lost_timeout() -> f32 {
    5.0
}
fn default_forward_gain() -> f32 {
    0.3
}
fn default_min_linear() -> f32 {
    0.03
}
fn default_max_linear() -> f32 {
    0.2
}
fn default_lateral_law() -> TurnLaw {
    TurnLaw {
        gain: 1.5,
        boost: 2.0,
        reference: 0.2,
        min_speed: 0.05,
        max_speed: 0.5,
    }
}
fn default_rotation_law() -> TurnLaw {
    TurnLaw {
        gain: 0.8,
        boost: 1.0,
        reference: 0.5,
        min_speed: 0.08,
        max_speed: 0.5,
    }
}
fn default_backout_speed() -> f32 {
    0.15
}
fn default_backout_clear() -> f32 {
    0.6
}
fn default_backout_max_secs() -> f32 {
    4.0
}

// Behavior defaults
fn default_heading_tolerance_deg() -> f32 {
    5.0
}
fn default_travel_linear() -> f32 {
    0.2
}
fn default_heading_law() -> TurnLaw {
    TurnLaw {
        gain: 1.0,
        boost: 0.0,
        reference: 1.0,
        min_speed: 0.1,
        max_speed: 0.5,
    }
}
fn default_waypoint_tolerance() -> f32 {
    0.15
}
fn default_scan_angular() -> f32 {
    0.3
}
fn default_detour_leg_secs() -> f32 {
    4.0
}
fn default_very_close() -> f32 {
    0.6
}

// Interrupt defaults
fn default_bump_recovery() -> f32 {
    1.0
}
fn default_bump_recovery_close() -> f32 {
    2.5
}
fn default_bump_reverse() -> f32 {
    0.1
}
fn default_obstacle_debounce() -> u32 {
    3
}
fn default_obstacle_turn_secs() -> f32 {
    1.0
}
fn default_obstacle_turn_vel() -> f32 {
    0.6
}
fn default_obstacle_forward_secs() -> f32 {
    1.0
}
fn default_obstacle_forward_vel() -> f32 {
    0.15
}

// Mission defaults
fn default_home() -> StationId {
    StationId(0)
}
fn default_approach_threshold() -> f32 {
    1.5
}
fn default_stations() -> Vec<StationConfig> {
    vec![
        StationConfig {
            id: StationId(0),
            waypoint: [0.4, 0.0],
            approach_threshold: 1.5,
            dock: Some([-0.57, 0.0, std::f32::consts::PI]),
        },
        StationConfig {
            id: StationId(1),
            waypoint: [2.0, 1.0],
            approach_threshold: 1.5,
            dock: Some([2.77, 1.0, 0.0]),
        },
        StationConfig {
            id: StationId(2),
            waypoint: [2.5, -0.8],
            approach_threshold: 1.5,
            dock: Some([2.5, -1.77, -std::f32::consts::FRAC_PI_2]),
        },
        // Detour waypoint for station 2
        StationConfig {
            id: StationId(21),
            waypoint: [1.2, 0.2],
            approach_threshold: 1.5,
            dock: None,
        },
    ]
}

// Simulator defaults
fn default_sim_rate() -> f32 {
    50.0
}
fn default_camera_rate() -> f32 {
    10.0
}
fn default_speed_factor() -> f32 {
    1.0
}
fn default_seed() -> u64 {
    42
}
fn default_robot_radius() -> f32 {
    0.17
}
fn default_camera_half_fov() -> f32 {
    0.5
}
fn default_camera_range() -> f32 {
    2.5
}
fn default_max_view_angle() -> f32 {
    1.2
}
fn default_dropout() -> f32 {
    0.05
}
fn default_marker_noise() -> f32 {
    0.005
}
fn default_obstacle_range() -> f32 {
    0.5
}
fn default_sim_markers() -> Vec<SimMarker> {
    vec![
        SimMarker {
            id: 0,
            x: -0.8,
            y: 0.0,
            normal: 0.0,
        },
        SimMarker {
            id: 1,
            x: 3.0,
            y: 1.0,
            normal: std::f32::consts::PI,
        },
        SimMarker {
            id: 2,
            x: 2.5,
            y: -2.0,
            normal: std::f32::consts::FRAC_PI_2,
        },
    ]
}
fn default_sim_obstacles() -> Vec<[f32; 3]> {
    // Pillar north of the station corridor
    vec![[1.5, 2.0, 0.25]]
}

impl Default for DockConfig {
    fn default() -> Self {
        Self {
            control: ControlConfig::default(),
            markers: MarkerConfig::default(),
            obstacle: ObstacleConfig::default(),
            docking: DockingConfig::default(),
            behavior: BehaviorConfig::default(),
            interrupt: InterruptConfig::default(),
            mission: MissionConfig::default(),
            stations: default_stations(),
            sim: SimConfig::default(),
        }
    }
}

impl DockConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DockError::Config(format!("Failed to read config file: {}", e)))?;
        let config: DockConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the controllers cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.control.rate_hz > 0.0) {
            return Err(DockError::Config(format!(
                "control.rate_hz must be positive, got {}",
                self.control.rate_hz
            )));
        }
        // A zero-capacity channel would make every try_send fail
        if self.control.channel_capacity == 0 {
            return Err(DockError::Config(
                "control.channel_capacity must be at least 1".into(),
            ));
        }
        if self.docking.standoff_distance <= self.docking.near_contact_distance {
            return Err(DockError::Config(format!(
                "docking.standoff_distance ({:.2}) must exceed near_contact_distance ({:.2})",
                self.docking.standoff_distance, self.docking.near_contact_distance
            )));
        }
        let lost_timeout = self.docking.lost_timeout_secs;
        if !(lost_timeout.is_finite() && lost_timeout > 0.0) {
            return Err(DockError::Config(
                "docking.lost_timeout_secs must be positive".into(),
            ));
        }
        let durations = [
            ("control.status_interval_secs", self.control.status_interval_secs),
            ("docking.search_half_period_secs", self.docking.search_half_period_secs),
            ("docking.backout_max_secs", self.docking.backout_max_secs),
            ("behavior.detour_leg_secs", self.behavior.detour_leg_secs),
            ("interrupt.bump_recovery_secs", self.interrupt.bump_recovery_secs),
            ("interrupt.bump_recovery_close_secs", self.interrupt.bump_recovery_close_secs),
            ("interrupt.obstacle_turn_secs", self.interrupt.obstacle_turn_secs),
            ("interrupt.obstacle_forward_secs", self.interrupt.obstacle_forward_secs),
        ];
        for (name, secs) in durations {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(DockError::Config(format!(
                    "{} must be a positive number of seconds, got {}",
                    name, secs
                )));
            }
        }
        // Zero dwell is allowed: leave the dispenser immediately
        if !(self.docking.dwell_secs.is_finite() && self.docking.dwell_secs >= 0.0) {
            return Err(DockError::Config(format!(
                "docking.dwell_secs must be zero or positive, got {}",
                self.docking.dwell_secs
            )));
        }
        if self.markers.valid_id_start >= self.markers.valid_id_end {
            return Err(DockError::Config(format!(
                "markers: empty valid id range {}..{}",
                self.markers.valid_id_start, self.markers.valid_id_end
            )));
        }
        if !self.stations.iter().any(|s| s.id == self.mission.home) {
            return Err(DockError::Config(format!(
                "home station {} missing from catalog",
                self.mission.home
            )));
        }
        if let Some(target) = self.mission.target
            && !self.stations.iter().any(|s| s.id == target)
        {
            return Err(DockError::Config(format!(
                "target station {} missing from catalog",
                target
            )));
        }
        if !(self.sim.rate_hz > 0.0 && self.sim.camera_rate_hz > 0.0 && self.sim.speed_factor > 0.0)
        {
            return Err(DockError::Config(
                "sim.rate_hz, sim.camera_rate_hz and sim.speed_factor must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Home station origin in map coordinates.
    pub fn home_origin(&self) -> Pose2D {
        let [x, y, theta] = self.mission.home_origin;
        Pose2D::new(x, y, theta)
    }

    /// Control tick period.
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f32(1.0 / self.control.rate_hz)
    }
}
