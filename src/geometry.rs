//! Pure geometry helpers: quaternion reduction and approach triangulation.

/// Yaw (rotation about +Z) of a unit quaternion `[x, y, z, w]`.
pub fn yaw_from_quaternion(q: [f32; 4]) -> f32 {
    let [x, y, z, w] = q;
    (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z))
}

/// Rotation about the camera vertical axis (+Y, optical frame) of `[x, y, z, w]`.
pub fn camera_yaw_from_quaternion(q: [f32; 4]) -> f32 {
    let [x, y, z, w] = q;
    (2.0 * (w * y + x * z)).atan2(1.0 - 2.0 * (x * x + y * y))
}

/// Repositioning maneuver that puts the robot on the marker's normal at the
/// standoff distance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ApproachPlan {
    /// Straight-line distance to the standoff point (m)
    pub distance: f32,
    /// Rotation away from the marker before driving (rad, unsigned)
    pub alpha: f32,
}

/// Triangulate the repositioning leg.
///
/// Triangle: robot R at `depth` from marker M, standoff point G on the marker
/// normal at `standoff` from M, `beta` the angle at M between MR and MG.
/// Returns `None` when the standoff is not closer than the current depth, where
/// the triangle degenerates and the robot should just drive straight in.
pub fn triangulate(depth: f32, standoff: f32, beta: f32) -> Option<ApproachPlan> {
    if !depth.is_finite() || !beta.is_finite() || standoff >= depth || depth <= 0.0 {
        return None;
    }

    let beta = beta.abs();
    let distance_sq = depth * depth + standoff * standoff - 2.0 * depth * standoff * beta.cos();
    let distance = distance_sq.max(0.0).sqrt();
    if distance < 1e-4 {
        return None;
    }

    // Opposite side `standoff` < `depth`, so alpha is the acute solution
    let alpha = (standoff * beta.sin() / distance).clamp(-1.0, 1.0).asin();

    Some(ApproachPlan { distance, alpha })
}
