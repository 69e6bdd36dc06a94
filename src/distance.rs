use crate::types::Position;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two fixes (haversine).
///
/// Returns `None` when either input is NaN or infinite so that a bad fix can
/// never leak a NaN into the gate's comparison.
pub fn haversine_distance(a: &Position, b: &Position) -> Option<f64> {
    if !a.is_finite() || !b.is_finite() {
        return None;
    }

    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal points
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    Some(EARTH_RADIUS_M * c)
}
