//! lat/lon <-> ECEF unit-vector transform, L2 <-> great-circle meters
//!
//! a small, pure, heavily-tested numeric module, not bound to any
//! particular index structure.

/// mean earth radius in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// convert a (lat, lon) pair in degrees to a 3-D unit ECEF vector.
///
/// callers are expected to have already range-checked the coordinates
/// (`Document::geo_coordinates`); this function does not re-validate.
pub fn lat_lon_to_unit_ecef(lat_deg: f64, lon_deg: f64) -> [f32; 3] {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let x = lat.cos() * lon.cos();
    let y = lat.cos() * lon.sin();
    let z = lat.sin();
    [x as f32, y as f32, z as f32]
}

/// convert a squared L2 distance between two unit ECEF vectors into a
/// great-circle distance in meters:
/// `meters = R * 2 * asin(min(1, sqrt(d^2) / 2))`
pub fn l2_squared_to_meters(d_squared: f64) -> f64 {
    let chord = d_squared.max(0.0).sqrt();
    let half_angle = (chord / 2.0).min(1.0);
    EARTH_RADIUS_METERS * 2.0 * half_angle.asin()
}
