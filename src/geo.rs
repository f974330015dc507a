//! Great-circle distance between GPS samples.

use crate::models::Coordinate;

/// Mean earth radius used by the spherical approximation, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters between two `(latitude, longitude)` pairs given in degrees.
pub fn haversine_distance(p1: (f64, f64), p2: (f64, f64)) -> f64 {
    let d_lat = (p2.0 - p1.0).to_radians();
    let d_lon = (p2.1 - p1.1).to_radians();
    let lat1 = p1.0.to_radians();
    let lat2 = p2.0.to_radians();

    let a = f64::sin(d_lat / 2.).powi(2)
        + f64::cos(lat1) * f64::cos(lat2) * f64::sin(d_lon / 2.).powi(2);
    let c = 2. * f64::atan2(a.sqrt(), (1. - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Distance in meters between two recorded samples. Altitude is ignored.
pub fn distance(a: &Coordinate, b: &Coordinate) -> f64 {
    haversine_distance((a.latitude, a.longitude), (b.latitude, b.longitude))
}
