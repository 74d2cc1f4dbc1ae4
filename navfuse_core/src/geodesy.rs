//! Spherical and local-planar helpers.

use geo::{HaversineBearing, HaversineDistance, Point};
use nalgebra::Vector2;

use crate::record_log::LatLon;

/// Equatorial radius used for the local planar approximation (meters).
const EARTH_RADIUS: f64 = 6378137.0;

#[inline]
fn point(p: LatLon) -> Point<f64> {
    Point::new(p.lon, p.lat)
}

/// Great-circle distance in meters.
pub fn haversine_m(a: LatLon, b: LatLon) -> f64 {
    point(a).haversine_distance(&point(b))
}

/// Initial bearing from `a` to `b` in degrees, normalized to [0, 360).
pub fn bearing_deg(a: LatLon, b: LatLon) -> f64 {
    normalize_deg(point(a).haversine_bearing(point(b)))
}

/// Wraps an angle into [0, 360).
#[inline]
pub fn normalize_deg(angle: f64) -> f64 {
    let a = angle.rem_euclid(360.0);
    if a >= 360.0 { 0.0 } else { a }
}

/// Absolute smallest difference between two bearings, in [0, 180].
#[inline]
pub fn bearing_delta_deg(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

/// East/north offset of `p` from `origin` in meters (equirectangular).
///
/// Accurate to well under a centimeter over the few tens of meters the
/// simplifier compares.
pub fn local_offset(origin: LatLon, p: LatLon) -> Vector2<f64> {
    let lat_diff = (p.lat - origin.lat).to_radians();
    let lon_diff = (p.lon - origin.lon).to_radians();
    Vector2::new(
        lon_diff * EARTH_RADIUS * origin.lat.to_radians().cos(),
        lat_diff * EARTH_RADIUS,
    )
}

/// Planar distance in meters between two nearby positions.
#[inline]
pub fn planar_distance_m(a: LatLon, b: LatLon) -> f64 {
    local_offset(a, b).norm()
}

/// Circular mean of angles in degrees, in [0, 360).
pub fn circular_mean_deg(angles: &[f64]) -> f64 {
    let (s, c) = angles.iter().fold((0.0, 0.0), |(s, c), a| {
        let r = a.to_radians();
        (s + r.sin(), c + r.cos())
    });
    normalize_deg(s.atan2(c).to_degrees())
}

/// Position as a (lat, lon) vector for affine blending.
#[inline]
pub fn to_vec(p: LatLon) -> Vector2<f64> {
    Vector2::new(p.lat, p.lon)
}

#[inline]
pub fn from_vec(v: Vector2<f64>) -> LatLon {
    LatLon::new(v.x, v.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_haversine_one_degree_latitude() {
        let d = haversine_m(LatLon::new(0.0, 0.0), LatLon::new(1.0, 0.0));
        assert_relative_eq!(d, 111_195.0, epsilon = 50.0);
    }

    #[test]
    fn test_bearing_cardinal() {
        let o = LatLon::new(10.0, 10.0);
        assert_relative_eq!(bearing_deg(o, LatLon::new(10.1, 10.0)), 0.0, epsilon = 1e-6);
        assert_relative_eq!(bearing_deg(o, LatLon::new(10.0, 10.1)), 90.0, epsilon = 0.1);
        assert_relative_eq!(bearing_deg(o, LatLon::new(9.9, 10.0)), 180.0, epsilon = 1e-6);
        assert_relative_eq!(bearing_deg(o, LatLon::new(10.0, 9.9)), 270.0, epsilon = 0.1);
    }

    #[test]
    fn test_bearing_delta_wraps() {
        assert_relative_eq!(bearing_delta_deg(350.0, 10.0), 20.0);
        assert_relative_eq!(bearing_delta_deg(10.0, 350.0), 20.0);
        assert_relative_eq!(bearing_delta_deg(0.0, 180.0), 180.0);
    }

    #[test]
    fn test_planar_matches_haversine_nearby() {
        let a = LatLon::new(43.0, 5.0);
        let b = LatLon::new(43.0002, 5.0003);
        let planar = planar_distance_m(a, b);
        let sphere = haversine_m(a, b);
        assert!((planar - sphere).abs() < 0.1, "{} vs {}", planar, sphere);
    }

    #[test]
    fn test_circular_mean_across_north() {
        let m = circular_mean_deg(&[359.0, 1.0]);
        assert!(m < 1e-9 || (360.0 - m) < 1e-9, "mean {}", m);
        assert_relative_eq!(circular_mean_deg(&[80.0, 100.0]), 90.0, epsilon = 1e-9);
    }
}
