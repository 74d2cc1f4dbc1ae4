//! The "SMOOTH" Stage - Trailing Cubic-Bezier Position Smoothing
//!
//! GNSS fixes jitter by a few meters around the true path. For every
//! position sample `p3` with two predecessors and one successor, the four
//! samples `p1..p4` are used as Bezier control points:
//!
//! ```text
//!   t  = lerp(frac(p2), frac(p3), quality)      frac(x) = (Tx - T1) / (T4 - T1)
//!   B  = Bezier(t; P1, P2, P3, P4)
//!   Tb = Bezier(t; T1, T2, T3, T4)
//!   p3' = P1 + (B - P1) * frac(p3) / ((Tb - T1) / (T4 - T1))
//! ```
//!
//! The final rescale maps the Bezier point, which lies at time `Tb`, back to
//! `p3`'s own time so the emitted path stays time-monotonic. For constant
//! velocity motion the result is exactly `p3`.

use nalgebra::Vector2;

use crate::geodesy::{from_vec, to_vec};
use crate::record_log::{LatLon, PositionSample};

/// Cubic Bernstein weights at `t`.
#[inline]
pub fn bernstein(t: f64) -> [f64; 4] {
    let u = 1.0 - t;
    [u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t]
}

/// Evaluates a scalar cubic Bezier.
#[inline]
pub fn bezier_scalar(t: f64, c: [f64; 4]) -> f64 {
    let w = bernstein(t);
    w[0] * c[0] + w[1] * c[1] + w[2] * c[2] + w[3] * c[3]
}

/// Evaluates a planar cubic Bezier.
#[inline]
pub fn bezier_vec(t: f64, c: [Vector2<f64>; 4]) -> Vector2<f64> {
    let w = bernstein(t);
    c[0] * w[0] + c[1] * w[1] + c[2] * w[2] + c[3] * w[3]
}

/// Smoothed position for the third of four consecutive aligned samples.
///
/// Returns `None` when the window is degenerate in time; the caller then
/// keeps the raw position.
pub fn smooth_third(window: [&PositionSample; 4], quality: f64) -> Option<LatLon> {
    let times = window.map(|s| s.corrected_time);
    let span = times[3] - times[0];
    if !(span > 0.0) {
        return None;
    }

    let frac2 = (times[1] - times[0]) / span;
    let frac3 = (times[2] - times[0]) / span;
    let q = quality.clamp(0.0, 1.0);
    let t = frac2 + q * (frac3 - frac2);

    let bezier_time = bezier_scalar(t, times);
    let bezier_frac = (bezier_time - times[0]) / span;
    if !(bezier_frac > f64::EPSILON) {
        return None;
    }

    let points = window.map(|s| to_vec(s.value));
    let b = bezier_vec(t, points);
    let scale = frac3 / bezier_frac;

    Some(from_vec(points[0] + (b - points[0]) * scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_log::{Sample, Validity};
    use approx::assert_relative_eq;

    fn fix(t: f64, lat: f64, lon: f64) -> PositionSample {
        Sample {
            db_time: t,
            corrected_time: t,
            value: LatLon::new(lat, lon),
            validity: Validity::Smoothed,
        }
    }

    #[test]
    fn test_bernstein_partition_of_unity() {
        for t in [0.0, 0.25, 0.5, 0.9, 1.0] {
            let sum: f64 = bernstein(t).iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_colinear_even_spacing_is_unchanged() {
        let w = [
            fix(0.0, 43.0, 5.0),
            fix(1.0, 43.0001, 5.0002),
            fix(2.0, 43.0002, 5.0004),
            fix(3.0, 43.0003, 5.0006),
        ];
        for q in [0.0, 0.5, 1.0] {
            let p = smooth_third([&w[0], &w[1], &w[2], &w[3]], q).unwrap();
            assert_relative_eq!(p.lat, 43.0002, epsilon = 1e-12);
            assert_relative_eq!(p.lon, 5.0004, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_constant_velocity_uneven_spacing_is_unchanged() {
        let at = |t: f64| fix(t, 10.0 + 1e-5 * t, 20.0 - 2e-5 * t);
        let w = [at(0.0), at(0.7), at(2.1), at(2.5)];
        let p = smooth_third([&w[0], &w[1], &w[2], &w[3]], 0.3).unwrap();
        assert_relative_eq!(p.lat, w[2].value.lat, epsilon = 1e-10);
        assert_relative_eq!(p.lon, w[2].value.lon, epsilon = 1e-10);
    }

    #[test]
    fn test_spike_is_damped() {
        // Third sample jumps sideways by ~11 m
        let w = [
            fix(0.0, 0.0, 0.0),
            fix(1.0, 0.0, 0.0001),
            fix(2.0, 0.0001, 0.0002),
            fix(3.0, 0.0, 0.0003),
        ];
        let p = smooth_third([&w[0], &w[1], &w[2], &w[3]], 0.5).unwrap();
        assert!(p.lat.abs() < 0.0001);
        assert!(p.lat > 0.0);
    }

    #[test]
    fn test_degenerate_time_window() {
        let w = [fix(1.0, 0.0, 0.0), fix(1.0, 0.0, 0.0), fix(1.0, 0.0, 0.0), fix(1.0, 0.0, 0.0)];
        assert!(smooth_third([&w[0], &w[1], &w[2], &w[3]], 0.5).is_none());
    }
}
