//! The Oracle - Ground Truth Survey Vessel
//!
//! The Oracle knows where the vessel really is at every instant. It sails a
//! lawn-mower pattern (parallel lines joined by half-circle turns) and
//! produces noisy sensor readings plus the recorder's drifting clock stamps.

use nalgebra::Vector2;
use navfuse_core::geodesy::normalize_deg;
use navfuse_core::LatLon;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

/// Radius of the local tangent-plane projection (meters).
const EARTH_RADIUS: f64 = 6378137.0;

/// Lawn-mower survey geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurveyPlan {
    /// Start of the first line
    pub origin: LatLon,

    /// Length of each survey line (meters)
    pub line_length_m: f64,

    /// Distance between adjacent lines (meters)
    pub line_spacing_m: f64,

    /// Speed over ground (m/s)
    pub speed_mps: f64,
}

impl Default for SurveyPlan {
    fn default() -> Self {
        Self {
            origin: LatLon::new(43.2965, 5.3698),
            line_length_m: 300.0,
            line_spacing_m: 50.0,
            speed_mps: 2.5,
        }
    }
}

impl SurveyPlan {
    fn line_duration(&self) -> f64 {
        self.line_length_m / self.speed_mps
    }

    fn turn_duration(&self) -> f64 {
        PI * self.line_spacing_m * 0.5 / self.speed_mps
    }

    /// East/north offset from the origin and heading at survey time `t`.
    pub fn pose_at(&self, t: f64) -> (Vector2<f64>, f64) {
        let t = t.max(0.0);
        let line = self.line_duration();
        let turn = self.turn_duration();
        let k = (t / (line + turn)).floor();
        let tau = t - k * (line + turn);
        let eastbound = (k as u64) % 2 == 0;
        let north0 = k * self.line_spacing_m;

        if tau < line {
            let run = self.speed_mps * tau;
            return if eastbound {
                (Vector2::new(run, north0), 90.0)
            } else {
                (Vector2::new(self.line_length_m - run, north0), 270.0)
            };
        }

        let r = self.line_spacing_m * 0.5;
        let theta = (tau - line) / turn * PI;
        if eastbound {
            // Left turn at the east end
            let center = Vector2::new(self.line_length_m, north0 + r);
            let pos = center + Vector2::new(theta.sin(), -theta.cos()) * r;
            let heading = theta.cos().atan2(theta.sin()).to_degrees();
            (pos, normalize_deg(heading))
        } else {
            // Right turn at the west end
            let center = Vector2::new(0.0, north0 + r);
            let pos = center + Vector2::new(-theta.sin(), -theta.cos()) * r;
            let heading = (-theta.cos()).atan2(theta.sin()).to_degrees();
            (pos, normalize_deg(heading))
        }
    }

    /// Converts a local east/north offset back to latitude/longitude.
    pub fn to_lat_lon(&self, offset: Vector2<f64>) -> LatLon {
        let lat0 = self.origin.lat.to_radians();
        LatLon::new(
            self.origin.lat + (offset.y / EARTH_RADIUS).to_degrees(),
            self.origin.lon + (offset.x / (EARTH_RADIUS * lat0.cos())).to_degrees(),
        )
    }
}

/// Recorder clock error against UTC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockModel {
    /// Constant recorder-minus-UTC offset (seconds)
    pub offset_s: f64,

    /// Clock rate error (seconds per second)
    pub drift_rate: f64,

    /// Standard deviation of the logging latency (seconds, half-normal)
    pub latency_std_s: f64,
}

impl Default for ClockModel {
    fn default() -> Self {
        Self {
            offset_s: 3.25,
            drift_rate: 2e-5,
            latency_std_s: 0.04,
        }
    }
}

/// True vessel state at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TruthState {
    /// UTC epoch seconds
    pub utc: f64,
    pub position: LatLon,
    pub heading_deg: f64,
    pub speed_mps: f64,
    pub depth_m: f64,
}

/// A noisy reading together with the recorder stamp it will carry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading<V> {
    /// Recorder clock stamp
    pub db_time: f64,

    /// UTC instant the reading describes
    pub utc: f64,

    pub value: V,
}

/// The Oracle - maintains ground truth for the simulated survey.
pub struct Oracle {
    plan: SurveyPlan,
    clock: ClockModel,

    /// UTC epoch seconds at survey time 0
    start_utc: f64,

    /// Physics RNG (derived from master seed)
    physics_rng: ChaCha8Rng,

    /// GNSS position noise standard deviation (meters)
    position_noise_std: f64,

    /// Heading noise standard deviation (degrees)
    heading_noise_std: f64,

    /// Depth noise standard deviation (meters)
    depth_noise_std: f64,
}

impl Oracle {
    /// Creates a new Oracle with the given seed and default geometry.
    pub fn new(seed: u64, start_utc: f64) -> Self {
        Self {
            plan: SurveyPlan::default(),
            clock: ClockModel::default(),
            start_utc,
            physics_rng: ChaCha8Rng::seed_from_u64(seed),
            position_noise_std: 0.5,
            heading_noise_std: 0.5,
            depth_noise_std: 0.05,
        }
    }

    /// Sets the GNSS position noise level (meters).
    pub fn with_position_noise(mut self, std: f64) -> Self {
        self.position_noise_std = std.max(0.0);
        self
    }

    /// Ground truth at survey time `t`.
    pub fn truth_at(&self, t: f64) -> TruthState {
        let (offset, heading) = self.plan.pose_at(t);
        TruthState {
            utc: self.start_utc + t,
            position: self.plan.to_lat_lon(offset),
            heading_deg: heading,
            speed_mps: self.plan.speed_mps,
            depth_m: 20.0 + 5.0 * (offset.x / 60.0).sin() + 0.02 * offset.y,
        }
    }

    /// Recorder stamp for something that happened at survey time `t`.
    pub fn recorder_stamp(&mut self, t: f64) -> f64 {
        let latency = self.gaussian(self.clock.latency_std_s).abs();
        self.start_utc + t + self.clock.offset_s + self.clock.drift_rate * t + latency
    }

    /// Noisy GNSS fix at survey time `t`.
    pub fn gnss_reading(&mut self, t: f64) -> SensorReading<LatLon> {
        let truth = self.truth_at(t);
        let (offset, _) = self.plan.pose_at(t);
        let noise = Vector2::new(
            self.gaussian(self.position_noise_std),
            self.gaussian(self.position_noise_std),
        );
        SensorReading {
            db_time: self.recorder_stamp(t),
            utc: truth.utc,
            value: self.plan.to_lat_lon(offset + noise),
        }
    }

    /// Noisy gyro heading at survey time `t`.
    pub fn heading_reading(&mut self, t: f64) -> SensorReading<f64> {
        let truth = self.truth_at(t);
        let heading = normalize_deg(truth.heading_deg + self.gaussian(self.heading_noise_std));
        SensorReading {
            db_time: self.recorder_stamp(t),
            utc: truth.utc,
            value: heading,
        }
    }

    /// Noisy echosounder depth at survey time `t`.
    pub fn depth_reading(&mut self, t: f64) -> SensorReading<f64> {
        let truth = self.truth_at(t);
        let depth = truth.depth_m + self.gaussian(self.depth_noise_std);
        SensorReading {
            db_time: self.recorder_stamp(t),
            utc: truth.utc,
            value: depth,
        }
    }

    fn gaussian(&mut self, std: f64) -> f64 {
        match Normal::new(0.0, std) {
            Ok(normal) => normal.sample(&mut self.physics_rng),
            Err(_) => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navfuse_core::geodesy::haversine_m;
    use proptest::prelude::*;

    #[test]
    fn test_lawn_mower_legs() {
        let plan = SurveyPlan::default();

        let (p, h) = plan.pose_at(0.0);
        assert!(p.norm() < 1e-9);
        assert_eq!(h, 90.0);

        // Halfway through the first line
        let (p, _) = plan.pose_at(60.0);
        assert!((p.x - 150.0).abs() < 1e-9);

        // Second line runs back west, one spacing north
        let start_second = plan.line_duration() + plan.turn_duration();
        let (p, h) = plan.pose_at(start_second + 1.0);
        assert!((p.y - 50.0).abs() < 1e-9);
        assert!((p.x - (300.0 - 2.5)).abs() < 1e-9);
        assert_eq!(h, 270.0);
    }

    #[test]
    fn test_turn_is_continuous() {
        let plan = SurveyPlan::default();
        let end_line = plan.line_duration();
        let (a, _) = plan.pose_at(end_line - 1e-6);
        let (b, h) = plan.pose_at(end_line + 1e-6);
        assert!((a - b).norm() < 1e-3);
        assert!((h - 90.0).abs() < 0.01);

        // Apex of the turn points north
        let (_, h) = plan.pose_at(end_line + plan.turn_duration() * 0.5);
        assert!(h < 0.01 || h > 359.99);
    }

    #[test]
    fn test_speed_matches_plan() {
        let oracle = Oracle::new(1, 0.0);
        let a = oracle.truth_at(10.0).position;
        let b = oracle.truth_at(11.0).position;
        assert!((haversine_m(a, b) - 2.5).abs() < 0.01);
    }

    #[test]
    fn test_recorder_stamp_is_late() {
        let mut oracle = Oracle::new(3, 1000.0);
        for t in 0..50 {
            let stamp = oracle.recorder_stamp(t as f64);
            let clock = 1000.0 + t as f64 + 3.25 + 2e-5 * t as f64;
            assert!(stamp >= clock);
            assert!(stamp - clock < 0.5);
        }
    }

    proptest! {
        #[test]
        fn prop_vessel_moves_at_plan_speed(t in 0.0f64..2000.0) {
            let plan = SurveyPlan::default();
            let (a, _) = plan.pose_at(t);
            let (b, _) = plan.pose_at(t + 0.01);
            // Chord of a 25 m turn is within a hair of the arc
            prop_assert!(((b - a).norm() - 0.025).abs() < 1e-4);
        }
    }

    #[test]
    fn test_oracle_deterministic_noise() {
        let mut oracle1 = Oracle::new(42, 0.0);
        let mut oracle2 = Oracle::new(42, 0.0);

        let reading1 = oracle1.gnss_reading(5.0);
        let reading2 = oracle2.gnss_reading(5.0);

        // Same seed = same noise
        assert_eq!(reading1, reading2);
    }
}
