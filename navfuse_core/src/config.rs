//! Engine configuration.

use navfuse_env::SourceId;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::FusionError;

/// Configuration for the [`FusionEngine`](crate::FusionEngine).
///
/// `quality` and the distance/heading constants are empirical. They are
/// kept at their historical values for compatibility and are tunable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Pipeline quality in [0, 1] (default: 0.5).
    /// Drives the Bezier blend and the distance threshold `10 - 9 * quality` m.
    pub quality: f64,

    /// Number of trailing time-correction entries in the drift window (default: 16)
    pub drift_window: usize,

    /// Exact-hit / override matching window in seconds (default: 0.010)
    pub exact_window_s: f64,

    /// Candidate radius for the min-heading simplifier in meters (default: 50.0)
    pub heading_search_radius_m: f64,

    /// Shortest leg whose bearing is trusted by the min-heading simplifier (default: 1.0 m)
    pub min_leg_m: f64,

    /// Half span between the two position queries behind derived heading/speed (default: 0.5 s)
    pub derive_half_span_s: f64,

    /// Record log growth block, in samples (default: 1024)
    pub log_block_size: usize,

    /// Date (epoch seconds of UTC midnight) assumed before any date is reported
    pub default_date: f64,

    /// Source whose clock corrections are borrowed by samples without external time
    pub time_reference: Option<SourceId>,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            quality: 0.5,
            drift_window: 16,
            exact_window_s: 0.010,
            heading_search_radius_m: 50.0,
            min_leg_m: 1.0,
            derive_half_span_s: 0.5,
            log_block_size: 1024,
            default_date: 0.0,
            time_reference: None,
        }
    }
}

impl FusionConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, FusionError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| FusionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FusionError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| FusionError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Rejects values the pipeline cannot work with.
    pub fn validate(&self) -> Result<(), FusionError> {
        if !(0.0..=1.0).contains(&self.quality) {
            return Err(FusionError::Config(format!("quality {} not in [0, 1]", self.quality)));
        }
        if self.drift_window == 0 {
            return Err(FusionError::Config("drift_window must be at least 1".into()));
        }
        if self.exact_window_s < 0.0 || self.derive_half_span_s <= 0.0 {
            return Err(FusionError::Config("time windows must be positive".into()));
        }
        if self.heading_search_radius_m <= 0.0 || self.min_leg_m < 0.0 {
            return Err(FusionError::Config("simplifier distances must be positive".into()));
        }
        Ok(())
    }

    /// Distance threshold of the distance-variant simplifier, in meters.
    #[inline]
    pub fn distance_threshold_m(&self) -> f64 {
        10.0 - 9.0 * self.quality
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FusionConfig::default();
        assert_eq!(config.drift_window, 16);
        assert!(config.validate().is_ok());
        assert!((config.distance_threshold_m() - 5.5).abs() < 1e-12);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = FusionConfig::from_json_str(r#"{ "quality": 1.0, "time_reference": 3 }"#).unwrap();
        assert_eq!(config.quality, 1.0);
        assert_eq!(config.time_reference, Some(SourceId(3)));
        assert_eq!(config.log_block_size, 1024);
        assert!((config.distance_threshold_m() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_quality() {
        let err = FusionConfig::from_json_str(r#"{ "quality": 1.5 }"#).unwrap_err();
        assert!(matches!(err, FusionError::Config(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(FusionConfig::from_json_str("{ quality: ").is_err());
    }
}
