//! JSON exporter for fused navigation versus ground truth.
//!
//! One frame per probe time: the oracle's truth and what every source of
//! the engine answered at that instant.

use navfuse_core::{FixValue, QueryError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::SimError;
use crate::world::SurveyWorld;

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Survey time in seconds
    pub time_sec: f64,

    /// Corrected (UTC) time queried
    pub utc: f64,

    pub truth: TruthPoint,

    /// One entry per attached source
    pub fused: Vec<FusedValue>,
}

/// Ground truth at a frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruthPoint {
    pub lat: f64,
    pub lon: f64,
    pub heading_deg: f64,
    pub speed_mps: f64,
    pub depth_m: f64,
}

/// What one source answered at a frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedValue {
    pub source: u32,
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    /// Query failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Simulation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub time_sec: f64,
    pub message: String,
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    pub frames: Vec<SimFrame>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,

    /// Final results
    pub passed: bool,

    /// Final GNSS RMS error if applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_rms_error: Option<f64>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            events: Vec::new(),
            passed: false,
            final_rms_error: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = self.duration_sec.max(frame.time_sec);
        self.frames.push(frame);
    }

    pub fn add_event(&mut self, time_sec: f64, message: impl Into<String>) {
        self.events.push(SimEvent {
            time_sec,
            message: message.into(),
        });
    }

    /// Captures one frame per survey time from the world's current state.
    pub fn capture(&mut self, world: &SurveyWorld, times: &[f64], quality: f64) {
        for &t in times {
            self.add_frame(frame_at(world, t, quality));
        }
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, rms_error: Option<f64>) {
        self.passed = passed;
        self.final_rms_error = rms_error;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

/// Queries every source of the world's engine at survey time `t`.
pub fn frame_at(world: &SurveyWorld, t: f64, quality: f64) -> SimFrame {
    let truth = world.oracle.truth_at(t);
    let utc = world.utc(t);

    let fused = world
        .engine
        .sources()
        .map(|source| {
            let descriptor = source.descriptor();
            let mut entry = FusedValue {
                source: descriptor.id.as_u32(),
                name: descriptor.name.clone(),
                lat: None,
                lon: None,
                value: None,
                error: None,
            };
            match world.engine.query(descriptor.id, utc, quality) {
                Ok(fix) => match fix.value {
                    FixValue::Position(p) => {
                        entry.lat = Some(p.lat);
                        entry.lon = Some(p.lon);
                    }
                    FixValue::Scalar(v) => entry.value = Some(v),
                },
                Err(e) => entry.error = Some(error_label(e)),
            }
            entry
        })
        .collect();

    SimFrame {
        time_sec: t,
        utc,
        truth: TruthPoint {
            lat: truth.position.lat,
            lon: truth.position.lon,
            heading_deg: truth.heading_deg,
            speed_mps: truth.speed_mps,
            depth_m: truth.depth_m,
        },
        fused,
    }
}

fn error_label(e: QueryError) -> String {
    match e {
        QueryError::NotYetAvailable => "not_yet_available".into(),
        QueryError::OutOfRange => "out_of_range".into(),
        QueryError::Removed => "removed".into(),
        other => other.to_string(),
    }
}
