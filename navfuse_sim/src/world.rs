//! SurveyWorld - The simulation harness container.
//!
//! Wires the oracle, the recorder, the in-memory stores and a fusion engine
//! together and steps them on the virtual clock.

use crate::context::{SimContext, SIM_EPOCH_S};
use crate::error::SimError;
use crate::oracle::Oracle;
use crate::recorder::{JsonRecordParser, Payload, Recorder};

use navfuse_core::geodesy::{bearing_delta_deg, haversine_m};
use navfuse_core::navfuse_time::DAY_S;
use navfuse_core::{AdvanceReport, FixValue, FusionConfig, FusionEngine, QueryError, SampleKind, SourceDescriptor};
use navfuse_env::{ChannelId, MemoryChannelStore, MemoryObjectStore, SourceId, SurveyContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

// ============================================================================
// SOURCE LAYOUT
// ============================================================================

pub const GNSS: SourceId = SourceId(1);
pub const HEADING: SourceId = SourceId(2);
pub const DEPTH: SourceId = SourceId(3);
pub const TRACK: SourceId = SourceId(4);
pub const SPEED: SourceId = SourceId(5);
pub const COURSE: SourceId = SourceId(6);

pub const GNSS_CHANNEL: ChannelId = ChannelId(1);
pub const HEADING_CHANNEL: ChannelId = ChannelId(2);
pub const DEPTH_CHANNEL: ChannelId = ChannelId(3);
pub const TRACK_CHANNEL: ChannelId = ChannelId(4);

const ALL_CHANNELS: [ChannelId; 4] = [GNSS_CHANNEL, HEADING_CHANNEL, DEPTH_CHANNEL, TRACK_CHANNEL];

/// Recorder ticks per second; every sensor fires on a multiple of it.
pub(crate) const TICKS_PER_S: u64 = 10;

/// The simulated vessel's sources.
pub fn survey_sources() -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor::raw(GNSS, "gnss", SampleKind::Position, GNSS_CHANNEL, 1.0),
        SourceDescriptor::raw(HEADING, "gyro", SampleKind::Heading, HEADING_CHANNEL, 2.0),
        SourceDescriptor::raw(DEPTH, "echosounder", SampleKind::Depth, DEPTH_CHANNEL, 1.0),
        SourceDescriptor::computed(TRACK, "track", SampleKind::Track, GNSS, Some(TRACK_CHANNEL), 1.0),
        SourceDescriptor::computed(SPEED, "sog", SampleKind::ComputedSpeed, GNSS, None, 0.0),
        SourceDescriptor::computed(COURSE, "cog", SampleKind::ComputedHeading, TRACK, None, 0.0),
    ]
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// UTC epoch seconds at which the survey starts
    pub start_utc: f64,

    /// GNSS reports the start date for the whole run
    pub sticky_date: bool,

    /// Share of raw records written as garbage
    pub corrupt_rate: f64,

    /// GNSS position noise standard deviation (meters)
    pub position_noise_std: f64,

    /// Engine configuration
    pub engine: FusionConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            start_utc: SIM_EPOCH_S as f64 + 9.0 * 3600.0,
            sticky_date: false,
            corrupt_rate: 0.0,
            position_noise_std: 0.5,
            engine: FusionConfig {
                time_reference: Some(GNSS),
                ..FusionConfig::default()
            },
        }
    }
}

// ============================================================================
// ERROR STATISTICS
// ============================================================================

/// Fused-minus-truth errors over a set of probe times.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ErrorStats {
    pub probes: usize,
    pub answered: usize,
    pub removed: usize,
    pub rms: f64,
    pub max: f64,
}

impl ErrorStats {
    fn push(&mut self, error: f64) {
        self.answered += 1;
        self.rms += error * error;
        self.max = self.max.max(error);
    }

    fn finish(mut self) -> Self {
        if self.answered > 0 {
            self.rms = (self.rms / self.answered as f64).sqrt();
        }
        self
    }

    /// Share of probes answered with a value.
    pub fn coverage(&self) -> f64 {
        if self.probes == 0 {
            0.0
        } else {
            self.answered as f64 / self.probes as f64
        }
    }
}

// ============================================================================
// WORLD
// ============================================================================

/// The SurveyWorld - container for the entire simulation.
pub struct SurveyWorld {
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    /// Ground truth oracle
    pub oracle: Oracle,

    pub recorder: Recorder,
    pub channels: Arc<MemoryChannelStore>,
    pub objects: Arc<MemoryObjectStore>,
    pub engine: Arc<FusionEngine>,

    /// Recorder ticks executed
    ticks: u64,
}

impl SurveyWorld {
    /// Creates a world with every channel open and the engine attached.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        let context = Arc::new(SimContext::starting_at(config.seed, config.start_utc));
        let physics_seed = config.seed.wrapping_mul(0x9e3779b97f4a7c15);
        let oracle = Oracle::new(physics_seed, config.start_utc).with_position_noise(config.position_noise_std);

        let channels = Arc::new(MemoryChannelStore::new());
        let recorder = Recorder::new(channels.clone(), config.seed ^ 0x5eed).with_corrupt_rate(config.corrupt_rate);
        for channel in ALL_CHANNELS {
            recorder.open(channel);
        }

        let objects = Arc::new(MemoryObjectStore::new());
        let engine = FusionEngine::from_config(
            config.engine.clone(),
            survey_sources(),
            channels.clone(),
            objects.clone(),
            Arc::new(JsonRecordParser),
        )?;

        Ok(Self {
            config,
            context,
            oracle,
            recorder,
            channels,
            objects,
            engine: Arc::new(engine),
            ticks: 0,
        })
    }

    /// Survey seconds recorded so far.
    pub fn survey_time(&self) -> f64 {
        self.ticks as f64 / TICKS_PER_S as f64
    }

    /// UTC of survey time `t`.
    pub fn utc(&self, t: f64) -> f64 {
        self.config.start_utc + t
    }

    /// Records one tick worth of sensor output and advances the clock.
    pub fn record_tick(&mut self) -> Result<(), SimError> {
        let t = self.survey_time();
        let phase = self.ticks % TICKS_PER_S;

        if phase == 0 {
            let fix = self.oracle.gnss_reading(t);
            let day = (fix.utc / DAY_S).floor() * DAY_S;
            let date = if self.config.sticky_date {
                (self.config.start_utc / DAY_S).floor() * DAY_S
            } else {
                day
            };
            let payload = Payload::Gnss {
                lat: fix.value.lat,
                lon: fix.value.lon,
                date: Some(date),
                tod: fix.utc - day,
            };
            self.recorder.write(GNSS_CHANNEL, fix.db_time, &payload)?;

            // Track marks are stamped in corrected time
            self.recorder.write(TRACK_CHANNEL, fix.utc, &Payload::TrackMark)?;
        }
        if phase % 5 == 0 {
            let heading = self.oracle.heading_reading(t);
            self.recorder
                .write(HEADING_CHANNEL, heading.db_time, &Payload::Scalar { value: heading.value, tod: None })?;
        }
        if phase == 5 {
            let depth = self.oracle.depth_reading(t);
            self.recorder
                .write(DEPTH_CHANNEL, depth.db_time, &Payload::Scalar { value: depth.value, tod: None })?;
        }

        self.ticks += 1;
        self.context.advance_time(Duration::from_secs_f64(1.0 / TICKS_PER_S as f64));
        Ok(())
    }

    /// Records until survey time reaches `until_s`.
    pub fn record_until(&mut self, until_s: f64) -> Result<(), SimError> {
        while self.survey_time() < until_s {
            self.record_tick()?;
        }
        debug!(
            "Recorded {:.1}s (clock {:?}, {} records)",
            self.survey_time(),
            self.context.now(),
            self.recorder.written()
        );
        Ok(())
    }

    /// Closes every channel.
    pub fn finish_recording(&self) {
        self.recorder.close(&ALL_CHANNELS);
    }

    /// Advances the engine until a pass makes no progress.
    pub fn settle(&self) -> SettleTally {
        settle(&self.engine)
    }

    /// Position errors of `source` against truth at the given survey times.
    pub fn position_errors(&self, source: SourceId, times: impl IntoIterator<Item = f64>, quality: f64) -> ErrorStats {
        self.probe(source, times, quality, |t, value| {
            let truth = self.oracle.truth_at(t);
            value.as_position().map(|p| haversine_m(p, truth.position))
        })
    }

    /// Heading errors (degrees) of an angular source.
    pub fn heading_errors(&self, source: SourceId, times: impl IntoIterator<Item = f64>) -> ErrorStats {
        self.probe(source, times, 0.0, |t, value| {
            let truth = self.oracle.truth_at(t);
            value.as_scalar().map(|h| bearing_delta_deg(h, truth.heading_deg))
        })
    }

    /// Depth errors (meters).
    pub fn depth_errors(&self, times: impl IntoIterator<Item = f64>) -> ErrorStats {
        self.probe(DEPTH, times, 0.0, |t, value| {
            let truth = self.oracle.truth_at(t);
            value.as_scalar().map(|d| (d - truth.depth_m).abs())
        })
    }

    /// Speed errors (m/s) of the derived speed source.
    pub fn speed_errors(&self, times: impl IntoIterator<Item = f64>) -> ErrorStats {
        self.probe(SPEED, times, 0.0, |t, value| {
            let truth = self.oracle.truth_at(t);
            value.as_scalar().map(|s| (s - truth.speed_mps).abs())
        })
    }

    fn probe<F>(&self, source: SourceId, times: impl IntoIterator<Item = f64>, quality: f64, error_of: F) -> ErrorStats
    where
        F: Fn(f64, FixValue) -> Option<f64>,
    {
        let mut stats = ErrorStats::default();
        for t in times {
            stats.probes += 1;
            match self.engine.query(source, self.utc(t), quality) {
                Ok(fix) => {
                    if let Some(e) = error_of(t, fix.value) {
                        stats.push(e);
                    }
                }
                Err(QueryError::Removed) => stats.removed += 1,
                Err(_) => {}
            }
        }
        stats.finish()
    }
}

/// What a run of overseer passes did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettleTally {
    pub passes: usize,
    pub malformed: usize,
    pub resets: Vec<SourceId>,
    /// The last pass still made progress
    pub progressed: bool,
}

impl SettleTally {
    pub fn absorb(&mut self, report: &AdvanceReport) {
        self.passes += 1;
        self.malformed += report.sources.iter().map(|r| r.malformed).sum::<usize>();
        self.resets.extend(report.resets.iter().copied());
        self.progressed = report.progressed();
    }
}

/// Advances `engine` until a pass makes no progress.
pub fn settle(engine: &FusionEngine) -> SettleTally {
    let mut tally = SettleTally::default();
    loop {
        tally.absorb(&engine.advance());
        if !tally.progressed || tally.passes >= 64 {
            return tally;
        }
    }
}

/// Probe times from `start` to `end` (survey seconds), off the sample grid.
pub fn probe_times(start: f64, end: f64, step: f64) -> Vec<f64> {
    let mut times = Vec::new();
    let mut t = start + 0.37;
    while t < end {
        times.push(t);
        t += step;
    }
    times
}
