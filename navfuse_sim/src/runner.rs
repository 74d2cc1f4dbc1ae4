//! Scenario runner - executes deterministic survey scenarios.

use crate::context::SIM_EPOCH_S;
use crate::error::SimError;
use crate::exporter::SimExport;
use crate::scenarios::ScenarioId;
use crate::world::{
    probe_times, settle, ErrorStats, SettleTally, SimConfig, SurveyWorld, COURSE, GNSS, HEADING, TICKS_PER_S,
    TRACK,
};

use navfuse_core::navfuse_time::DAY_S;
use navfuse_core::{FusionConfig, FusionEngine, Progress, QueryError, SampleSnapshot};
use navfuse_env::{EditDirective, SurveyContext, TokioContext};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Overseer passes executed
    pub total_passes: usize,

    /// Survey seconds recorded
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    /// Raw records written by the recorder
    pub records_written: u64,

    /// Records deliberately garbled
    pub records_corrupted: u64,

    /// Records the engine skipped as malformed
    pub malformed_skipped: usize,

    /// Final modification token
    pub mod_count: u64,

    /// Sources rewound by edits
    pub resets: usize,

    /// GNSS fused position vs truth (meters)
    pub position: ErrorStats,

    /// Computed track vs truth (meters)
    pub track: ErrorStats,

    /// Gyro heading vs truth (degrees)
    pub heading: ErrorStats,

    /// Course derived from the track vs truth (degrees)
    pub course: ErrorStats,

    /// Speed derived from GNSS vs truth (m/s)
    pub speed: ErrorStats,

    /// Depth vs truth (meters)
    pub depth: ErrorStats,

    /// Queries issued while recording (live ingest only)
    pub live_queries: u64,

    /// Of those, answered with a value
    pub live_answered: u64,
}

/// Accumulates failed assertions.
#[derive(Debug, Default)]
struct Checks {
    failures: Vec<String>,
}

impl Checks {
    fn check(&mut self, ok: bool, message: impl FnOnce() -> String) {
        if !ok {
            let message = message();
            debug!("  check failed: {}", message);
            self.failures.push(message);
        }
    }

    /// Standard accuracy bounds for a fused survey interval.
    fn accuracy(&mut self, label: &str, metrics: &ScenarioMetrics) {
        let p = &metrics.position;
        self.check(p.coverage() >= 0.99, || format!("{}: GNSS coverage {:.2}", label, p.coverage()));
        self.check(p.rms < 3.0, || format!("{}: GNSS RMS error {:.2}m exceeds threshold", label, p.rms));
        self.check(p.max < 10.0, || format!("{}: GNSS max error {:.2}m exceeds threshold", label, p.max));
        self.check(metrics.heading.rms < 5.0, || {
            format!("{}: heading RMS error {:.2}deg exceeds threshold", label, metrics.heading.rms)
        });
        self.check(metrics.depth.rms < 0.5, || {
            format!("{}: depth RMS error {:.2}m exceeds threshold", label, metrics.depth.rms)
        });
    }

    fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    fn reason(&self) -> Option<String> {
        if self.failures.is_empty() {
            None
        } else {
            Some(self.failures.join("; "))
        }
    }
}

/// Runs survey scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Survey duration in seconds
    max_duration_secs: f64,

    /// Query quality used by probes
    quality: f64,

    /// Engine configuration (time reference is forced to GNSS)
    engine: FusionConfig,

    /// Write a frame export of the final state here
    export_path: Option<PathBuf>,

    /// How the live-ingest tasks are paced
    pacing: LivePacing,
}

/// Pacing of the live-ingest tasks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LivePacing {
    /// Tasks yield between steps and run as fast as the scheduler allows.
    Virtual,
    /// Tasks sleep on a [`TokioContext`]; the survey plays `speedup` times
    /// faster than the wall clock.
    Realtime { speedup: f64 },
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            max_duration_secs: 300.0,
            quality: 0.5,
            engine: FusionConfig::default(),
            export_path: None,
            pacing: LivePacing::Virtual,
        }
    }

    /// Paces live ingest on the wall clock at the given speedup.
    pub fn with_realtime(mut self, speedup: f64) -> Self {
        self.pacing = LivePacing::Realtime { speedup };
        self
    }

    /// Sets the survey duration; scenarios need at least 60 s.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs.max(60.0);
        self
    }

    /// Sets both the pipeline and the probe quality.
    pub fn with_quality(mut self, quality: f64) -> Self {
        self.quality = quality.clamp(0.0, 1.0);
        self.engine.quality = self.quality;
        self
    }

    pub fn with_engine_config(mut self, config: FusionConfig) -> Self {
        self.quality = config.quality;
        self.engine = config;
        self
    }

    pub fn with_export(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_path = Some(path.into());
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        debug!("  {}", scenario.description());

        let outcome = match scenario {
            ScenarioId::SteadySurvey => self.run_steady_survey(),
            ScenarioId::MidnightCrossing => self.run_midnight_crossing(),
            ScenarioId::CorruptRecords => self.run_corrupt_records(),
            ScenarioId::BulkRemove => self.run_bulk_remove(),
            ScenarioId::TrackChange => self.run_track_change(),
            ScenarioId::LiveIngest => self.run_live_ingest(),
        };

        match outcome {
            Ok(result) => result,
            Err(e) => {
                error!("Scenario {} aborted: {}", scenario.name(), e);
                ScenarioResult {
                    scenario,
                    seed: self.seed,
                    passed: false,
                    total_passes: 0,
                    final_time_secs: 0.0,
                    failure_reason: Some(e.to_string()),
                    metrics: ScenarioMetrics::default(),
                }
            }
        }
    }

    fn sim_config(&self) -> SimConfig {
        let mut config = SimConfig {
            seed: self.seed,
            ..SimConfig::default()
        };
        config.engine = FusionConfig {
            time_reference: Some(GNSS),
            ..self.engine.clone()
        };
        config
    }

    /// Probes every source over survey times `[start, end)`.
    fn measure(&self, world: &SurveyWorld, start: f64, end: f64, metrics: &mut ScenarioMetrics) {
        metrics.position = world.position_errors(GNSS, probe_times(start, end, 1.0), self.quality);
        metrics.track = world.position_errors(TRACK, probe_times(start, end, 1.0), self.quality);
        metrics.heading = world.heading_errors(HEADING, probe_times(start, end, 1.0));
        metrics.course = world.heading_errors(COURSE, probe_times(start, end, 2.0));
        metrics.speed = world.speed_errors(probe_times(start, end, 2.0));
        metrics.depth = world.depth_errors(probe_times(start, end, 1.0));

        debug!(
            "  GNSS rms={:.2}m max={:.2}m | track rms={:.2}m | heading rms={:.2}° | cog rms={:.2}° | sog rms={:.2}m/s | depth rms={:.3}m",
            metrics.position.rms,
            metrics.position.max,
            metrics.track.rms,
            metrics.heading.rms,
            metrics.course.rms,
            metrics.speed.rms,
            metrics.depth.rms
        );
    }

    fn finish(
        &self,
        scenario: ScenarioId,
        world: &SurveyWorld,
        tally: &SettleTally,
        checks: Checks,
        mut metrics: ScenarioMetrics,
    ) -> ScenarioResult {
        metrics.records_written = world.recorder.written();
        metrics.records_corrupted = world.recorder.corrupted();
        metrics.malformed_skipped = tally.malformed;
        metrics.mod_count = world.engine.mod_count();
        metrics.resets = tally.resets.len();

        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed: checks.passed(),
            total_passes: tally.passes,
            final_time_secs: world.survey_time(),
            failure_reason: checks.reason(),
            metrics,
        };

        if let Some(path) = &self.export_path {
            let mut export = SimExport::new(scenario.name(), self.seed);
            export.capture(world, &probe_times(0.0, world.survey_time(), 1.0), self.quality);
            for source in &tally.resets {
                export.add_event(world.survey_time(), format!("reset {}", source));
            }
            export.finalize(result.passed, Some(result.metrics.position.rms));
            match export.write_to_file(path) {
                Ok(()) => info!("Exported {} frames to {}", export.frames.len(), path.display()),
                Err(e) => error!("Failed to write export: {}", e),
            }
        }

        result
    }

    /// Every stored source must be fully processed once recording ended.
    fn check_drained(world: &SurveyWorld, checks: &mut Checks) {
        for source in world.engine.sources() {
            let p = source.progress();
            checks.check(p.holds(), || format!("{}: progress invariant broken: {:?}", source.id(), p));
            if source.descriptor().channel.is_some() {
                checks.check(p.processed == p.assembled, || {
                    format!("{}: {} of {} samples processed", source.id(), p.processed, p.assembled)
                });
            }
        }
    }

    /// NAV-001: SteadySurvey - record, close, fuse, compare with truth.
    fn run_steady_survey(&self) -> Result<ScenarioResult, SimError> {
        let duration = self.max_duration_secs;
        let mut world = SurveyWorld::new(self.sim_config())?;
        world.record_until(duration)?;
        world.finish_recording();
        let tally = world.settle();

        let mut checks = Checks::default();
        let mut metrics = ScenarioMetrics::default();
        Self::check_drained(&world, &mut checks);
        self.measure(&world, 5.0, duration - 5.0, &mut metrics);
        checks.accuracy("steady", &metrics);
        checks.check(tally.malformed <= 2, || format!("{} records skipped on a clean run", tally.malformed));

        Ok(self.finish(ScenarioId::SteadySurvey, &world, &tally, checks, metrics))
    }

    /// NAV-002: MidnightCrossing - the GNSS date never advances.
    fn run_midnight_crossing(&self) -> Result<ScenarioResult, SimError> {
        let duration = self.max_duration_secs;
        let config = SimConfig {
            start_utc: SIM_EPOCH_S as f64 + DAY_S - duration * 0.5,
            sticky_date: true,
            ..self.sim_config()
        };
        let mut world = SurveyWorld::new(config)?;
        world.record_until(duration)?;
        world.finish_recording();
        let tally = world.settle();

        let mut checks = Checks::default();
        let mut metrics = ScenarioMetrics::default();
        Self::check_drained(&world, &mut checks);

        // Corrected time must run straight through midnight
        if let Some(SampleSnapshot::Position(samples)) = world.engine.samples(GNSS) {
            let worst_gap = samples
                .windows(2)
                .map(|w| w[1].corrected_time - w[0].corrected_time)
                .fold(0.0, f64::max);
            checks.check(worst_gap < 1.5, || format!("corrected time jumps by {:.1}s", worst_gap));
            if let Some(last) = samples.last() {
                let expected = world.utc(duration - 1.0);
                checks.check((last.corrected_time - expected).abs() < 1.0, || {
                    format!("last fix at {:.1}, expected {:.1}", last.corrected_time, expected)
                });
            }
        }

        self.measure(&world, 5.0, duration - 5.0, &mut metrics);
        checks.accuracy("midnight", &metrics);

        Ok(self.finish(ScenarioId::MidnightCrossing, &world, &tally, checks, metrics))
    }

    /// NAV-003: CorruptRecords - garbage is skipped, never retried.
    fn run_corrupt_records(&self) -> Result<ScenarioResult, SimError> {
        let duration = self.max_duration_secs;
        let config = SimConfig {
            corrupt_rate: 0.1,
            ..self.sim_config()
        };
        let mut world = SurveyWorld::new(config)?;

        // Fuse while recording, as the survey would
        let mut tally = SettleTally::default();
        let mut t = 0.0;
        while t < duration {
            t = (t + 30.0).min(duration);
            world.record_until(t)?;
            let step = world.settle();
            tally.passes += step.passes;
            tally.malformed += step.malformed;
        }
        world.finish_recording();
        let last = world.settle();
        tally.passes += last.passes;
        tally.malformed += last.malformed;

        let corrupted = world.recorder.corrupted() as usize;
        let mut checks = Checks::default();
        let mut metrics = ScenarioMetrics::default();
        Self::check_drained(&world, &mut checks);
        checks.check(corrupted > 0, || "no record was corrupted".to_string());
        // Track marks past either end of the base are skipped too
        checks.check(tally.malformed >= corrupted && tally.malformed <= corrupted + 4, || {
            format!("{} records skipped for {} corrupted", tally.malformed, corrupted)
        });

        self.measure(&world, 5.0, duration - 5.0, &mut metrics);
        checks.accuracy("corrupt", &metrics);

        Ok(self.finish(ScenarioId::CorruptRecords, &world, &tally, checks, metrics))
    }

    /// NAV-004: BulkRemove - an edit lands on already-fused history.
    fn run_bulk_remove(&self) -> Result<ScenarioResult, SimError> {
        let duration = self.max_duration_secs;
        let (cut_start, cut_end) = (duration * 0.4, duration * 0.4 + 30.0);
        let mut world = SurveyWorld::new(self.sim_config())?;
        world.record_until(duration)?;
        world.finish_recording();
        let mut tally = world.settle();

        let mut checks = Checks::default();
        let inside = probe_times(cut_start + 1.0, cut_end - 1.0, 1.0);
        let before = world.position_errors(GNSS, inside.iter().copied(), self.quality);
        checks.check(before.answered == before.probes, || "range not fused before the edit".to_string());

        let mod_before = world.engine.mod_count();
        world.objects.push(EditDirective::BulkRemove {
            sources: Vec::new(),
            start: world.utc(cut_start),
            end: world.utc(cut_end),
        });
        let after_edit = world.settle();
        tally.passes += after_edit.passes;
        tally.malformed += after_edit.malformed;
        tally.resets = after_edit.resets.clone();

        checks.check(!after_edit.resets.is_empty(), || "edit on fused history reset nothing".to_string());
        checks.check(world.engine.mod_count() > mod_before, || "mod_count did not move".to_string());
        Self::check_drained(&world, &mut checks);

        for (label, stats) in [
            ("gnss", world.position_errors(GNSS, inside.iter().copied(), self.quality)),
            ("heading", world.heading_errors(HEADING, inside.iter().copied())),
            ("depth", world.depth_errors(inside.iter().copied())),
        ] {
            checks.check(stats.removed == stats.probes, || {
                format!("{}: {} of {} probes inside the cut reported Removed", label, stats.removed, stats.probes)
            });
        }

        // Outside the cut nothing changes
        let mut metrics = ScenarioMetrics::default();
        let mut outside = probe_times(5.0, cut_start - 2.0, 1.0);
        outside.extend(probe_times(cut_end + 2.0, duration - 5.0, 1.0));
        metrics.position = world.position_errors(GNSS, outside.iter().copied(), self.quality);
        metrics.heading = world.heading_errors(HEADING, outside.iter().copied());
        metrics.depth = world.depth_errors(outside.iter().copied());
        checks.accuracy("bulk_remove", &metrics);

        Ok(self.finish(ScenarioId::BulkRemove, &world, &tally, checks, metrics))
    }

    /// NAV-005: TrackChange - history before the change is gone.
    fn run_track_change(&self) -> Result<ScenarioResult, SimError> {
        let duration = self.max_duration_secs;
        let change_at = (duration * 0.5).floor();
        let mut world = SurveyWorld::new(self.sim_config())?;
        world.record_until(change_at)?;
        let mut tally = world.settle();

        let session = world.engine.change_track();
        info!("  Track change at t={:.0}s: session #{}", change_at, session.number);

        world.record_until(duration)?;
        world.finish_recording();
        let rest = world.settle();
        tally.passes += rest.passes;
        tally.malformed += rest.malformed;

        let mut checks = Checks::default();
        let mut metrics = ScenarioMetrics::default();
        checks.check(session.number == 1, || format!("session number {}", session.number));
        checks.check(world.engine.session() == session, || "session changed again".to_string());
        Self::check_drained(&world, &mut checks);

        let gnss = world.engine.progress(GNSS).unwrap_or_default();
        checks.check(gnss.base_offset == change_at as u64, || {
            format!("GNSS restarted at record {}, expected {}", gnss.base_offset, change_at)
        });

        let old = world.position_errors(GNSS, probe_times(5.0, change_at - 5.0, 1.0), self.quality);
        checks.check(old.answered == 0, || format!("{} probes answered from the dropped track", old.answered));

        self.measure(&world, change_at + 5.0, duration - 5.0, &mut metrics);
        checks.accuracy("track_change", &metrics);

        Ok(self.finish(ScenarioId::TrackChange, &world, &tally, checks, metrics))
    }

    /// NAV-006: LiveIngest - recorder, overseer and a reader in parallel.
    fn run_live_ingest(&self) -> Result<ScenarioResult, SimError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(3)
            .enable_all()
            .build()?;
        let world = SurveyWorld::new(self.sim_config())?;
        match self.pacing {
            LivePacing::Virtual => {
                let pacer = world.context.clone();
                runtime.block_on(self.live_ingest(world, pacer, None))
            }
            LivePacing::Realtime { speedup } => {
                let pacer = TokioContext::shared(speedup);
                info!("  Live ingest on the wall clock at {}x", pacer.speedup());
                let tick = Duration::from_secs_f64(1.0 / TICKS_PER_S as f64);
                runtime.block_on(self.live_ingest(world, pacer, Some(tick)))
            }
        }
    }

    /// Runs the three live tasks on `pacer`. With a `step`, every task
    /// sleeps that much survey time between steps; otherwise tasks yield.
    async fn live_ingest<C: SurveyContext>(
        &self,
        mut world: SurveyWorld,
        pacer: Arc<C>,
        step: Option<Duration>,
    ) -> Result<ScenarioResult, SimError> {
        let duration = self.max_duration_secs;
        let engine = world.engine.clone();
        let start_utc = world.utc(0.0);

        let recording = Arc::new(AtomicBool::new(true));
        let fusing = Arc::new(AtomicBool::new(true));

        // Writer: owns the world until the recording is closed
        let (world_tx, world_rx) = oneshot::channel();
        let writer_flag = recording.clone();
        let writer_pacer = pacer.clone();
        pacer.spawn("recorder", async move {
            let mut result = Ok(());
            while world.survey_time() < duration {
                if let Err(e) = world.record_tick() {
                    result = Err(e);
                    break;
                }
                if step.is_some() || world.survey_time().fract() == 0.0 {
                    pause(writer_pacer.as_ref(), step).await;
                }
            }
            world.finish_recording();
            writer_flag.store(false, Ordering::Release);
            let _ = world_tx.send(result.map(|()| world));
        });

        // Overseer: polls until recording ended and a pass is idle
        let (tally_tx, tally_rx) = oneshot::channel();
        let overseer_engine = engine.clone();
        let overseer_flags = (recording.clone(), fusing.clone());
        let overseer_pacer = pacer.clone();
        pacer.spawn("overseer", async move {
            let mut tally = SettleTally::default();
            loop {
                let still_recording = overseer_flags.0.load(Ordering::Acquire);
                tally.absorb(&overseer_engine.advance());
                if !still_recording && !tally.progressed {
                    break;
                }
                pause(overseer_pacer.as_ref(), step).await;
            }
            overseer_flags.1.store(false, Ordering::Release);
            let _ = tally_tx.send(tally);
        });

        // Reader: queries the fused head and checks that final output never moves
        let (reader_tx, reader_rx) = oneshot::channel();
        let reader_engine = engine.clone();
        let reader_flag = fusing.clone();
        let reader_pacer = pacer.clone();
        pacer.spawn("reader", async move {
            let mut probe = LiveProbe::new(start_utc);
            while reader_flag.load(Ordering::Acquire) {
                probe.observe(&reader_engine);
                pause(reader_pacer.as_ref(), step).await;
            }
            probe.observe(&reader_engine);
            let _ = reader_tx.send(probe);
        });

        let world = world_rx
            .await
            .map_err(|_| SimError::Task("recorder task dropped".into()))??;
        let tally = tally_rx
            .await
            .map_err(|_| SimError::Task("overseer task dropped".into()))?;
        let probe = reader_rx
            .await
            .map_err(|_| SimError::Task("reader task dropped".into()))?;

        // Anything the live overseer left behind
        let rest = settle(&world.engine);
        let tally = SettleTally {
            passes: tally.passes + rest.passes,
            malformed: tally.malformed + rest.malformed,
            ..tally
        };
        info!(
            "  Live ingest: {} passes, {} queries ({} answered) in {:.1}s of context time",
            tally.passes,
            probe.queries,
            probe.answered,
            pacer.now().as_secs_f64()
        );

        let mut checks = Checks::default();
        let mut metrics = ScenarioMetrics {
            live_queries: probe.queries,
            live_answered: probe.answered,
            ..ScenarioMetrics::default()
        };
        for violation in &probe.violations {
            warn!("  live violation: {}", violation);
        }
        checks.check(probe.violations.is_empty(), || {
            format!("{} live invariant violations", probe.violations.len())
        });
        checks.check(probe.answered > 0, || "no live query was ever answered".to_string());
        Self::check_drained(&world, &mut checks);

        self.measure(&world, 5.0, duration - 5.0, &mut metrics);
        checks.accuracy("live", &metrics);

        Ok(self.finish(ScenarioId::LiveIngest, &world, &tally, checks, metrics))
    }
}

/// Sleeps one survey step on the pacer, or yields when unpaced.
async fn pause<C: SurveyContext>(pacer: &C, step: Option<Duration>) {
    match step {
        Some(step) => pacer.sleep(step).await,
        None => tokio::task::yield_now().await,
    }
}

// ============================================================================
// LIVE READER
// ============================================================================

/// Reader-side view of a growing engine.
struct LiveProbe {
    start_utc: f64,
    last_progress: Progress,
    last_mod_count: u64,

    /// Final GNSS samples seen so far
    finals: Vec<navfuse_core::PositionSample>,

    queries: u64,
    answered: u64,
    violations: Vec<String>,
}

impl LiveProbe {
    fn new(start_utc: f64) -> Self {
        Self {
            start_utc,
            last_progress: Progress::default(),
            last_mod_count: 0,
            finals: Vec::new(),
            queries: 0,
            answered: 0,
            violations: Vec::new(),
        }
    }

    fn observe(&mut self, engine: &FusionEngine) {
        let mod_count = engine.mod_count();
        if mod_count < self.last_mod_count {
            self.violations.push(format!("mod_count went back {} -> {}", self.last_mod_count, mod_count));
        }
        self.last_mod_count = mod_count;

        let Some(progress) = engine.progress(GNSS) else {
            return;
        };
        if !progress.holds() {
            self.violations.push(format!("progress invariant broken: {:?}", progress));
        }
        let last = self.last_progress;
        if progress.processed < last.processed || progress.aligned < last.aligned || progress.assembled < last.assembled {
            self.violations.push(format!("progress went back: {:?} -> {:?}", last, progress));
        }
        self.last_progress = progress;

        // Samples below the processed mark read before the snapshot are final
        if let Some(SampleSnapshot::Position(samples)) = engine.samples(GNSS) {
            let known = self.finals.len().min(samples.len());
            if samples[..known] != self.finals[..known] {
                self.violations.push(format!("final samples changed below index {}", known));
            }
            let upto = progress.processed.min(samples.len());
            if upto > self.finals.len() {
                self.finals.extend_from_slice(&samples[self.finals.len()..upto]);
            }
        }

        // Query just behind the fused head, and somewhere in the past
        let Some(head) = self.finals.last().map(|s| s.corrected_time) else {
            return;
        };
        for time in [head - 0.5, (self.start_utc + head) * 0.5] {
            self.queries += 1;
            match engine.query(GNSS, time, 0.5) {
                Ok(_) => self.answered += 1,
                Err(QueryError::NotYetAvailable) | Err(QueryError::OutOfRange) => {}
                Err(e) => self.violations.push(format!("query at {:.1}: {}", time, e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> ScenarioRunner {
        ScenarioRunner::new(42).with_duration(240.0)
    }

    #[test]
    fn test_steady_survey_passes() {
        let result = runner().run(ScenarioId::SteadySurvey);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.position.rms < 3.0);
        assert_eq!(result.metrics.records_corrupted, 0);
    }

    #[test]
    fn test_midnight_crossing_passes() {
        let result = runner().run(ScenarioId::MidnightCrossing);
        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[test]
    fn test_corrupt_records_are_counted() {
        let result = runner().run(ScenarioId::CorruptRecords);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.records_corrupted > 0);
    }

    #[test]
    fn test_bulk_remove_resets_and_hides() {
        let result = runner().run(ScenarioId::BulkRemove);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.resets > 0);
    }

    #[test]
    fn test_track_change_drops_history() {
        let result = runner().run(ScenarioId::TrackChange);
        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[test]
    fn test_live_ingest_concurrent_readers() {
        let result = ScenarioRunner::new(7).with_duration(120.0).run(ScenarioId::LiveIngest);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.live_queries > 0);
    }

    #[test]
    fn test_live_ingest_on_wall_clock() {
        let runner = ScenarioRunner::new(7).with_duration(90.0).with_realtime(300.0);
        assert_eq!(runner.pacing, LivePacing::Realtime { speedup: 300.0 });

        let result = runner.run(ScenarioId::LiveIngest);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.live_answered > 0);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let a = runner().run(ScenarioId::SteadySurvey);
        let b = runner().run(ScenarioId::SteadySurvey);
        assert_eq!(a.metrics.position.rms, b.metrics.position.rms);
        assert_eq!(a.metrics.records_written, b.metrics.records_written);
    }
}
