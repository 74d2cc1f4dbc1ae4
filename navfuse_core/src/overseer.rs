//! The Overseer - Poll-Driven Fusion Engine
//!
//! [`FusionEngine`] owns every attached [`Source`] and, on each call to
//! [`FusionEngine::advance`], pushes every source through its stage plan as
//! far as the currently available raw data allows:
//!
//! ```text
//!   Idle -> Assemble -> Align -> Smooth (positions) -> Process/Simplify -> Idle
//! ```
//!
//! A pass never blocks: a stage that runs out of input simply reports no
//! progress and the next pass resumes from the stored high-water marks.
//!
//! ## Concurrency
//!
//! Passes are serialized by an internal guard. Queries may run from any
//! thread at any time: each source's log and counters sit behind one
//! reader-writer lock, and queries only read the processed prefix, which
//! stages never touch again.
//!
//! ## Layering
//!
//! Computed sources read their base through the getter. The base must be
//! attached first, so the dependency graph is acyclic by construction and a
//! pass visits every base before its dependents.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use navfuse_env::{ChannelStore, EditDirective, ObjectStore, OverrideValue, SourceId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assembler::{Assembler, BaseLookup, RecordParser};
use crate::config::FusionConfig;
use crate::edits::EditBook;
use crate::error::{FusionError, QueryError};
use crate::navfuse_query::{query_derived, query_position, query_scalar, Derived, Fix, FixValue};
use crate::navfuse_simplify::{simplify_distance, simplify_min_heading, HeadingSearch, SimplifyWindow};
use crate::navfuse_smooth::smooth_third;
use crate::record_log::{LatLon, PositionSample, RecordLog, ScalarSample, Validity};
use crate::source::{
    AlignMode, Progress, SampleKind, SimplifyVariant, Source, SourceDescriptor, SourceKind, SourceLog,
    SourceState, StagePlan, ValueShape,
};

// ============================================================================
// REPORTS & SNAPSHOTS
// ============================================================================

/// One contiguous survey line; a track change opens a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSession {
    pub id: Uuid,
    /// Sessions opened since the engine was created (first is 0)
    pub number: u32,
}

impl TrackSession {
    fn open(number: u32) -> Self {
        Self { id: Uuid::new_v4(), number }
    }
}

/// Stage deltas of one source over one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: SourceId,
    pub assembled: usize,
    pub aligned: usize,
    pub preprocessed: usize,
    pub processed: usize,
    /// Raw records skipped as malformed
    pub malformed: usize,
    /// Assembly stopped at a record waiting for its base
    pub blocked: bool,
    /// The channel store failed for this source
    pub failed: bool,
}

impl SourceReport {
    fn new(source: SourceId) -> Self {
        Self {
            source,
            assembled: 0,
            aligned: 0,
            preprocessed: 0,
            processed: 0,
            malformed: 0,
            blocked: false,
            failed: false,
        }
    }

    /// True if any counter moved.
    pub fn progressed(&self) -> bool {
        self.assembled + self.aligned + self.preprocessed + self.processed + self.malformed > 0
    }
}

/// Summary of one [`FusionEngine::advance`] pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvanceReport {
    pub session: Uuid,
    /// Edit directives picked up in this pass
    pub new_directives: usize,
    /// Sources rewound because an edit touched processed history
    pub resets: Vec<SourceId>,
    pub sources: Vec<SourceReport>,
    /// Modification token after the pass
    pub mod_count: u64,
}

impl AdvanceReport {
    /// True if the pass changed anything observable.
    pub fn progressed(&self) -> bool {
        self.new_directives > 0 || !self.resets.is_empty() || self.sources.iter().any(SourceReport::progressed)
    }

    pub fn source(&self, id: SourceId) -> Option<&SourceReport> {
        self.sources.iter().find(|r| r.source == id)
    }
}

/// Copy of a source's record log, for inspection and export.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleSnapshot {
    Scalar(Vec<ScalarSample>),
    Position(Vec<PositionSample>),
    /// Derived on demand; nothing stored
    Derived,
}

impl SampleSnapshot {
    pub fn len(&self) -> usize {
        match self {
            SampleSnapshot::Scalar(s) => s.len(),
            SampleSnapshot::Position(s) => s.len(),
            SampleSnapshot::Derived => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// BASE LOOKUP
// ============================================================================

/// Getter view of a base source, handed to the parser of its dependents.
struct BaseView<'a> {
    source: &'a Source,
    /// The base will never receive another sample
    finished: bool,
    quality: f64,
    exact_window: f64,
}

impl BaseLookup for BaseView<'_> {
    fn position_at(&self, time: f64) -> Result<LatLon, QueryError> {
        let state = self.source.state().read();
        let SourceLog::Position(log) = &state.log else {
            return Err(QueryError::NotQueryable(self.source.descriptor().kind));
        };

        state.removed.check(time)?;
        match query_position(log, &state.progress, time, self.quality, self.exact_window) {
            Ok((p, _)) => Ok(p),
            Err(QueryError::OutOfRange) if !self.finished => {
                let before_start = state.progress.aligned > 0
                    && log.get(0).map_or(false, |first| time < first.corrected_time);
                if before_start {
                    Err(QueryError::OutOfRange)
                } else {
                    // The base may still grow to cover it
                    Err(QueryError::NotYetAvailable)
                }
            }
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// DEPENDENCY ORDER
// ============================================================================

/// Orders descriptors so every base and the time reference precede their
/// dependents (Kahn's algorithm, stable with respect to input order).
pub fn dependency_order(
    descriptors: Vec<SourceDescriptor>,
    time_reference: Option<SourceId>,
) -> Result<Vec<SourceDescriptor>, FusionError> {
    let mut position: HashMap<SourceId, usize> = HashMap::with_capacity(descriptors.len());
    for (i, d) in descriptors.iter().enumerate() {
        if position.insert(d.id, i).is_some() {
            return Err(FusionError::DuplicateSource(d.id));
        }
    }
    if let Some(r) = time_reference {
        if !position.contains_key(&r) {
            return Err(FusionError::UnknownSource(r));
        }
    }

    let n = descriptors.len();
    let mut indegree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (i, d) in descriptors.iter().enumerate() {
        if let Some(base) = d.base {
            let &j = position
                .get(&base)
                .ok_or(FusionError::UnknownBase { id: d.id, base })?;
            dependents[j].push(i);
            indegree[i] += 1;
        }
        if let Some(r) = time_reference {
            if r != d.id && d.kind.stage_plan().align == AlignMode::External {
                dependents[position[&r]].push(i);
                indegree[i] += 1;
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(i) = ready.pop_front() {
        order.push(i);
        for &k in &dependents[i] {
            indegree[k] -= 1;
            if indegree[k] == 0 {
                ready.push_back(k);
            }
        }
    }

    if order.len() < n {
        let stuck = (0..n)
            .filter(|&i| indegree[i] > 0)
            .map(|i| descriptors[i].id)
            .collect();
        return Err(FusionError::DependencyCycle(stuck));
    }

    let mut slots: Vec<Option<SourceDescriptor>> = descriptors.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

// ============================================================================
// FUSION ENGINE
// ============================================================================

/// State only touched inside a pass or a track change.
struct PassState {
    edits: EditBook,
    session: TrackSession,
}

/// Incremental navigation-log fusion engine.
pub struct FusionEngine {
    config: FusionConfig,
    channels: Arc<dyn ChannelStore>,
    objects: Arc<dyn ObjectStore>,
    parser: Arc<dyn RecordParser>,

    /// Attached sources, in attach (= dependency) order
    sources: Vec<Source>,
    index: HashMap<SourceId, usize>,

    /// Serializes passes and track changes
    pass: Mutex<PassState>,

    mod_count: AtomicU64,
}

impl FusionEngine {
    /// Creates an engine with no sources attached.
    pub fn new(
        config: FusionConfig,
        channels: Arc<dyn ChannelStore>,
        objects: Arc<dyn ObjectStore>,
        parser: Arc<dyn RecordParser>,
    ) -> Result<Self, FusionError> {
        config.validate()?;
        let session = TrackSession::open(0);
        info!("Fusion engine up, track session {}", session.id);
        Ok(Self {
            config,
            channels,
            objects,
            parser,
            sources: Vec::new(),
            index: HashMap::new(),
            pass: Mutex::new(PassState {
                edits: EditBook::new(),
                session,
            }),
            mod_count: AtomicU64::new(0),
        })
    }

    /// Creates an engine and attaches `descriptors` in dependency order.
    pub fn from_config(
        config: FusionConfig,
        descriptors: Vec<SourceDescriptor>,
        channels: Arc<dyn ChannelStore>,
        objects: Arc<dyn ObjectStore>,
        parser: Arc<dyn RecordParser>,
    ) -> Result<Self, FusionError> {
        let ordered = dependency_order(descriptors, config.time_reference)?;
        let mut engine = Self::new(config, channels, objects, parser)?;
        for descriptor in ordered {
            engine.attach(descriptor)?;
        }
        Ok(engine)
    }

    /// Attaches a source. Computed sources require their base to be attached.
    pub fn attach(&mut self, descriptor: SourceDescriptor) -> Result<SourceId, FusionError> {
        let id = descriptor.id;
        let kind = descriptor.kind;
        if self.index.contains_key(&id) {
            return Err(FusionError::DuplicateSource(id));
        }

        let invalid = |reason| FusionError::InvalidDescriptor { id, kind, reason };
        let plan = kind.stage_plan();
        match plan.origin {
            SourceKind::Raw => {
                if descriptor.channel.is_none() {
                    return Err(invalid("raw kinds read a channel"));
                }
                if descriptor.base.is_some() {
                    return Err(invalid("raw kinds take no base"));
                }
            }
            SourceKind::Computed => {
                let base = descriptor.base.ok_or_else(|| invalid("computed kinds need a base"))?;
                if base == id {
                    return Err(FusionError::DependencyCycle(vec![id]));
                }
                let base_source = self.source(base).ok_or(FusionError::UnknownBase { id, base })?;
                if !base_source.descriptor().kind.is_position_like() {
                    return Err(FusionError::BaseNotPosition { id, base });
                }
                match (plan.shape, descriptor.channel) {
                    (ValueShape::Derived, Some(_)) => return Err(invalid("derived kinds have no channel")),
                    (ValueShape::Position, None) => return Err(invalid("track kinds need a cadence channel")),
                    _ => {}
                }
            }
        }

        let base_offset = match descriptor.channel {
            Some(channel) => self.channels.get_data_range(channel)?.0,
            None => 0,
        };

        info!("Attached {} '{}' ({:?}) at record {}", id, descriptor.name, kind, base_offset);
        self.index.insert(id, self.sources.len());
        self.sources
            .push(Source::new(descriptor, self.config.log_block_size, base_offset));
        self.bump();
        Ok(id)
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn source(&self, id: SourceId) -> Option<&Source> {
        self.index.get(&id).and_then(|&i| self.sources.get(i))
    }

    /// Attached sources in dependency order.
    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    pub fn progress(&self, id: SourceId) -> Option<Progress> {
        self.source(id).map(Source::progress)
    }

    /// Copy of a source's record log.
    pub fn samples(&self, id: SourceId) -> Option<SampleSnapshot> {
        let source = self.source(id)?;
        let state = source.state().read();
        Some(match &state.log {
            SourceLog::Scalar(log) => SampleSnapshot::Scalar(log.slice(0, log.len()).to_vec()),
            SourceLog::Position(log) => SampleSnapshot::Position(log.slice(0, log.len()).to_vec()),
            SourceLog::Derived => SampleSnapshot::Derived,
        })
    }

    /// Opaque token that changes whenever any output may have changed.
    pub fn mod_count(&self) -> u64 {
        self.mod_count.load(Ordering::Acquire)
    }

    pub fn session(&self) -> TrackSession {
        self.pass.lock().session
    }

    fn bump(&self) -> u64 {
        self.mod_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    // ========================================================================
    // PASS
    // ========================================================================

    /// Runs one overseer pass over every source.
    pub fn advance(&self) -> AdvanceReport {
        let mut pass = self.pass.lock();

        let first_new = pass.edits.poll(self.objects.as_ref());
        let new_directives = pass.edits.len() - first_new;
        let resets = if new_directives > 0 {
            debug!("Picked up {} edit directive(s)", new_directives);
            self.publish_removals(&pass.edits.directives()[first_new..]);
            self.reset_touched(&pass.edits.directives()[first_new..])
        } else {
            Vec::new()
        };

        let sources: Vec<SourceReport> = self
            .sources
            .iter()
            .map(|source| self.advance_source(source, &pass.edits))
            .collect();

        let mut report = AdvanceReport {
            session: pass.session.id,
            new_directives,
            resets,
            sources,
            mod_count: self.mod_count(),
        };
        if report.progressed() {
            report.mod_count = self.bump();
        }
        report
    }

    /// Hides bulk-removed ranges from queries, whether or not a stored
    /// sample falls inside them.
    fn publish_removals(&self, directives: &[EditDirective]) {
        for directive in directives {
            let EditDirective::BulkRemove { start, end, .. } = directive else {
                continue;
            };
            for source in self.sources.iter().filter(|s| directive.applies_to(s.id())) {
                source.state().write().removed.insert(*start, *end);
            }
        }
    }

    /// Resets every source whose processed history a directive touches,
    /// plus all sources computed from them. `base_offset` is kept.
    fn reset_touched(&self, directives: &[EditDirective]) -> Vec<SourceId> {
        let window = self.config.exact_window_s;
        let mut affected: Vec<SourceId> = self
            .sources
            .iter()
            .filter(|source| {
                let id = source.id();
                let state = source.state().read();
                let processed = state.progress.processed;
                directives.iter().any(|d| match d {
                    EditDirective::PointOverride { source: s, db_time, .. } => {
                        *s == id && state.log.any_before(processed, |db, _| (db - db_time).abs() <= window)
                    }
                    EditDirective::BulkRemove { start, end, .. } => {
                        d.applies_to(id) && state.log.any_before(processed, |_, t| t >= *start && t <= *end)
                    }
                })
            })
            .map(Source::id)
            .collect();

        // Dependents follow their base
        let mut i = 0;
        while i < affected.len() {
            let base = affected[i];
            for source in &self.sources {
                if source.descriptor().base == Some(base) && !affected.contains(&source.id()) {
                    affected.push(source.id());
                }
            }
            i += 1;
        }

        for id in &affected {
            if let Some(source) = self.source(*id) {
                let mut state = source.state().write();
                let offset = state.progress.base_offset;
                state.reset(offset);
                info!("Reset {} '{}' to rebuild edited history", id, source.descriptor().name);
            }
        }
        affected
    }

    /// True once no further raw record can arrive for the source.
    fn input_closed(&self, source: &Source, state: &SourceState) -> bool {
        match source.descriptor().channel {
            None => true,
            Some(channel) => {
                !self.channels.is_writable(channel)
                    && self
                        .channels
                        .get_data_range(channel)
                        .map_or(false, |(_, last)| state.progress.raw_cursor >= last)
            }
        }
    }

    /// True once a source's output is complete.
    fn finished(&self, source: &Source) -> bool {
        let state = source.state().read();
        self.input_closed(source, &state) && state.progress.processed == state.progress.assembled
    }

    fn advance_source(&self, source: &Source, edits: &EditBook) -> SourceReport {
        let descriptor = source.descriptor();
        let plan = source.plan();
        let mut report = SourceReport::new(descriptor.id);
        if plan.shape == ValueShape::Derived {
            return report;
        }

        let base = descriptor.base.and_then(|b| self.source(b)).map(|b| BaseView {
            finished: self.finished(b),
            source: b,
            quality: self.config.quality,
            exact_window: self.config.exact_window_s,
        });

        let mut state = source.state().write();
        let before = state.progress;

        // ASSEMBLE
        let assembler = Assembler {
            channels: self.channels.as_ref(),
            parser: self.parser.as_ref(),
            edits,
            exact_window: self.config.exact_window_s,
        };
        match assembler.run(descriptor, &mut state, base.as_ref().map(|b| b as &dyn BaseLookup)) {
            Ok(step) => {
                report.malformed = step.malformed;
                report.blocked = step.blocked;
            }
            Err(e) => {
                warn!("{} '{}': channel store error: {}", descriptor.id, descriptor.name, e);
                report.failed = true;
            }
        }

        // ALIGN
        self.align(source, &mut state);

        // SMOOTH
        let closed = self.input_closed(source, &state);
        self.preprocess(plan, &mut state, closed);

        // PROCESS
        self.process(source, &mut state, edits, closed);

        let after = state.progress;
        debug_assert!(after.holds(), "progress invariant broken for {}: {:?}", descriptor.id, after);

        report.assembled = after.assembled.saturating_sub(before.assembled);
        report.aligned = after.aligned.saturating_sub(before.aligned);
        report.preprocessed = after.preprocessed.saturating_sub(before.preprocessed);
        report.processed = after.processed.saturating_sub(before.processed);
        if report.progressed() {
            debug!(
                "{}: assembled={} aligned={} preprocessed={} processed={}",
                descriptor.id, after.assembled, after.aligned, after.preprocessed, after.processed
            );
        }
        report
    }

    // ========================================================================
    // ALIGN
    // ========================================================================

    /// Drift shift borrowed from the time reference for a sample that
    /// carries no external time. `None` means wait.
    fn borrowed_shift(&self, id: SourceId, db_time: f64) -> Option<f64> {
        let reference = match self.config.time_reference {
            Some(r) if r != id => r,
            _ => return Some(0.0),
        };
        let Some(source) = self.source(reference) else {
            return Some(0.0);
        };

        let state = source.state().read();
        match state.aligner.correction_at(db_time) {
            Some(c) => Some(c.drift_shift),
            None if self.input_closed(source, &state) => Some(0.0),
            None => None,
        }
    }

    fn align(&self, source: &Source, state: &mut SourceState) {
        let mut previous = state
            .progress
            .aligned
            .checked_sub(1)
            .and_then(|i| state.log.corrected_time(i))
            .unwrap_or(f64::MIN);

        while state.progress.aligned < state.progress.assembled {
            let i = state.progress.aligned;
            let Some(db_time) = state.log.db_time(i) else {
                break;
            };

            let shift = match source.plan().align {
                AlignMode::Identity => Some(0.0),
                AlignMode::External => match state.pending_external.front().copied().flatten() {
                    Some(external) => Some(
                        state
                            .aligner
                            .observe(db_time, &external, self.config.drift_window, self.config.default_date)
                            .drift_shift,
                    ),
                    None => match state.aligner.latest() {
                        Some(c) => Some(c.drift_shift),
                        None => self.borrowed_shift(source.id(), db_time),
                    },
                },
            };
            let Some(shift) = shift else {
                break;
            };

            // Corrected time never steps back, so the log stays searchable
            let corrected = (db_time - shift).max(previous);
            state.log.set_corrected_time(i, corrected);
            state.pending_external.pop_front();
            state.progress.aligned += 1;
            previous = corrected;
        }
    }

    // ========================================================================
    // SMOOTH
    // ========================================================================

    fn preprocess(&self, plan: StagePlan, state: &mut SourceState, input_closed: bool) {
        let aligned = state.progress.aligned;
        let tail_final = input_closed && aligned == state.progress.assembled;

        let log = match (&mut state.log, plan.smooth) {
            (SourceLog::Position(log), true) => log,
            _ => {
                state.progress.preprocessed = aligned;
                return;
            }
        };

        let mut i = state.progress.preprocessed;
        while i < aligned {
            let has_successor = i + 1 < aligned;
            if i >= 2 && !has_successor && !tail_final {
                break;
            }
            smooth_at(log, i, has_successor, self.config.quality);
            i += 1;
        }
        state.progress.preprocessed = i;
    }

    // ========================================================================
    // PROCESS
    // ========================================================================

    fn process(&self, source: &Source, state: &mut SourceState, edits: &EditBook, input_closed: bool) {
        let id = source.id();
        let start = state.progress.processed;
        let end = state.progress.preprocessed;
        let closed = input_closed && end == state.progress.assembled;
        let window = self.config.exact_window_s;

        let processed = match &mut state.log {
            SourceLog::Scalar(log) => {
                for i in start..end {
                    if let Some(s) = log.get_mut(i) {
                        if let Some(OverrideValue::Scalar(v)) = edits.override_for(id, s.db_time, window) {
                            s.value = v;
                        }
                        s.validity = if edits.is_removed(id, s.corrected_time) {
                            Validity::Invalid
                        } else {
                            Validity::Simplified
                        };
                    }
                }
                end
            }
            SourceLog::Position(log) => {
                apply_position_edits(log, id, start, end, edits, window);
                let span = SimplifyWindow { processed: start, preprocessed: end, closed };
                match source.plan().simplify {
                    SimplifyVariant::Distance => simplify_distance(log, span, self.config.distance_threshold_m()),
                    SimplifyVariant::MinHeading => simplify_min_heading(
                        log,
                        span,
                        HeadingSearch {
                            radius_m: self.config.heading_search_radius_m,
                            min_leg_m: self.config.min_leg_m,
                        },
                        &mut state.last_bearing,
                    ),
                    SimplifyVariant::None => {
                        for i in start..end {
                            if let Some(s) = log.get_mut(i) {
                                if s.validity.is_valid() {
                                    s.validity = Validity::Simplified;
                                }
                            }
                        }
                        end
                    }
                }
            }
            SourceLog::Derived => end,
        };
        state.progress.processed = processed;
    }

    // ========================================================================
    // TRACK CHANGES
    // ========================================================================

    /// Starts a new track at the current end of every channel.
    pub fn change_track(&self) -> TrackSession {
        self.restart_tracks(|channels, channel| channels.get_data_range(channel).map(|(_, last)| last))
    }

    /// Starts a new track at the first record stamped at or after `time`.
    pub fn start_track_at(&self, time: f64) -> TrackSession {
        self.restart_tracks(|channels, channel| {
            let (first, last) = channels.get_data_range(channel)?;
            Ok(channels
                .find_by_time(channel, time)
                .first_at_or_after(first)
                .unwrap_or(last))
        })
    }

    fn restart_tracks<F>(&self, offset_of: F) -> TrackSession
    where
        F: Fn(&dyn ChannelStore, navfuse_env::ChannelId) -> Result<u64, navfuse_env::EnvError>,
    {
        let mut pass = self.pass.lock();
        for source in &self.sources {
            let Some(channel) = source.descriptor().channel else {
                continue;
            };
            match offset_of(self.channels.as_ref(), channel) {
                Ok(offset) => source.state().write().reset(offset),
                Err(e) => warn!("{}: cannot restart track: {}", source.id(), e),
            }
        }

        pass.session = TrackSession::open(pass.session.number + 1);
        info!("Track change: session #{} ({})", pass.session.number, pass.session.id);
        self.bump();
        pass.session
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Value of a source at a corrected time.
    ///
    /// `quality` shapes position interpolation: 0 follows the straight chord
    /// between the bracket samples, 1 follows the curve through the bracket
    /// and its processed outer neighbors. A bulk-removed time is `Removed`
    /// even when no stored sample falls inside the removed range.
    pub fn query(&self, id: SourceId, time: f64, quality: f64) -> Result<Fix, QueryError> {
        let source = self.source(id).ok_or(QueryError::UnknownSource(id))?;
        let kind = source.descriptor().kind;
        let window = self.config.exact_window_s;

        let (value, exact) = match source.plan().shape {
            ValueShape::Scalar => {
                let state = source.state().read();
                let SourceLog::Scalar(log) = &state.log else {
                    return Err(QueryError::NotQueryable(kind));
                };
                state.removed.check(time)?;
                let (v, exact) = query_scalar(log, &state.progress, time, source.plan().angular, window)?;
                (FixValue::Scalar(v), exact)
            }
            ValueShape::Position => {
                let (p, exact) = self.position_at(source, time, quality)?;
                (FixValue::Position(p), exact)
            }
            ValueShape::Derived => {
                let derived = match kind {
                    SampleKind::ComputedHeading => Derived::Heading,
                    SampleKind::ComputedSpeed => Derived::Speed,
                    other => return Err(QueryError::NotQueryable(other)),
                };
                let base = source
                    .descriptor()
                    .base
                    .and_then(|b| self.source(b))
                    .ok_or(QueryError::NotQueryable(kind))?;
                source.state().read().removed.check(time)?;
                base.state().read().removed.check(time)?;
                let v = query_derived(derived, time, self.config.derive_half_span_s, |t| {
                    self.position_at(base, t, quality).map(|(p, _)| p)
                })?;
                (FixValue::Scalar(v), false)
            }
        };

        Ok(Fix { source: id, time, value, exact })
    }

    /// Answers from the first attached source of `kind`.
    pub fn query_kind(&self, kind: SampleKind, time: f64, quality: f64) -> Result<Fix, QueryError> {
        let source = self
            .sources
            .iter()
            .find(|s| s.descriptor().kind == kind)
            .ok_or(QueryError::NotQueryable(kind))?;
        self.query(source.id(), time, quality)
    }

    fn position_at(&self, source: &Source, time: f64, quality: f64) -> Result<(LatLon, bool), QueryError> {
        let state = source.state().read();
        let SourceLog::Position(log) = &state.log else {
            return Err(QueryError::NotQueryable(source.descriptor().kind));
        };
        state.removed.check(time)?;
        query_position(log, &state.progress, time, quality, self.config.exact_window_s)
    }
}

/// Smooths sample `i` in place; the first two samples and a final tail
/// sample pass through. `UserFixed` samples are left alone.
fn smooth_at(log: &mut RecordLog<LatLon>, i: usize, has_successor: bool, quality: f64) {
    if log.get(i).map(|s| s.validity) != Some(Validity::Assembled) {
        return;
    }

    let smoothed = if i >= 2 && has_successor {
        match [log.get(i - 2), log.get(i - 1), log.get(i), log.get(i + 1)] {
            [Some(a), Some(b), Some(c), Some(d)] => smooth_third([a, b, c, d], quality),
            _ => None,
        }
    } else {
        None
    };

    if let Some(s) = log.get_mut(i) {
        if let Some(p) = smoothed {
            s.value = p;
        }
        s.validity = Validity::Smoothed;
    }
}

/// Applies overrides and removals to not-yet-processed position samples.
fn apply_position_edits(log: &mut RecordLog<LatLon>, id: SourceId, start: usize, end: usize, edits: &EditBook, window: f64) {
    for i in start..end {
        let Some(s) = log.get_mut(i) else { break };
        if let Some(OverrideValue::Position { lat, lon }) = edits.override_for(id, s.db_time, window) {
            s.value = LatLon::new(lat, lon);
            s.validity = Validity::UserFixed;
        }
        if edits.is_removed(id, s.corrected_time) {
            s.validity = Validity::Invalid;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{parse_track_mark, NormalizedSample, ParseOutcome};
    use crate::navfuse_time::{ExternalTime, DAY_S};
    use approx::assert_relative_eq;
    use navfuse_env::{ChannelId, MemoryChannelStore, MemoryObjectStore, RawRecord};

    /// Whitespace-separated test payloads: `value [tod]` or `lat lon [tod]`.
    struct TextParser;

    impl RecordParser for TextParser {
        fn parse(&self, d: &SourceDescriptor, record: &RawRecord, base: Option<&dyn BaseLookup>) -> ParseOutcome {
            if d.kind == SampleKind::Track {
                return parse_track_mark(record, base);
            }
            let fields: Result<Vec<f64>, _> = std::str::from_utf8(&record.payload)
                .unwrap_or("")
                .split_whitespace()
                .map(str::parse::<f64>)
                .collect();
            let Ok(fields) = fields else {
                return ParseOutcome::Malformed("bad number".into());
            };

            let width = if d.kind.is_position_like() { 2 } else { 1 };
            if fields.len() < width {
                return ParseOutcome::Malformed("too few fields".into());
            }
            let value = if width == 2 {
                FixValue::Position(LatLon::new(fields[0], fields[1]))
            } else {
                FixValue::Scalar(fields[0])
            };
            ParseOutcome::Sample(NormalizedSample {
                db_time: record.time,
                value,
                external: fields.get(width).map(|tod| ExternalTime::new(Some(0.0), *tod)),
            })
        }
    }

    const GPS: SourceId = SourceId(1);
    const DEPTH: SourceId = SourceId(2);
    const HEADING: SourceId = SourceId(3);
    const TRACK: SourceId = SourceId(4);
    const SPEED: SourceId = SourceId(5);
    const COURSE: SourceId = SourceId(6);

    struct Rig {
        channels: Arc<MemoryChannelStore>,
        objects: Arc<MemoryObjectStore>,
    }

    impl Rig {
        fn new() -> Self {
            let channels = Arc::new(MemoryChannelStore::new());
            for c in 1..=4 {
                channels.create_channel(ChannelId(c));
            }
            Self {
                channels,
                objects: Arc::new(MemoryObjectStore::new()),
            }
        }

        fn engine(&self, config: FusionConfig, descriptors: Vec<SourceDescriptor>) -> FusionEngine {
            FusionEngine::from_config(
                config,
                descriptors,
                self.channels.clone(),
                self.objects.clone(),
                Arc::new(TextParser),
            )
            .unwrap()
        }

        fn push(&self, channel: u32, time: f64, payload: &str) {
            self.channels
                .append(ChannelId(channel), RawRecord::new(time, payload.as_bytes().to_vec()))
                .unwrap();
        }

        /// GPS heading due north at ~1.11 m/s, one fix per second, clock exact.
        fn gps_line(&self, from: usize, to: usize) {
            for i in from..to {
                let t = i as f64;
                self.push(1, t, &format!("{} 0.0 {}", 1e-5 * t, t));
            }
        }

        /// Depth equal to the time, one reading per second.
        fn depth_ramp(&self, n: usize) {
            for i in 0..n {
                let t = i as f64;
                self.push(2, t, &format!("{} {}", t, t));
            }
        }
    }

    fn gps() -> SourceDescriptor {
        SourceDescriptor::raw(GPS, "gps", SampleKind::Position, ChannelId(1), 1.0)
    }

    fn depth() -> SourceDescriptor {
        SourceDescriptor::raw(DEPTH, "depth", SampleKind::Depth, ChannelId(2), 1.0)
    }

    fn scalar_of(engine: &FusionEngine, id: SourceId, t: f64) -> Result<f64, QueryError> {
        engine.query(id, t, 0.5).map(|f| f.value.as_scalar().unwrap())
    }

    fn all_hold(engine: &FusionEngine) -> bool {
        engine.sources().all(|s| s.progress().holds())
    }

    #[test]
    fn test_scalar_bracket_scenario() {
        let rig = Rig::new();
        for (t, v) in [(0.0, 0.0), (10.0, 1.0), (20.0, 2.0), (30.0, 3.0)] {
            rig.push(2, t, &format!("{} {}", v, t));
        }
        let engine = rig.engine(FusionConfig::default(), vec![depth()]);
        engine.advance();

        assert_relative_eq!(scalar_of(&engine, DEPTH, 15.0).unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(scalar_of(&engine, DEPTH, 30.0).unwrap(), 3.0);
        assert_eq!(scalar_of(&engine, DEPTH, -5.0), Err(QueryError::OutOfRange));
        assert_eq!(scalar_of(&engine, DEPTH, 35.0), Err(QueryError::OutOfRange));
    }

    #[test]
    fn test_invariant_holds_across_incremental_passes() {
        let rig = Rig::new();
        let engine = rig.engine(FusionConfig::default(), vec![gps(), depth()]);

        for chunk in 0..6 {
            rig.gps_line(chunk * 7, chunk * 7 + 7);
            engine.advance();
            assert!(all_hold(&engine));
        }
        rig.channels.close(ChannelId(1));
        engine.advance();
        assert!(all_hold(&engine));

        let p = engine.progress(GPS).unwrap();
        assert_eq!(p.assembled, 42);
        assert_eq!(p.processed, 42);
    }

    #[test]
    fn test_idle_pass_is_idempotent() {
        let rig = Rig::new();
        rig.gps_line(0, 25);
        rig.depth_ramp(25);
        let engine = rig.engine(FusionConfig::default(), vec![gps(), depth()]);
        engine.advance();

        let progress_before: Vec<Progress> = engine.sources().map(Source::progress).collect();
        let samples_before = format!("{:?}", engine.samples(GPS));
        let token = engine.mod_count();

        let report = engine.advance();
        assert!(!report.progressed());
        let progress_after: Vec<Progress> = engine.sources().map(Source::progress).collect();
        assert_eq!(progress_before, progress_after);
        assert_eq!(samples_before, format!("{:?}", engine.samples(GPS)));
        assert_eq!(token, engine.mod_count());
    }

    #[test]
    fn test_mod_count_tracks_changes() {
        let rig = Rig::new();
        let engine = rig.engine(FusionConfig::default(), vec![depth()]);
        let t0 = engine.mod_count();
        engine.advance();
        assert_eq!(engine.mod_count(), t0);

        rig.depth_ramp(3);
        engine.advance();
        let t1 = engine.mod_count();
        assert_ne!(t1, t0);
        engine.advance();
        assert_eq!(engine.mod_count(), t1);
    }

    #[test]
    fn test_open_tail_is_not_yet_available() {
        let rig = Rig::new();
        rig.gps_line(0, 10);
        let engine = rig.engine(FusionConfig::default(), vec![gps()]);
        engine.advance();

        let p = engine.progress(GPS).unwrap();
        assert_eq!(p.aligned, 10);
        assert_eq!(p.preprocessed, 9);
        assert_eq!(p.processed, 6);
        assert_eq!(engine.query(GPS, 8.5, 0.5), Err(QueryError::NotYetAvailable));
        assert_eq!(engine.query(GPS, 20.0, 0.5), Err(QueryError::OutOfRange));

        rig.channels.close(ChannelId(1));
        engine.advance();
        let fix = engine.query(GPS, 8.5, 0.5).unwrap();
        assert_relative_eq!(fix.value.as_position().unwrap().lat, 8.5e-5, epsilon = 1e-9);
    }

    #[test]
    fn test_straight_line_survives_pipeline() {
        let rig = Rig::new();
        rig.gps_line(0, 40);
        rig.channels.close(ChannelId(1));
        let engine = rig.engine(FusionConfig::default(), vec![gps()]);
        engine.advance();

        for t in [0.0, 3.25, 17.5, 39.0] {
            let p = engine.query(GPS, t, 1.0).unwrap().value.as_position().unwrap();
            assert_relative_eq!(p.lat, 1e-5 * t, epsilon = 1e-9);
            assert_relative_eq!(p.lon, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_malformed_records_do_not_stop_fusion() {
        let rig = Rig::new();
        rig.push(2, 0.0, "1.0 0.0");
        rig.push(2, 1.0, "not-a-number");
        rig.push(2, 2.0, "3.0 2.0");
        let engine = rig.engine(FusionConfig::default(), vec![depth()]);

        let report = engine.advance();
        assert_eq!(report.source(DEPTH).unwrap().malformed, 1);
        let p = engine.progress(DEPTH).unwrap();
        assert_eq!(p.raw_cursor, 3);
        assert_eq!(p.assembled, 2);
        assert_relative_eq!(scalar_of(&engine, DEPTH, 1.0).unwrap(), 2.0);
    }

    #[test]
    fn test_day_rollover_keeps_time_increasing() {
        let rig = Rig::new();
        for i in 0..20 {
            let tod = if i < 10 { 86_390.0 + i as f64 } else { (i - 10) as f64 };
            rig.push(1, 1_000.0 + i as f64, &format!("{} 0.0 {}", 1e-5 * i as f64, tod));
        }
        rig.channels.close(ChannelId(1));
        let engine = rig.engine(FusionConfig::default(), vec![gps()]);
        engine.advance();

        let Some(SampleSnapshot::Position(samples)) = engine.samples(GPS) else {
            panic!("position log expected");
        };
        for pair in samples.windows(2) {
            assert!(pair[1].corrected_time > pair[0].corrected_time);
        }
        assert_relative_eq!(samples[12].corrected_time, DAY_S + 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bulk_remove_resets_and_hides_range() {
        let rig = Rig::new();
        rig.depth_ramp(101);
        let engine = rig.engine(FusionConfig::default(), vec![depth()]);
        engine.advance();
        assert!(scalar_of(&engine, DEPTH, 50.5).is_ok());

        rig.objects.push(EditDirective::BulkRemove { sources: vec![], start: 40.0, end: 60.0 });
        let report = engine.advance();
        assert_eq!(report.resets, vec![DEPTH]);
        assert_eq!(engine.progress(DEPTH).unwrap().processed, 101);

        for t in [40.0, 45.5, 50.0, 59.9, 60.0] {
            assert_eq!(scalar_of(&engine, DEPTH, t), Err(QueryError::Removed), "t = {}", t);
        }
        assert_relative_eq!(scalar_of(&engine, DEPTH, 20.5).unwrap(), 20.0);
        assert_relative_eq!(scalar_of(&engine, DEPTH, 70.5).unwrap(), 70.0);
    }

    #[test]
    fn test_bulk_remove_between_samples_hides_gap() {
        let rig = Rig::new();
        for (t, v) in [(0.0, 0.0), (10.0, 1.0), (20.0, 2.0), (30.0, 3.0)] {
            rig.push(2, t, &format!("{} {}", v, t));
        }
        let engine = rig.engine(FusionConfig::default(), vec![depth()]);
        engine.advance();
        assert!(scalar_of(&engine, DEPTH, 15.0).is_ok());

        rig.objects.push(EditDirective::BulkRemove { sources: vec![], start: 12.0, end: 18.0 });
        let report = engine.advance();
        // No stored sample lies in the range, so nothing is rebuilt
        assert!(report.resets.is_empty());
        assert!(report.progressed());

        for t in [12.0, 15.0, 18.0] {
            assert_eq!(scalar_of(&engine, DEPTH, t), Err(QueryError::Removed), "t = {}", t);
        }
        assert!(scalar_of(&engine, DEPTH, 11.0).is_ok());
        assert!(scalar_of(&engine, DEPTH, 19.0).is_ok());

        // A later reset keeps the range hidden
        rig.objects.push(EditDirective::PointOverride {
            source: DEPTH,
            db_time: 10.0,
            value: OverrideValue::Scalar(5.0),
        });
        assert_eq!(engine.advance().resets, vec![DEPTH]);
        assert_eq!(scalar_of(&engine, DEPTH, 15.0), Err(QueryError::Removed));
        assert_eq!(scalar_of(&engine, DEPTH, 10.0).unwrap(), 5.0);
    }

    #[test]
    fn test_bulk_remove_on_position_source() {
        let rig = Rig::new();
        for i in 0..4 {
            let t = 10.0 * i as f64;
            rig.push(1, t, &format!("{} 0.0 {}", 1e-5 * t, t));
        }
        rig.channels.close(ChannelId(1));
        let engine = rig.engine(FusionConfig::default(), vec![gps()]);
        engine.advance();
        assert!(engine.query(GPS, 15.0, 0.5).is_ok());

        rig.objects.push(EditDirective::BulkRemove { sources: vec![GPS], start: 12.0, end: 18.0 });
        engine.advance();

        assert_eq!(engine.query(GPS, 15.0, 0.5), Err(QueryError::Removed));
        assert_eq!(engine.query(GPS, 12.0, 0.0), Err(QueryError::Removed));
        assert!(engine.query(GPS, 5.0, 0.5).is_ok());
        assert!(engine.query(GPS, 25.0, 0.5).is_ok());
    }

    #[test]
    fn test_derived_query_inside_removed_base_range() {
        let rig = Rig::new();
        rig.gps_line(0, 60);
        rig.channels.close(ChannelId(1));
        let engine = rig.engine(
            FusionConfig::default(),
            vec![
                gps(),
                SourceDescriptor::computed(SPEED, "sog", SampleKind::ComputedSpeed, GPS, None, 1.0),
                SourceDescriptor::computed(COURSE, "cog", SampleKind::ComputedHeading, GPS, None, 1.0),
            ],
        );
        engine.advance();
        assert!(scalar_of(&engine, SPEED, 12.5).is_ok());

        // Strictly between two fixes; the derived pair (12.0, 13.0) is intact
        rig.objects.push(EditDirective::BulkRemove { sources: vec![GPS], start: 12.2, end: 12.8 });
        let report = engine.advance();
        assert!(report.resets.is_empty());

        assert_eq!(scalar_of(&engine, SPEED, 12.5), Err(QueryError::Removed));
        assert_eq!(scalar_of(&engine, COURSE, 12.5), Err(QueryError::Removed));
        assert_relative_eq!(scalar_of(&engine, SPEED, 30.0).unwrap(), 1.11, epsilon = 0.01);
        assert!(scalar_of(&engine, COURSE, 30.0).is_ok());
    }

    #[test]
    fn test_late_point_override_rebuilds_history() {
        let rig = Rig::new();
        rig.depth_ramp(20);
        let engine = rig.engine(FusionConfig::default(), vec![depth()]);
        engine.advance();

        rig.objects.push(EditDirective::PointOverride {
            source: DEPTH,
            db_time: 10.0,
            value: OverrideValue::Scalar(99.0),
        });
        let report = engine.advance();
        assert_eq!(report.resets, vec![DEPTH]);
        assert_eq!(scalar_of(&engine, DEPTH, 10.0).unwrap(), 99.0);
        assert_eq!(scalar_of(&engine, DEPTH, 11.0).unwrap(), 11.0);
    }

    #[test]
    fn test_early_point_override_applies_at_assembly() {
        let rig = Rig::new();
        rig.objects.push(EditDirective::PointOverride {
            source: GPS,
            db_time: 5.0,
            value: OverrideValue::Position { lat: 0.5, lon: 0.5 },
        });
        rig.gps_line(0, 30);
        rig.channels.close(ChannelId(1));
        let engine = rig.engine(FusionConfig::default(), vec![gps()]);

        let report = engine.advance();
        assert!(report.resets.is_empty());
        let fix = engine.query(GPS, 5.0, 0.5).unwrap();
        assert!(fix.exact);
        assert_eq!(fix.value.as_position().unwrap(), LatLon::new(0.5, 0.5));
    }

    #[test]
    fn test_time_reference_lends_drift_shift() {
        let rig = Rig::new();
        for i in 0..10 {
            let t = i as f64;
            // Recorder runs 2 s ahead of GNSS time
            rig.push(1, t + 2.0, &format!("{} 0.0 {}", 1e-5 * t, t));
            rig.push(3, t + 2.0, &format!("{}", 10.0 * t));
        }
        let config = FusionConfig { time_reference: Some(GPS), ..FusionConfig::default() };
        let heading = SourceDescriptor::raw(HEADING, "compass", SampleKind::Heading, ChannelId(3), 1.0);
        // Listed before its reference on purpose
        let engine = rig.engine(config, vec![heading, gps()]);
        assert_eq!(engine.sources().next().unwrap().id(), GPS);

        engine.advance();
        let Some(SampleSnapshot::Scalar(samples)) = engine.samples(HEADING) else {
            panic!("scalar log expected");
        };
        for (i, s) in samples.iter().enumerate() {
            assert_relative_eq!(s.corrected_time, i as f64, epsilon = 1e-9);
        }
        assert_relative_eq!(scalar_of(&engine, HEADING, 4.0).unwrap(), 40.0);
    }

    #[test]
    fn test_track_and_derived_sources() {
        let rig = Rig::new();
        rig.gps_line(0, 61);
        for i in 0..60 {
            rig.push(4, i as f64 + 0.5, "");
        }
        let descriptors = vec![
            SourceDescriptor::computed(TRACK, "track", SampleKind::Track, GPS, Some(ChannelId(4)), 1.0),
            SourceDescriptor::computed(SPEED, "sog", SampleKind::ComputedSpeed, GPS, None, 1.0),
            SourceDescriptor::computed(COURSE, "cog", SampleKind::ComputedHeading, GPS, None, 1.0),
            gps(),
        ];
        let engine = rig.engine(FusionConfig::default(), descriptors);

        // Base still open: marks past its processed range wait
        let report = engine.advance();
        assert!(report.source(TRACK).unwrap().blocked);
        assert!(all_hold(&engine));

        rig.channels.close(ChannelId(1));
        rig.channels.close(ChannelId(4));
        engine.advance();
        let p = engine.progress(TRACK).unwrap();
        assert_eq!(p.assembled, 60);
        assert_eq!(p.processed, 60);

        let point = engine.query(TRACK, 20.0, 0.0).unwrap().value.as_position().unwrap();
        assert_relative_eq!(point.lat, 2e-4, epsilon = 1e-9);

        let speed = scalar_of(&engine, SPEED, 30.0).unwrap();
        assert_relative_eq!(speed, 1.112, epsilon = 0.01);
        let course = scalar_of(&engine, COURSE, 30.0).unwrap();
        assert!(course < 1e-3 || course > 360.0 - 1e-3, "course {}", course);

        assert_eq!(
            engine.query_kind(SampleKind::Altitude, 1.0, 0.5),
            Err(QueryError::NotQueryable(SampleKind::Altitude))
        );
    }

    #[test]
    fn test_change_track_starts_fresh() {
        let rig = Rig::new();
        rig.depth_ramp(10);
        let engine = rig.engine(FusionConfig::default(), vec![depth()]);
        engine.advance();
        let first = engine.session();

        let session = engine.change_track();
        assert_ne!(session.id, first.id);
        assert_eq!(session.number, first.number + 1);
        assert_eq!(engine.progress(DEPTH).unwrap(), Progress::starting_at(10));

        for i in 10..15 {
            rig.push(2, i as f64, &format!("{} {}", i, i));
        }
        engine.advance();
        assert_eq!(engine.progress(DEPTH).unwrap().assembled, 5);
        assert_eq!(scalar_of(&engine, DEPTH, 5.0), Err(QueryError::OutOfRange));
        assert_eq!(scalar_of(&engine, DEPTH, 12.0).unwrap(), 12.0);
    }

    #[test]
    fn test_start_track_at_time() {
        let rig = Rig::new();
        rig.depth_ramp(20);
        let engine = rig.engine(FusionConfig::default(), vec![depth()]);
        engine.start_track_at(5.5);
        engine.advance();

        let p = engine.progress(DEPTH).unwrap();
        assert_eq!(p.base_offset, 6);
        assert_eq!(p.assembled, 14);
        assert!(p.holds());
    }

    #[test]
    fn test_attach_validation() {
        let rig = Rig::new();
        let mut engine = rig.engine(FusionConfig::default(), vec![depth()]);

        assert_eq!(engine.attach(depth()), Err(FusionError::DuplicateSource(DEPTH)));
        assert_eq!(
            engine.attach(SourceDescriptor::computed(SPEED, "sog", SampleKind::ComputedSpeed, GPS, None, 1.0)),
            Err(FusionError::UnknownBase { id: SPEED, base: GPS })
        );
        assert_eq!(
            engine.attach(SourceDescriptor::computed(SPEED, "sog", SampleKind::ComputedSpeed, DEPTH, None, 1.0)),
            Err(FusionError::BaseNotPosition { id: SPEED, base: DEPTH })
        );
        assert!(matches!(
            engine.attach(SourceDescriptor::computed(TRACK, "t", SampleKind::Track, DEPTH, None, 1.0)),
            Err(FusionError::BaseNotPosition { .. })
        ));
        assert!(engine.attach(gps()).is_ok());
        assert!(matches!(
            engine.attach(SourceDescriptor::computed(TRACK, "t", SampleKind::Track, GPS, None, 1.0)),
            Err(FusionError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn test_dependency_cycle_rejected() {
        let a = SourceDescriptor::computed(SourceId(10), "a", SampleKind::Track, SourceId(11), Some(ChannelId(1)), 1.0);
        let b = SourceDescriptor::computed(SourceId(11), "b", SampleKind::Track, SourceId(10), Some(ChannelId(2)), 1.0);
        match dependency_order(vec![a, b, gps()], None) {
            Err(FusionError::DependencyCycle(ids)) => {
                assert!(ids.contains(&SourceId(10)) && ids.contains(&SourceId(11)));
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_dependency_order_puts_bases_first() {
        let track = SourceDescriptor::computed(TRACK, "t", SampleKind::Track, GPS, Some(ChannelId(4)), 1.0);
        let order = dependency_order(vec![track, depth(), gps()], None).unwrap();
        let ids: Vec<SourceId> = order.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![DEPTH, GPS, TRACK]);
    }
}
