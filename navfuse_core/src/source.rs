//! Sources - descriptors, stage plans and per-source pipeline state.
//!
//! Every navigation parameter kind maps to exactly one [`StagePlan`] through
//! an exhaustive match; the overseer never dispatches on anything else.

use navfuse_env::{ChannelId, SourceId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::edits::RemovedSpans;
use crate::navfuse_time::{ExternalTime, TimeAligner};
use crate::record_log::{LatLon, RecordLog};

// ============================================================================
// KINDS & STAGE PLANS
// ============================================================================

/// Navigation parameter carried by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleKind {
    /// GNSS position fix
    Position,
    /// Track points computed from a position-like base source
    Track,
    /// Compass / gyro heading (degrees)
    Heading,
    /// Attitude roll (degrees)
    Roll,
    /// Attitude pitch (degrees)
    Pitch,
    /// Heave (meters)
    Heave,
    /// Speed over ground reported by a sensor (m/s)
    Speed,
    /// Echosounder depth (meters)
    Depth,
    /// Altitude above datum (meters)
    Altitude,
    /// Course derived on demand from a position-like base (degrees)
    ComputedHeading,
    /// Speed derived on demand from a position-like base (m/s)
    ComputedSpeed,
}

/// Whether a source reads its own raw channel or derives from another source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Raw,
    Computed,
}

/// Shape of the values stored in a source's record log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    Scalar,
    Position,
    /// No stored log; answered by the getter on demand
    Derived,
}

/// How corrected time is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignMode {
    /// External date/time plus sliding-window drift correction
    External,
    /// Record stamps are already in corrected time
    Identity,
}

/// Which simplifier reduces the smoothed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimplifyVariant {
    /// Scalars: edits only, then finalize
    None,
    /// Absolute positions: planar distance threshold
    Distance,
    /// Computed tracks: minimum heading deviation within a search radius
    MinHeading,
}

/// The stage functions that apply to one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePlan {
    pub shape: ValueShape,
    pub origin: SourceKind,
    pub align: AlignMode,
    pub smooth: bool,
    pub simplify: SimplifyVariant,
    pub angular: bool,
}

impl SampleKind {
    /// Returns the stage plan for this kind.
    pub fn stage_plan(&self) -> StagePlan {
        use SampleKind::*;
        match self {
            Position => StagePlan {
                shape: ValueShape::Position,
                origin: SourceKind::Raw,
                align: AlignMode::External,
                smooth: true,
                simplify: SimplifyVariant::Distance,
                angular: false,
            },
            Track => StagePlan {
                shape: ValueShape::Position,
                origin: SourceKind::Computed,
                align: AlignMode::Identity,
                smooth: false,
                simplify: SimplifyVariant::MinHeading,
                angular: false,
            },
            Heading | Roll | Pitch => StagePlan {
                shape: ValueShape::Scalar,
                origin: SourceKind::Raw,
                align: AlignMode::External,
                smooth: false,
                simplify: SimplifyVariant::None,
                angular: true,
            },
            Heave | Speed | Depth | Altitude => StagePlan {
                shape: ValueShape::Scalar,
                origin: SourceKind::Raw,
                align: AlignMode::External,
                smooth: false,
                simplify: SimplifyVariant::None,
                angular: false,
            },
            ComputedHeading => StagePlan {
                shape: ValueShape::Derived,
                origin: SourceKind::Computed,
                align: AlignMode::Identity,
                smooth: false,
                simplify: SimplifyVariant::None,
                angular: true,
            },
            ComputedSpeed => StagePlan {
                shape: ValueShape::Derived,
                origin: SourceKind::Computed,
                align: AlignMode::Identity,
                smooth: false,
                simplify: SimplifyVariant::None,
                angular: false,
            },
        }
    }

    /// Returns true if the kind stores positions.
    #[inline]
    pub fn is_position_like(&self) -> bool {
        self.stage_plan().shape == ValueShape::Position
    }
}

// ============================================================================
// DESCRIPTOR
// ============================================================================

/// Immutable description of an attached source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: SourceId,

    /// Human-readable name (for logging)
    pub name: String,

    pub kind: SampleKind,

    /// Raw channel; `None` only for sources derived on demand
    pub channel: Option<ChannelId>,

    /// Base source for computed kinds
    pub base: Option<SourceId>,

    /// Nominal record rate in Hz
    pub nominal_rate: f64,
}

impl SourceDescriptor {
    /// Describes a raw source reading its own channel.
    pub fn raw(id: SourceId, name: &str, kind: SampleKind, channel: ChannelId, nominal_rate: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind,
            channel: Some(channel),
            base: None,
            nominal_rate,
        }
    }

    /// Describes a computed source derived from `base`.
    pub fn computed(
        id: SourceId,
        name: &str,
        kind: SampleKind,
        base: SourceId,
        channel: Option<ChannelId>,
        nominal_rate: f64,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind,
            channel,
            base: Some(base),
            nominal_rate,
        }
    }

    /// Raw or computed, as dictated by the kind.
    pub fn source_kind(&self) -> SourceKind {
        self.kind.stage_plan().origin
    }
}

// ============================================================================
// PROGRESS
// ============================================================================

/// Per-source pipeline high-water marks.
///
/// All counters are monotonically non-decreasing between resets and obey
/// `processed <= preprocessed <= aligned <= assembled <= raw_cursor - base_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    /// Next unread global index in the channel store
    pub raw_cursor: u64,
    /// Samples appended to the record log
    pub assembled: usize,
    /// Samples with a corrected time
    pub aligned: usize,
    /// Samples aligned and, for position sources, smoothed
    pub preprocessed: usize,
    /// Samples that reached their final state
    pub processed: usize,
    /// Global index of logical sample zero's raw record range
    pub base_offset: u64,
}

impl Progress {
    /// Fresh counters starting at a global record index.
    pub fn starting_at(base_offset: u64) -> Self {
        Self {
            raw_cursor: base_offset,
            base_offset,
            ..Self::default()
        }
    }

    /// Checks the ordering invariant.
    pub fn holds(&self) -> bool {
        self.raw_cursor >= self.base_offset
            && self.processed <= self.preprocessed
            && self.preprocessed <= self.aligned
            && self.aligned <= self.assembled
            && self.assembled as u64 <= self.raw_cursor - self.base_offset
    }
}

// ============================================================================
// SOURCE STATE
// ============================================================================

/// The record log of a source, shaped by its kind.
#[derive(Debug, Clone)]
pub enum SourceLog {
    Scalar(RecordLog<f64>),
    Position(RecordLog<LatLon>),
    Derived,
}

impl SourceLog {
    fn for_shape(shape: ValueShape, block_size: usize) -> Self {
        match shape {
            ValueShape::Scalar => SourceLog::Scalar(RecordLog::new(block_size)),
            ValueShape::Position => SourceLog::Position(RecordLog::new(block_size)),
            ValueShape::Derived => SourceLog::Derived,
        }
    }

    /// Number of stored samples.
    pub fn len(&self) -> usize {
        match self {
            SourceLog::Scalar(log) => log.len(),
            SourceLog::Position(log) => log.len(),
            SourceLog::Derived => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self) {
        match self {
            SourceLog::Scalar(log) => log.clear(),
            SourceLog::Position(log) => log.clear(),
            SourceLog::Derived => {}
        }
    }

    pub fn db_time(&self, index: usize) -> Option<f64> {
        match self {
            SourceLog::Scalar(log) => log.get(index).map(|s| s.db_time),
            SourceLog::Position(log) => log.get(index).map(|s| s.db_time),
            SourceLog::Derived => None,
        }
    }

    pub fn corrected_time(&self, index: usize) -> Option<f64> {
        match self {
            SourceLog::Scalar(log) => log.get(index).map(|s| s.corrected_time),
            SourceLog::Position(log) => log.get(index).map(|s| s.corrected_time),
            SourceLog::Derived => None,
        }
    }

    pub(crate) fn set_corrected_time(&mut self, index: usize, time: f64) {
        match self {
            SourceLog::Scalar(log) => {
                if let Some(s) = log.get_mut(index) {
                    s.corrected_time = time;
                }
            }
            SourceLog::Position(log) => {
                if let Some(s) = log.get_mut(index) {
                    s.corrected_time = time;
                }
            }
            SourceLog::Derived => {}
        }
    }

    /// True if any sample below `end` satisfies `pred(db_time, corrected_time)`.
    pub fn any_before(&self, end: usize, pred: impl Fn(f64, f64) -> bool) -> bool {
        match self {
            SourceLog::Scalar(log) => log.slice(0, end).iter().any(|s| pred(s.db_time, s.corrected_time)),
            SourceLog::Position(log) => log.slice(0, end).iter().any(|s| pred(s.db_time, s.corrected_time)),
            SourceLog::Derived => false,
        }
    }
}

/// Mutable pipeline state of one source; only reachable through [`Source`].
#[derive(Debug)]
pub(crate) struct SourceState {
    pub progress: Progress,
    pub log: SourceLog,
    /// External time of each assembled-but-unaligned sample, front = `progress.aligned`
    pub pending_external: VecDeque<Option<ExternalTime>>,
    pub aligner: TimeAligner,
    /// Bearing of the last min-heading leg, degrees
    pub last_bearing: Option<f64>,
    /// Bulk-removed ranges; survive resets
    pub removed: RemovedSpans,
}

impl SourceState {
    fn new(shape: ValueShape, block_size: usize, base_offset: u64) -> Self {
        Self {
            progress: Progress::starting_at(base_offset),
            log: SourceLog::for_shape(shape, block_size),
            pending_external: VecDeque::new(),
            aligner: TimeAligner::new(),
            last_bearing: None,
            removed: RemovedSpans::default(),
        }
    }

    /// Rewinds every counter and drops the log; `base_offset` becomes the new
    /// zero point. Removed ranges are kept.
    pub fn reset(&mut self, base_offset: u64) {
        self.progress = Progress::starting_at(base_offset);
        self.log.clear();
        self.pending_external.clear();
        self.aligner = TimeAligner::new();
        self.last_bearing = None;
    }
}

/// One attached navigation source: its descriptor plus owned pipeline state.
///
/// Readers take the state lock shared; the overseer takes it exclusively
/// for the duration of one stage pass.
#[derive(Debug)]
pub struct Source {
    descriptor: SourceDescriptor,
    plan: StagePlan,
    state: RwLock<SourceState>,
}

impl Source {
    pub(crate) fn new(descriptor: SourceDescriptor, block_size: usize, base_offset: u64) -> Self {
        let plan = descriptor.kind.stage_plan();
        Self {
            state: RwLock::new(SourceState::new(plan.shape, block_size, base_offset)),
            descriptor,
            plan,
        }
    }

    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    pub fn id(&self) -> SourceId {
        self.descriptor.id
    }

    pub fn plan(&self) -> StagePlan {
        self.plan
    }

    /// Snapshot of the progress counters.
    pub fn progress(&self) -> Progress {
        self.state.read().progress
    }

    pub(crate) fn state(&self) -> &RwLock<SourceState> {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_table() {
        let pos = SampleKind::Position.stage_plan();
        assert!(pos.smooth);
        assert_eq!(pos.simplify, SimplifyVariant::Distance);

        let track = SampleKind::Track.stage_plan();
        assert_eq!(track.origin, SourceKind::Computed);
        assert_eq!(track.simplify, SimplifyVariant::MinHeading);
        assert!(!track.smooth);

        assert!(SampleKind::Heading.stage_plan().angular);
        assert!(!SampleKind::Depth.stage_plan().angular);
        assert_eq!(SampleKind::ComputedSpeed.stage_plan().shape, ValueShape::Derived);
        assert!(SampleKind::Track.is_position_like());
        assert!(!SampleKind::ComputedHeading.is_position_like());
    }

    #[test]
    fn test_progress_invariant() {
        let mut p = Progress::starting_at(100);
        assert!(p.holds());

        p.raw_cursor = 110;
        p.assembled = 8;
        p.aligned = 8;
        p.preprocessed = 6;
        p.processed = 4;
        assert!(p.holds());

        p.assembled = 11;
        assert!(!p.holds());
    }

    #[test]
    fn test_reset_clears_state() {
        let desc = SourceDescriptor::raw(SourceId(1), "gps", SampleKind::Position, ChannelId(1), 1.0);
        let source = Source::new(desc, 16, 0);
        {
            let mut state = source.state().write();
            state.progress.raw_cursor = 5;
            state.progress.assembled = 5;
            if let SourceLog::Position(log) = &mut state.log {
                log.push(crate::record_log::Sample::assembled(0.0, LatLon::new(1.0, 2.0)));
            }
            state.reset(42);
        }
        let progress = source.progress();
        assert_eq!(progress, Progress::starting_at(42));
        assert!(source.state().read().log.is_empty());
    }
}
