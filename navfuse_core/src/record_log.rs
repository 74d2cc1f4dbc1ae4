//! The Record Log - per-source growable sample storage.
//!
//! Samples are addressed only by logical index (global record index minus
//! the source's `base_offset`). Nothing outside this module ever holds a
//! reference into the buffer across a growth step.

use serde::{Deserialize, Serialize};

/// Pipeline stage reached by a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Validity {
    /// Parsed and appended; not yet aligned/smoothed
    Assembled,
    /// Time-aligned and (for position sources) smoothed
    Smoothed,
    /// Final; safe to serve to queries
    Simplified,
    /// Value forced by an operator edit; exempt from smoothing and simplification
    UserFixed,
    /// Excluded by a bulk-remove edit
    Invalid,
}

impl Validity {
    /// Returns true unless the sample was removed by an edit.
    #[inline]
    pub fn is_valid(&self) -> bool {
        !matches!(self, Validity::Invalid)
    }
}

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// One normalized sample of a navigation source.
///
/// `V` is `f64` for scalar sources and [`LatLon`] for position-like sources.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample<V> {
    /// Recorder clock stamp of the raw record (seconds)
    pub db_time: f64,

    /// Timestamp after clock-drift/date alignment; NaN until aligned
    pub corrected_time: f64,

    /// The sample value
    pub value: V,

    /// Stage reached by this sample
    pub validity: Validity,
}

impl<V> Sample<V> {
    /// Creates a freshly assembled, not yet aligned sample.
    pub fn assembled(db_time: f64, value: V) -> Self {
        Self {
            db_time,
            corrected_time: f64::NAN,
            value,
            validity: Validity::Assembled,
        }
    }
}

/// Scalar sample (heading, depth, speed, ...).
pub type ScalarSample = Sample<f64>;

/// Position sample (GNSS fix, computed track point).
pub type PositionSample = Sample<LatLon>;

/// Append-only sample buffer that grows in fixed-size blocks.
#[derive(Debug, Clone)]
pub struct RecordLog<V> {
    samples: Vec<Sample<V>>,
    block_size: usize,
}

impl<V: Copy> RecordLog<V> {
    /// Creates an empty log growing by `block_size` samples at a time.
    pub fn new(block_size: usize) -> Self {
        Self {
            samples: Vec::new(),
            block_size: block_size.max(1),
        }
    }

    /// Number of samples in the log.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the log holds no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Appends a sample and returns its logical index.
    pub fn push(&mut self, sample: Sample<V>) -> usize {
        if self.samples.len() == self.samples.capacity() {
            self.samples.reserve_exact(self.block_size);
        }
        self.samples.push(sample);
        self.samples.len() - 1
    }

    /// Returns the sample at a logical index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Sample<V>> {
        self.samples.get(index)
    }

    /// Returns the sample at a logical index for in-place stage updates.
    #[inline]
    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Sample<V>> {
        self.samples.get_mut(index)
    }

    /// Returns a contiguous range of samples.
    pub fn slice(&self, start: usize, end: usize) -> &[Sample<V>] {
        let end = end.min(self.samples.len());
        &self.samples[start.min(end)..end]
    }

    /// Drops every sample (used by resets).
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Allocated capacity, always a whole number of blocks once grown.
    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    /// Number of leading samples in `[0, end)` whose corrected time is `<= time`.
    ///
    /// The prefix must be sorted by corrected time, which the time aligner
    /// guarantees for any source whose recorder clock is monotonic.
    pub fn partition_by_time(&self, end: usize, time: f64) -> usize {
        self.slice(0, end).partition_point(|s| s.corrected_time <= time)
    }
}
