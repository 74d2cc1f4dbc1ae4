//! Common types shared across the NavFuse collaborator boundary.

use serde::{Deserialize, Serialize};

/// Identifier of one logical navigation source attached to a fusion engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u32);

impl SourceId {
    /// Returns the raw numeric identifier.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "src#{}", self.0)
    }
}

/// Handle of one append-only binary channel in the channel store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub u32);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ch#{}", self.0)
    }
}

/// One raw record as stored by the recorder.
///
/// The payload is opaque to the store; only the record parser
/// knows how to interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Recorder clock stamp (seconds)
    pub time: f64,

    /// Undecoded record bytes
    pub payload: Vec<u8>,
}

impl RawRecord {
    /// Creates a new record from a stamp and payload bytes.
    pub fn new(time: f64, payload: Vec<u8>) -> Self {
        Self { time, payload }
    }

    /// Returns the payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Result of locating a time inside a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeLookup {
    /// The channel holds no records.
    Empty,

    /// The time precedes the first record.
    Before,

    /// A record carries exactly this time.
    Exact(u64),

    /// The time falls strictly between two adjacent records.
    Between(u64, u64),

    /// The time follows the last record.
    After,
}

impl TimeLookup {
    /// First record index at or after the looked-up time, if any.
    pub fn first_at_or_after(&self, first: u64) -> Option<u64> {
        match *self {
            TimeLookup::Empty | TimeLookup::After => None,
            TimeLookup::Before => Some(first),
            TimeLookup::Exact(i) => Some(i),
            TimeLookup::Between(_, hi) => Some(hi),
        }
    }
}
