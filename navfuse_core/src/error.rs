//! Error types for the fusion engine.

use navfuse_env::{EnvError, SourceId};
use thiserror::Error;

use crate::source::SampleKind;

/// Errors raised while configuring the engine or attaching sources.
///
/// Per-record problems (malformed payloads, clock discontinuities) are never
/// errors; they are absorbed by the pipeline and only show up in reports.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FusionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown source: {0}")]
    UnknownSource(SourceId),

    #[error("Source already attached: {0}")]
    DuplicateSource(SourceId),

    /// The descriptor does not carry what its kind requires (channel, base)
    #[error("Invalid descriptor for {id} ({kind:?}): {reason}")]
    InvalidDescriptor {
        id: SourceId,
        kind: SampleKind,
        reason: &'static str,
    },

    /// A computed source names a base that is not attached yet
    #[error("Base {base} of {id} is not attached")]
    UnknownBase { id: SourceId, base: SourceId },

    /// A computed source names a base that does not store positions
    #[error("Base {base} of {id} is not position-like")]
    BaseNotPosition { id: SourceId, base: SourceId },

    /// The declared base/time-reference edges contain a cycle
    #[error("Dependency cycle among sources: {0:?}")]
    DependencyCycle(Vec<SourceId>),

    #[error("Channel store error: {0}")]
    Channel(#[from] EnvError),
}

/// Why a point-in-time query produced no value.
///
/// All variants are ordinary outcomes; the getter never panics.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum QueryError {
    /// The time is within reach but its bracket is not processed yet; advance and retry
    #[error("Not yet available")]
    NotYetAvailable,

    /// The time lies outside every known sample
    #[error("Out of range")]
    OutOfRange,

    /// The bracket around the time was removed by an edit
    #[error("Removed by edit")]
    Removed,

    #[error("Unknown source: {0}")]
    UnknownSource(SourceId),

    /// No attached source answers this kind
    #[error("No queryable source of kind {0:?}")]
    NotQueryable(SampleKind),
}

impl QueryError {
    /// True when advancing the engine may turn this into a value.
    pub fn is_transient(&self) -> bool {
        matches!(self, QueryError::NotYetAvailable)
    }
}
