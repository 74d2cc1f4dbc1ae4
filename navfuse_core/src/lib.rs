//! NavFuse Core - Incremental Navigation-Log Fusion
//!
//! Fuses asynchronously recorded navigation sensors (GNSS, heading,
//! attitude, speed, depth, altitude) into one queryable estimate of vessel
//! state at any corrected time, while the recording may still be growing.
//!
//! Each attached source runs a staged pipeline, advanced by polling:
//! 1. **Assemble**: raw channel records become normalized samples
//! 2. **Align**: recorder stamps are corrected for clock drift and midnight rollover
//! 3. **Smooth**: GNSS jitter is reduced with trailing cubic-Bezier smoothing
//! 4. **Simplify**: paths are reduced to anchors with projected intermediates
//! 5. **Get**: binary search plus interpolation over the processed cache
//!
//! This is a deterministic geometric pipeline, not a probabilistic filter.

pub mod assembler;
pub mod config;
pub mod edits;
pub mod error;
pub mod geodesy;
pub mod navfuse_query;
pub mod navfuse_simplify;
pub mod navfuse_smooth;
pub mod navfuse_time;
pub mod overseer;
pub mod record_log;
pub mod source;

// Re-export key types for convenience
pub use assembler::{parse_track_mark, BaseLookup, NormalizedSample, ParseOutcome, RecordParser};
pub use config::FusionConfig;
pub use error::{FusionError, QueryError};
pub use navfuse_query::{Fix, FixValue};
pub use navfuse_time::{ExternalTime, TimeCorrection};
pub use overseer::{AdvanceReport, FusionEngine, SampleSnapshot, SourceReport, TrackSession};
pub use record_log::{LatLon, PositionSample, RecordLog, Sample, ScalarSample, Validity};
pub use source::{Progress, SampleKind, Source, SourceDescriptor, SourceKind};
