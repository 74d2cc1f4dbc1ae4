//! The "ASSEMBLE" Stage - Raw Records to Normalized Samples
//!
//! Reads every unread raw record of a source from the channel store, hands
//! it to the [`RecordParser`] collaborator and appends what comes back to
//! the source's record log.
//!
//! - A malformed record is skipped for good: the cursor moves past it.
//! - A computed record whose base has not caught up yet is `Pending`: the
//!   cursor stays put and assembly of that source stops for this pass.
//! - A record named by a point override is appended with the override value
//!   and tagged `UserFixed`.

use navfuse_env::{ChannelStore, EnvError, OverrideValue, RawRecord};
use tracing::{debug, warn};

use crate::edits::EditBook;
use crate::error::QueryError;
use crate::navfuse_query::FixValue;
use crate::navfuse_time::ExternalTime;
use crate::record_log::{LatLon, Sample, Validity};
use crate::source::{SourceDescriptor, SourceLog, SourceState};

// ============================================================================
// PARSER CONTRACT
// ============================================================================

/// A raw record decoded into engine terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedSample {
    /// Recorder stamp; normally the raw record's own time
    pub db_time: f64,

    pub value: FixValue,

    /// Date/time-of-day reported by the device, if any
    pub external: Option<ExternalTime>,
}

/// What a parser made of one raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Sample(NormalizedSample),

    /// Undecodable record; skipped and never retried
    Malformed(String),

    /// The record depends on base data not processed yet; retry later
    Pending,
}

/// Read access to a computed source's base, handed to the parser.
pub trait BaseLookup {
    /// Processed base position at a corrected time.
    ///
    /// Returns `NotYetAvailable` while the base may still cover `time`.
    fn position_at(&self, time: f64) -> Result<LatLon, QueryError>;
}

/// Decodes raw records of every source kind.
///
/// `base` is provided for computed sources only.
pub trait RecordParser: Send + Sync {
    fn parse(&self, descriptor: &SourceDescriptor, record: &RawRecord, base: Option<&dyn BaseLookup>) -> ParseOutcome;
}

/// Parses a track cadence mark: the record stamp is the corrected time at
/// which the base position is sampled.
pub fn parse_track_mark(record: &RawRecord, base: Option<&dyn BaseLookup>) -> ParseOutcome {
    let Some(base) = base else {
        return ParseOutcome::Malformed("track mark without a base source".into());
    };
    match base.position_at(record.time) {
        Ok(p) => ParseOutcome::Sample(NormalizedSample {
            db_time: record.time,
            value: FixValue::Position(p),
            external: None,
        }),
        Err(QueryError::NotYetAvailable) => ParseOutcome::Pending,
        Err(e) => ParseOutcome::Malformed(format!("base position at {:.3}: {}", record.time, e)),
    }
}

// ============================================================================
// ASSEMBLY PASS
// ============================================================================

/// Outcome of one assembly pass over a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStep {
    pub appended: usize,
    pub malformed: usize,
    /// Stopped at a pending record
    pub blocked: bool,
}

/// Collaborators needed to assemble any source.
pub(crate) struct Assembler<'a> {
    pub channels: &'a dyn ChannelStore,
    pub parser: &'a dyn RecordParser,
    pub edits: &'a EditBook,
    pub exact_window: f64,
}

impl Assembler<'_> {
    /// Assembles every unread record of one source.
    pub fn run(
        &self,
        descriptor: &SourceDescriptor,
        state: &mut SourceState,
        base: Option<&dyn BaseLookup>,
    ) -> Result<AssemblyStep, EnvError> {
        let mut step = AssemblyStep::default();
        let Some(channel) = descriptor.channel else {
            return Ok(step);
        };

        let (first, last) = self.channels.get_data_range(channel)?;
        if state.progress.raw_cursor < first {
            // Records before the store's first index are gone
            state.progress.raw_cursor = first;
        }

        while state.progress.raw_cursor < last {
            let index = state.progress.raw_cursor;
            let record = self.channels.get_record(channel, index)?;

            match self.parser.parse(descriptor, &record, base) {
                ParseOutcome::Sample(sample) => {
                    if self.append(descriptor, state, sample) {
                        step.appended += 1;
                    } else {
                        step.malformed += 1;
                        warn!("{} ({}): record {} has a value of the wrong shape", descriptor.id, descriptor.name, index);
                    }
                }
                ParseOutcome::Malformed(reason) => {
                    step.malformed += 1;
                    warn!("{} ({}): skipping malformed record {}: {}", descriptor.id, descriptor.name, index, reason);
                }
                ParseOutcome::Pending => {
                    step.blocked = true;
                    break;
                }
            }
            state.progress.raw_cursor += 1;
        }

        if step.appended > 0 || step.malformed > 0 {
            debug!(
                "{}: assembled {} (+{}), skipped {}",
                descriptor.id, state.progress.assembled, step.appended, step.malformed
            );
        }
        Ok(step)
    }

    /// Appends one sample, applying a matching point override.
    ///
    /// Returns false when the value shape does not fit the log.
    fn append(&self, descriptor: &SourceDescriptor, state: &mut SourceState, sample: NormalizedSample) -> bool {
        let forced = self.edits.override_for(descriptor.id, sample.db_time, self.exact_window);

        let pushed = match (&mut state.log, sample.value) {
            (SourceLog::Scalar(log), FixValue::Scalar(v)) => {
                let mut s = Sample::assembled(sample.db_time, v);
                if let Some(OverrideValue::Scalar(fixed)) = forced {
                    s.value = fixed;
                    s.validity = Validity::UserFixed;
                }
                log.push(s);
                true
            }
            (SourceLog::Position(log), FixValue::Position(p)) => {
                let mut s = Sample::assembled(sample.db_time, p);
                if let Some(OverrideValue::Position { lat, lon }) = forced {
                    s.value = LatLon::new(lat, lon);
                    s.validity = Validity::UserFixed;
                }
                log.push(s);
                true
            }
            _ => false,
        };

        if pushed {
            state.pending_external.push_back(sample.external);
            state.progress.assembled += 1;
        }
        pushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SampleKind, Source};
    use navfuse_env::{ChannelId, EditDirective, MemoryChannelStore, MemoryObjectStore, SourceId};

    /// Payload is a decimal number; anything else is malformed.
    struct DecimalParser;

    impl RecordParser for DecimalParser {
        fn parse(&self, _d: &SourceDescriptor, record: &RawRecord, _b: Option<&dyn BaseLookup>) -> ParseOutcome {
            match std::str::from_utf8(&record.payload).ok().and_then(|s| s.parse::<f64>().ok()) {
                Some(v) => ParseOutcome::Sample(NormalizedSample {
                    db_time: record.time,
                    value: FixValue::Scalar(v),
                    external: Some(ExternalTime::new(Some(0.0), record.time)),
                }),
                None => ParseOutcome::Malformed("not a number".into()),
            }
        }
    }

    fn depth_source() -> (Source, MemoryChannelStore) {
        let store = MemoryChannelStore::new();
        store.create_channel(ChannelId(1));
        let desc = SourceDescriptor::raw(SourceId(1), "depth", SampleKind::Depth, ChannelId(1), 1.0);
        (Source::new(desc, 8, 0), store)
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let (source, store) = depth_source();
        for (t, p) in [(0.0, "1.5"), (1.0, "garbage"), (2.0, "2.5")] {
            store.append(ChannelId(1), RawRecord::new(t, p.as_bytes().to_vec())).unwrap();
        }
        let edits = EditBook::new();
        let assembler = Assembler { channels: &store, parser: &DecimalParser, edits: &edits, exact_window: 0.01 };

        let mut state = source.state().write();
        let step = assembler.run(source.descriptor(), &mut state, None).unwrap();
        assert_eq!(step.appended, 2);
        assert_eq!(step.malformed, 1);
        assert_eq!(state.progress.raw_cursor, 3);
        assert_eq!(state.progress.assembled, 2);
        assert!(state.progress.holds());

        // Nothing new: nothing happens
        let step = assembler.run(source.descriptor(), &mut state, None).unwrap();
        assert_eq!(step, AssemblyStep::default());
    }

    #[test]
    fn test_point_override_at_assembly() {
        let (source, store) = depth_source();
        store.append(ChannelId(1), RawRecord::new(5.0, b"10.0".to_vec())).unwrap();

        let objects = MemoryObjectStore::new();
        objects.push(EditDirective::PointOverride {
            source: SourceId(1),
            db_time: 5.002,
            value: OverrideValue::Scalar(42.0),
        });
        let mut edits = EditBook::new();
        edits.poll(&objects);

        let assembler = Assembler { channels: &store, parser: &DecimalParser, edits: &edits, exact_window: 0.01 };
        let mut state = source.state().write();
        assembler.run(source.descriptor(), &mut state, None).unwrap();

        let SourceLog::Scalar(log) = &state.log else { panic!("scalar log expected") };
        let s = log.get(0).unwrap();
        assert_eq!(s.value, 42.0);
        assert_eq!(s.validity, Validity::UserFixed);
    }

    struct NoBaseYet;

    impl BaseLookup for NoBaseYet {
        fn position_at(&self, _time: f64) -> Result<LatLon, QueryError> {
            Err(QueryError::NotYetAvailable)
        }
    }

    #[test]
    fn test_pending_track_mark_keeps_cursor() {
        let record = RawRecord::new(3.0, Vec::new());
        assert_eq!(parse_track_mark(&record, Some(&NoBaseYet)), ParseOutcome::Pending);
        assert!(matches!(parse_track_mark(&record, None), ParseOutcome::Malformed(_)));
    }
}
