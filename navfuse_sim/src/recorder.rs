//! Simulated navigation recorder and the matching record parser.
//!
//! The recorder writes one JSON document per raw record into the in-memory
//! channel store, the way the acquisition software writes its channel
//! files. It can be told to garble a share of the records to exercise the
//! engine's malformed-record path.

use navfuse_core::{
    parse_track_mark, BaseLookup, ExternalTime, FixValue, LatLon, NormalizedSample, ParseOutcome,
    RecordParser, SampleKind, SourceDescriptor,
};
use navfuse_env::{ChannelId, MemoryChannelStore, RawRecord};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::SimError;

// ============================================================================
// PAYLOADS
// ============================================================================

/// One raw record as written by the recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// GNSS fix with the receiver's own date and time-of-day
    Gnss {
        lat: f64,
        lon: f64,
        /// Epoch seconds of UTC midnight, if the sentence carried a date
        date: Option<f64>,
        tod: f64,
    },

    /// Single-valued sensor (heading, depth, ...); most carry no clock
    Scalar { value: f64, tod: Option<f64> },

    /// Cadence mark for a computed track; the record stamp is the mark time
    TrackMark,
}

// ============================================================================
// RECORDER
// ============================================================================

/// Writes JSON payloads into channels, optionally corrupting some.
pub struct Recorder {
    channels: Arc<MemoryChannelStore>,
    rng: ChaCha8Rng,

    /// Probability that a record is replaced by garbage
    corrupt_rate: f64,

    written: u64,
    corrupted: u64,
}

impl Recorder {
    pub fn new(channels: Arc<MemoryChannelStore>, seed: u64) -> Self {
        Self {
            channels,
            rng: ChaCha8Rng::seed_from_u64(seed),
            corrupt_rate: 0.0,
            written: 0,
            corrupted: 0,
        }
    }

    /// Sets the share of records written as garbage.
    pub fn with_corrupt_rate(mut self, rate: f64) -> Self {
        self.corrupt_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Creates a channel for the recorder to write to.
    pub fn open(&self, channel: ChannelId) {
        self.channels.create_channel(channel);
    }

    /// Appends one record stamped `db_time`.
    pub fn write(&mut self, channel: ChannelId, db_time: f64, payload: &Payload) -> Result<u64, SimError> {
        let mut bytes = serde_json::to_vec(payload)?;
        if self.corrupt_rate > 0.0 && self.rng.gen_bool(self.corrupt_rate) {
            // Truncate and flip a byte: never valid JSON
            let cut = self.rng.gen_range(1..bytes.len().max(2));
            bytes.truncate(cut);
            bytes.push(b'#');
            self.corrupted += 1;
        }
        let index = self.channels.append(channel, RawRecord::new(db_time, bytes))?;
        self.written += 1;
        Ok(index)
    }

    /// Stops recording on every listed channel.
    pub fn close(&self, channels: &[ChannelId]) {
        for channel in channels {
            self.channels.close(*channel);
        }
        debug!("Recorder closed after {} records ({} corrupted)", self.written, self.corrupted);
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn corrupted(&self) -> u64 {
        self.corrupted
    }
}

// ============================================================================
// PARSER
// ============================================================================

/// Decodes [`Payload`] records for every source kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRecordParser;

impl RecordParser for JsonRecordParser {
    fn parse(&self, descriptor: &SourceDescriptor, record: &RawRecord, base: Option<&dyn BaseLookup>) -> ParseOutcome {
        let payload: Payload = match serde_json::from_slice(&record.payload) {
            Ok(p) => p,
            Err(e) => return ParseOutcome::Malformed(e.to_string()),
        };

        let (value, external) = match (descriptor.kind, payload) {
            (SampleKind::Track, Payload::TrackMark) => return parse_track_mark(record, base),
            (SampleKind::Position, Payload::Gnss { lat, lon, date, tod }) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                    return ParseOutcome::Malformed(format!("position out of range: {}, {}", lat, lon));
                }
                (FixValue::Position(LatLon::new(lat, lon)), Some(ExternalTime::new(date, tod)))
            }
            (kind, Payload::Scalar { value, tod }) if !kind.is_position_like() => {
                if !value.is_finite() {
                    return ParseOutcome::Malformed("non-finite value".into());
                }
                (FixValue::Scalar(value), tod.map(|t| ExternalTime::new(None, t)))
            }
            (kind, other) => {
                return ParseOutcome::Malformed(format!("{:?} payload on a {:?} source", other, kind));
            }
        };

        ParseOutcome::Sample(NormalizedSample {
            db_time: record.time,
            value,
            external,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navfuse_core::QueryError;
    use navfuse_env::{ChannelStore, SourceId};

    fn gnss_source() -> SourceDescriptor {
        SourceDescriptor::raw(SourceId(1), "gnss", SampleKind::Position, ChannelId(1), 1.0)
    }

    #[test]
    fn test_gnss_payload_roundtrips_through_parser() {
        let store = Arc::new(MemoryChannelStore::new());
        let mut recorder = Recorder::new(store.clone(), 1);
        recorder.open(ChannelId(1));
        let payload = Payload::Gnss { lat: 43.3, lon: 5.37, date: Some(86_400.0), tod: 120.0 };
        recorder.write(ChannelId(1), 86_523.5, &payload).unwrap();

        let record = store.get_record(ChannelId(1), 0).unwrap();
        let ParseOutcome::Sample(sample) = JsonRecordParser.parse(&gnss_source(), &record, None) else {
            panic!("sample expected");
        };
        assert_eq!(sample.db_time, 86_523.5);
        assert_eq!(sample.value, FixValue::Position(LatLon::new(43.3, 5.37)));
        assert_eq!(sample.external, Some(ExternalTime::new(Some(86_400.0), 120.0)));
    }

    #[test]
    fn test_wrong_payload_shape_is_malformed() {
        let record = RawRecord::new(0.0, serde_json::to_vec(&Payload::Scalar { value: 1.0, tod: None }).unwrap());
        assert!(matches!(
            JsonRecordParser.parse(&gnss_source(), &record, None),
            ParseOutcome::Malformed(_)
        ));
    }

    #[test]
    fn test_corrupt_records_never_parse() {
        let store = Arc::new(MemoryChannelStore::new());
        let mut recorder = Recorder::new(store.clone(), 9).with_corrupt_rate(1.0);
        recorder.open(ChannelId(1));
        for i in 0..20 {
            let payload = Payload::Gnss { lat: 1.0, lon: 2.0, date: None, tod: i as f64 };
            recorder.write(ChannelId(1), i as f64, &payload).unwrap();
        }
        assert_eq!(recorder.corrupted(), 20);

        for i in 0..20 {
            let record = store.get_record(ChannelId(1), i).unwrap();
            assert!(matches!(
                JsonRecordParser.parse(&gnss_source(), &record, None),
                ParseOutcome::Malformed(_)
            ));
        }
    }

    struct FixedBase;

    impl BaseLookup for FixedBase {
        fn position_at(&self, time: f64) -> Result<LatLon, QueryError> {
            if time < 10.0 {
                Ok(LatLon::new(1.0, 2.0))
            } else {
                Err(QueryError::NotYetAvailable)
            }
        }
    }

    #[test]
    fn test_track_marks_query_the_base() {
        let track = SourceDescriptor::computed(SourceId(4), "track", SampleKind::Track, SourceId(1), Some(ChannelId(4)), 1.0);
        let mark = |t: f64| RawRecord::new(t, serde_json::to_vec(&Payload::TrackMark).unwrap());

        let ParseOutcome::Sample(sample) = JsonRecordParser.parse(&track, &mark(5.0), Some(&FixedBase)) else {
            panic!("sample expected");
        };
        assert_eq!(sample.value, FixValue::Position(LatLon::new(1.0, 2.0)));
        assert_eq!(JsonRecordParser.parse(&track, &mark(12.0), Some(&FixedBase)), ParseOutcome::Pending);
    }
}
