//! Channel store abstraction for raw navigation records.

use crate::error::EnvError;
use crate::types::{ChannelId, RawRecord, TimeLookup};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Append-only binary channel storage, seen from the fusion engine.
///
/// # Implementations
///
/// - **Production**: wraps the recorder's on-disk channel files
/// - **Simulation / tests**: [`MemoryChannelStore`]
///
/// # Growth
///
/// ```text
///  first                         last (exclusive)
///    |-----------------------------|  <- may grow between any two calls
/// ```
///
/// The fusion engine never creates or deletes channels; it only reads.
pub trait ChannelStore: Send + Sync {
    /// Returns the available index range `[first, last)` of a channel.
    fn get_data_range(&self, channel: ChannelId) -> Result<(u64, u64), EnvError>;

    /// Reads one record by global index.
    fn get_record(&self, channel: ChannelId, index: u64) -> Result<RawRecord, EnvError>;

    /// Returns true while the recorder may still append to the channel.
    fn is_writable(&self, channel: ChannelId) -> bool;

    /// Locates a time among the channel's record stamps.
    fn find_by_time(&self, channel: ChannelId, time: f64) -> TimeLookup;
}

#[derive(Debug, Default)]
struct ChannelData {
    records: Vec<RawRecord>,
    writable: bool,
}

/// In-memory channel store used by the simulator and tests.
///
/// Channels start at global index 0 and never shrink.
#[derive(Debug, Default)]
pub struct MemoryChannelStore {
    channels: RwLock<HashMap<ChannelId, ChannelData>>,
}

impl MemoryChannelStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writable channel (no-op if it already exists).
    pub fn create_channel(&self, channel: ChannelId) {
        self.channels.write().entry(channel).or_insert_with(|| ChannelData {
            records: Vec::new(),
            writable: true,
        });
    }

    /// Appends a record and returns its global index.
    pub fn append(&self, channel: ChannelId, record: RawRecord) -> Result<u64, EnvError> {
        let mut channels = self.channels.write();
        let data = channels
            .get_mut(&channel)
            .ok_or(EnvError::UnknownChannel(channel))?;

        if !data.writable {
            return Err(EnvError::ChannelClosed(channel));
        }
        if let Some(last) = data.records.last() {
            if record.time < last.time {
                return Err(EnvError::NonMonotonic {
                    channel,
                    time: record.time,
                    last: last.time,
                });
            }
        }

        data.records.push(record);
        Ok(data.records.len() as u64 - 1)
    }

    /// Marks a channel as finished; no further appends are accepted.
    pub fn close(&self, channel: ChannelId) {
        if let Some(data) = self.channels.write().get_mut(&channel) {
            data.writable = false;
        }
    }

    /// Number of records currently held by a channel.
    pub fn len(&self, channel: ChannelId) -> usize {
        self.channels
            .read()
            .get(&channel)
            .map(|d| d.records.len())
            .unwrap_or(0)
    }
}

impl ChannelStore for MemoryChannelStore {
    fn get_data_range(&self, channel: ChannelId) -> Result<(u64, u64), EnvError> {
        let channels = self.channels.read();
        let data = channels
            .get(&channel)
            .ok_or(EnvError::UnknownChannel(channel))?;
        Ok((0, data.records.len() as u64))
    }

    fn get_record(&self, channel: ChannelId, index: u64) -> Result<RawRecord, EnvError> {
        let channels = self.channels.read();
        let data = channels
            .get(&channel)
            .ok_or(EnvError::UnknownChannel(channel))?;
        data.records
            .get(index as usize)
            .cloned()
            .ok_or_else(|| EnvError::out_of_range(channel, index))
    }

    fn is_writable(&self, channel: ChannelId) -> bool {
        self.channels
            .read()
            .get(&channel)
            .map(|d| d.writable)
            .unwrap_or(false)
    }

    fn find_by_time(&self, channel: ChannelId, time: f64) -> TimeLookup {
        let channels = self.channels.read();
        let records = match channels.get(&channel) {
            Some(data) if !data.records.is_empty() => &data.records,
            _ => return TimeLookup::Empty,
        };

        let idx = records.partition_point(|r| r.time < time);
        if idx == records.len() {
            TimeLookup::After
        } else if records[idx].time == time {
            TimeLookup::Exact(idx as u64)
        } else if idx == 0 {
            TimeLookup::Before
        } else {
            TimeLookup::Between(idx as u64 - 1, idx as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(times: &[f64]) -> (MemoryChannelStore, ChannelId) {
        let store = MemoryChannelStore::new();
        let ch = ChannelId(1);
        store.create_channel(ch);
        for &t in times {
            store.append(ch, RawRecord::new(t, vec![0])).unwrap();
        }
        (store, ch)
    }

    #[test]
    fn test_append_and_range() {
        let (store, ch) = store_with(&[1.0, 2.0, 3.0]);
        assert_eq!(store.get_data_range(ch).unwrap(), (0, 3));
        assert_eq!(store.get_record(ch, 1).unwrap().time, 2.0);
        assert!(store.get_record(ch, 3).is_err());
    }

    #[test]
    fn test_closed_channel_rejects_append() {
        let (store, ch) = store_with(&[1.0]);
        assert!(store.is_writable(ch));
        store.close(ch);
        assert!(!store.is_writable(ch));
        assert_eq!(
            store.append(ch, RawRecord::new(2.0, vec![])),
            Err(EnvError::ChannelClosed(ch))
        );
    }

    #[test]
    fn test_non_monotonic_append() {
        let (store, ch) = store_with(&[5.0]);
        assert!(matches!(
            store.append(ch, RawRecord::new(4.0, vec![])),
            Err(EnvError::NonMonotonic { .. })
        ));
    }

    #[test]
    fn test_find_by_time() {
        let (store, ch) = store_with(&[1.0, 2.0, 3.0]);
        assert_eq!(store.find_by_time(ch, 0.5), TimeLookup::Before);
        assert_eq!(store.find_by_time(ch, 2.0), TimeLookup::Exact(1));
        assert_eq!(store.find_by_time(ch, 2.5), TimeLookup::Between(1, 2));
        assert_eq!(store.find_by_time(ch, 9.0), TimeLookup::After);
        assert_eq!(store.find_by_time(ChannelId(99), 1.0), TimeLookup::Empty);
    }

    #[test]
    fn test_unknown_channel() {
        let store = MemoryChannelStore::new();
        assert_eq!(
            store.get_data_range(ChannelId(7)),
            Err(EnvError::UnknownChannel(ChannelId(7)))
        );
        assert!(!store.is_writable(ChannelId(7)));
    }
}
