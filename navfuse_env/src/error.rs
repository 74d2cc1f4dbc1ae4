//! Error types for the NavFuse collaborator boundary.

use crate::types::ChannelId;
use thiserror::Error;

/// Errors that can occur when talking to the channel or object store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EnvError {
    /// The channel handle does not exist in the store
    #[error("Unknown channel: {0}")]
    UnknownChannel(ChannelId),

    /// A record index outside the channel's available range was requested
    #[error("Record {index} out of range for {channel}")]
    IndexOutOfRange { channel: ChannelId, index: u64 },

    /// An append was attempted on a channel that is no longer writable
    #[error("Channel closed: {0}")]
    ChannelClosed(ChannelId),

    /// Appended record stamp went backwards
    #[error("Non-monotonic append on {channel}: {time} < {last}")]
    NonMonotonic { channel: ChannelId, time: f64, last: f64 },
}

impl EnvError {
    /// Creates an out-of-range error.
    pub fn out_of_range(channel: ChannelId, index: u64) -> Self {
        Self::IndexOutOfRange { channel, index }
    }
}
