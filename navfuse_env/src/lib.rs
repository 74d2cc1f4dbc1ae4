//! NavFuse Environment Abstraction Layer
//!
//! This crate holds everything the fusion engine talks to but does not own:
//!
//! - **Channel Store**: append-only raw record channels written by the recorder
//! - **Object Store**: operator edit directives (point overrides, bulk removes)
//! - **Survey Context**: the clock used by whatever drives the engine
//!
//! Each boundary is a trait with an in-memory implementation so the engine
//! can be exercised in tests and in the simulator without a recorder.
//!
//! # Example
//!
//! ```ignore
//! use navfuse_env::{ChannelId, ChannelStore, MemoryChannelStore, RawRecord};
//!
//! let store = MemoryChannelStore::new();
//! store.create_channel(ChannelId(1));
//! store.append(ChannelId(1), RawRecord::new(0.0, b"...".to_vec()))?;
//! assert_eq!(store.get_data_range(ChannelId(1))?, (0, 1));
//! ```

mod channel;
mod context;
mod error;
mod objects;
mod tokio_impl;
mod types;

pub use channel::{ChannelStore, MemoryChannelStore};
pub use context::SurveyContext;
pub use error::EnvError;
pub use objects::{EditDirective, MemoryObjectStore, ObjectStore, OverrideValue};
pub use tokio_impl::TokioContext;
pub use types::{ChannelId, RawRecord, SourceId, TimeLookup};
