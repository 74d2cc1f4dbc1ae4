//! Operator edit directives retained by the engine.
//!
//! Directives are polled from the object store by sequence number and kept
//! for the engine's lifetime: a point override may name a record that has
//! not been assembled yet, and a reset replays every directive on the
//! rebuilt history.

use navfuse_env::{EditDirective, ObjectStore, OverrideValue, SourceId};

use crate::error::QueryError;

/// Every directive seen so far, in store order.
#[derive(Debug, Default, Clone)]
pub struct EditBook {
    directives: Vec<EditDirective>,
}

impl EditBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of directives consumed from the store.
    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn directives(&self) -> &[EditDirective] {
        &self.directives
    }

    /// Pulls new directives and returns the index of the first new one.
    pub fn poll(&mut self, store: &dyn ObjectStore) -> usize {
        let start = self.directives.len();
        self.directives.extend(store.directives_since(start));
        start
    }

    /// Latest point override for the record stamped `db_time`.
    pub fn override_for(&self, source: SourceId, db_time: f64, window: f64) -> Option<OverrideValue> {
        self.directives.iter().rev().find_map(|d| match d {
            EditDirective::PointOverride { source: s, db_time: t, value }
                if *s == source && (t - db_time).abs() <= window =>
            {
                Some(*value)
            }
            _ => None,
        })
    }

    /// True if a bulk remove covers `corrected_time` for this source.
    pub fn is_removed(&self, source: SourceId, corrected_time: f64) -> bool {
        self.directives.iter().any(|d| match d {
            EditDirective::BulkRemove { start, end, .. } => {
                d.applies_to(source) && corrected_time >= *start && corrected_time <= *end
            }
            _ => false,
        })
    }
}

/// Corrected-time ranges hidden from queries by bulk removes.
///
/// Kept per source next to its log and never cleared by a reset, so a
/// range stays hidden even when no stored sample falls inside it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RemovedSpans {
    spans: Vec<(f64, f64)>,
}

impl RemovedSpans {
    pub fn insert(&mut self, start: f64, end: f64) {
        self.spans.push((start.min(end), start.max(end)));
    }

    pub fn covers(&self, time: f64) -> bool {
        self.spans.iter().any(|&(start, end)| time >= start && time <= end)
    }

    /// `Removed` if `time` lies in a hidden range.
    pub fn check(&self, time: f64) -> Result<(), QueryError> {
        if self.covers(time) {
            Err(QueryError::Removed)
        } else {
            Ok(())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}
