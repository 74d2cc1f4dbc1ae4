//! Object store abstraction for navigation-data edit directives.

use crate::types::SourceId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Value forced onto a single sample by a point override.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OverrideValue {
    /// Replacement for a scalar sample (heading, depth, ...)
    Scalar(f64),

    /// Replacement for a position sample, in degrees
    Position { lat: f64, lon: f64 },
}

/// An edit made by the operator against recorded navigation data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EditDirective {
    /// Force one sample's value; the sample is exempt from smoothing and
    /// simplification afterwards.
    PointOverride {
        source: SourceId,
        /// Recorder stamp of the targeted raw record
        db_time: f64,
        value: OverrideValue,
    },

    /// Exclude a corrected-time range from all outputs.
    BulkRemove {
        /// Affected sources; empty means every source
        sources: Vec<SourceId>,
        start: f64,
        end: f64,
    },
}

impl EditDirective {
    /// Returns true if the directive concerns the given source.
    pub fn applies_to(&self, id: SourceId) -> bool {
        match self {
            EditDirective::PointOverride { source, .. } => *source == id,
            EditDirective::BulkRemove { sources, .. } => {
                sources.is_empty() || sources.contains(&id)
            }
        }
    }
}

/// Source of pending edit directives.
///
/// Directives are numbered by their position in the store's history;
/// consumers remember how many they have already seen.
pub trait ObjectStore: Send + Sync {
    /// Returns every directive with sequence number `>= seen`.
    fn directives_since(&self, seen: usize) -> Vec<EditDirective>;
}

/// In-memory object store used by the simulator and tests.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    directives: RwLock<Vec<EditDirective>>,
}

impl MemoryObjectStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a directive and returns its sequence number.
    pub fn push(&self, directive: EditDirective) -> usize {
        let mut directives = self.directives.write();
        directives.push(directive);
        directives.len() - 1
    }

    /// Number of directives ever published.
    pub fn len(&self) -> usize {
        self.directives.read().len()
    }

    /// Returns true if nothing was ever published.
    pub fn is_empty(&self) -> bool {
        self.directives.read().is_empty()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn directives_since(&self, seen: usize) -> Vec<EditDirective> {
        self.directives
            .read()
            .iter()
            .skip(seen)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_since() {
        let store = MemoryObjectStore::new();
        store.push(EditDirective::BulkRemove { sources: vec![], start: 0.0, end: 1.0 });
        store.push(EditDirective::PointOverride {
            source: SourceId(1),
            db_time: 5.0,
            value: OverrideValue::Scalar(3.0),
        });

        assert_eq!(store.directives_since(0).len(), 2);
        assert_eq!(store.directives_since(1).len(), 1);
        assert!(store.directives_since(2).is_empty());
    }

    #[test]
    fn test_applies_to() {
        let all = EditDirective::BulkRemove { sources: vec![], start: 0.0, end: 1.0 };
        let some = EditDirective::BulkRemove { sources: vec![SourceId(2)], start: 0.0, end: 1.0 };
        assert!(all.applies_to(SourceId(9)));
        assert!(some.applies_to(SourceId(2)));
        assert!(!some.applies_to(SourceId(3)));
    }
}
