//! The "GET" Stage - Point-in-Time Interpolated Queries
//!
//! Answers "value at time T" over the processed prefix of a record log:
//!
//! 1. Binary search by corrected time for the bracketing pair.
//! 2. Exact-hit short-circuit within a small window.
//! 3. Scalars: mean of the bracket plus the nearer outer neighbor
//!    (circular mean for angles).
//! 4. Positions: cubic Bezier over the bracket. The interior control points
//!    are recovered from the cache: the unique polynomial through the
//!    bracket and its processed outer neighbors fixes the end tangents, and
//!    `quality` blends them from the straight chord (0) to that curve (1).
//!    The smoothing stage already ran on the cached positions, so the curve
//!    is fitted to cached samples rather than raw fixes.
//! 5. Derived heading/speed: two position queries around T, then bearing
//!    and haversine distance over elapsed time.
//!
//! The search only ever reads samples below `processed`, which are final.

use nalgebra::Vector2;
use navfuse_env::SourceId;
use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::geodesy::{bearing_deg, circular_mean_deg, from_vec, haversine_m, to_vec};
use crate::navfuse_smooth::bezier_vec;
use crate::record_log::{LatLon, RecordLog, Sample};
use crate::source::Progress;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Value carried by a query result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FixValue {
    Scalar(f64),
    Position(LatLon),
}

impl FixValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            FixValue::Scalar(v) => Some(*v),
            FixValue::Position(_) => None,
        }
    }

    pub fn as_position(&self) -> Option<LatLon> {
        match self {
            FixValue::Position(p) => Some(*p),
            FixValue::Scalar(_) => None,
        }
    }
}

/// A successful query result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub source: SourceId,

    /// Corrected time the value holds at
    pub time: f64,

    pub value: FixValue,

    /// True when the value was returned unchanged from the cache
    pub exact: bool,
}

/// Bracketing pair around a query time, as log indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bracket {
    pub left: usize,
    /// Equal to `left` when the time hits the last aligned sample
    pub right: usize,
}

// ============================================================================
// BRACKET SEARCH
// ============================================================================

/// Finds the bracket around `time` among the aligned samples.
///
/// Failure modes follow the data state: no aligned data or a time past the
/// aligned range is `NotYetAvailable` when more samples are already waiting
/// for alignment, `OutOfRange` otherwise.
pub fn locate<V: Copy>(log: &RecordLog<V>, progress: &Progress, time: f64) -> Result<Bracket, QueryError> {
    let aligned = progress.aligned.min(log.len());
    let waiting = progress.assembled > aligned;

    if aligned == 0 {
        return Err(if waiting { QueryError::NotYetAvailable } else { QueryError::OutOfRange });
    }

    let (Some(first), Some(last)) = (log.get(0), log.get(aligned - 1)) else {
        return Err(QueryError::OutOfRange);
    };
    if !(time >= first.corrected_time) {
        return Err(QueryError::OutOfRange);
    }
    if time > last.corrected_time {
        return Err(if waiting { QueryError::NotYetAvailable } else { QueryError::OutOfRange });
    }

    let n = log.partition_by_time(aligned, time);
    if n >= aligned {
        return Ok(Bracket { left: aligned - 1, right: aligned - 1 });
    }
    Ok(Bracket { left: n - 1, right: n })
}

// ============================================================================
// SHARED QUERY STEPS
// ============================================================================

/// Validated view over the final prefix of one log.
struct Cache<'a, V> {
    log: &'a RecordLog<V>,
    processed: usize,
}

impl<'a, V: Copy> Cache<'a, V> {
    /// A usable (processed, not removed) sample.
    fn usable(&self, index: usize) -> Option<&'a Sample<V>> {
        if index >= self.processed {
            return None;
        }
        self.log.get(index).filter(|s| s.validity.is_valid())
    }

    /// Exact-hit check against the nearer bracket sample.
    fn exact_hit(&self, b: Bracket, time: f64, window: f64) -> Option<Result<&'a Sample<V>, QueryError>> {
        let near = [b.left, b.right]
            .into_iter()
            .filter_map(|i| self.log.get(i).map(|s| (i, s)))
            .min_by(|a, c| {
                let da = (a.1.corrected_time - time).abs();
                let dc = (c.1.corrected_time - time).abs();
                da.partial_cmp(&dc).unwrap_or(std::cmp::Ordering::Equal)
            })?;

        if (near.1.corrected_time - time).abs() > window || near.0 >= self.processed {
            return None;
        }
        if near.1.validity.is_valid() {
            Some(Ok(near.1))
        } else {
            Some(Err(QueryError::Removed))
        }
    }

    /// Both bracket samples, checked processed and not removed.
    fn pair(&self, b: Bracket) -> Result<(&'a Sample<V>, &'a Sample<V>), QueryError> {
        if b.right >= self.processed {
            return Err(QueryError::NotYetAvailable);
        }
        match (self.usable(b.left), self.usable(b.right)) {
            (Some(l), Some(r)) => Ok((l, r)),
            _ => Err(QueryError::Removed),
        }
    }

    fn before(&self, b: Bracket) -> Option<&'a Sample<V>> {
        b.left.checked_sub(1).and_then(|i| self.usable(i))
    }

    fn after(&self, b: Bracket) -> Option<&'a Sample<V>> {
        self.usable(b.right + 1)
    }
}

// ============================================================================
// SCALAR QUERIES
// ============================================================================

/// Scalar value at `time`.
pub fn query_scalar(
    log: &RecordLog<f64>,
    progress: &Progress,
    time: f64,
    angular: bool,
    exact_window: f64,
) -> Result<(f64, bool), QueryError> {
    let bracket = locate(log, progress, time)?;
    let cache = Cache { log, processed: progress.processed };

    if let Some(hit) = cache.exact_hit(bracket, time, exact_window) {
        return hit.map(|s| (s.value, true));
    }
    if bracket.left == bracket.right {
        // On the last aligned sample, which is not final yet
        return Err(QueryError::NotYetAvailable);
    }

    let (l, r) = cache.pair(bracket)?;
    let mut values = vec![l.value, r.value];

    let outer = match (cache.before(bracket), cache.after(bracket)) {
        (Some(b), Some(a)) => {
            // Ties go to the earlier neighbor
            if a.corrected_time - time < time - b.corrected_time {
                Some(a)
            } else {
                Some(b)
            }
        }
        (b, a) => b.or(a),
    };
    if let Some(o) = outer {
        values.push(o.value);
    }

    let mean = if angular {
        circular_mean_deg(&values)
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    };
    Ok((mean, false))
}

// ============================================================================
// POSITION QUERIES
// ============================================================================

/// Derivative at node `i` of the polynomial through `nodes`.
///
/// Node times must be distinct.
fn node_derivative(nodes: &[(f64, Vector2<f64>)], i: usize) -> Vector2<f64> {
    let xi = nodes[i].0;
    let mut d = Vector2::zeros();
    for (j, &(xj, yj)) in nodes.iter().enumerate() {
        let others = nodes.iter().enumerate().filter(|&(k, _)| k != i && k != j);
        let weight = if j == i {
            others.map(|(_, &(xk, _))| 1.0 / (xi - xk)).sum::<f64>()
        } else {
            others.map(|(_, &(xk, _))| (xi - xk) / (xj - xk)).product::<f64>() / (xj - xi)
        };
        d += yj * weight;
    }
    d
}

/// Interior Bezier controls over the bracket `left..right`.
///
/// `nodes` holds the bracket samples plus any usable outer neighbors, in
/// time order; `left` indexes the left bracket sample within it.
fn interior_controls(nodes: &[(f64, Vector2<f64>)], left: usize, quality: f64) -> [Vector2<f64>; 2] {
    let (t1, p1) = nodes[left];
    let (t2, p2) = nodes[left + 1];
    let h = t2 - t1;
    let chord = p2 - p1;

    let (m1, m2) = if nodes.len() > 2 {
        (node_derivative(nodes, left) * h, node_derivative(nodes, left + 1) * h)
    } else {
        (chord, chord)
    };
    let m1 = chord + (m1 - chord) * quality;
    let m2 = chord + (m2 - chord) * quality;
    [p1 + m1 / 3.0, p2 - m2 / 3.0]
}

/// Position at `time`.
pub fn query_position(
    log: &RecordLog<LatLon>,
    progress: &Progress,
    time: f64,
    quality: f64,
    exact_window: f64,
) -> Result<(LatLon, bool), QueryError> {
    let bracket = locate(log, progress, time)?;
    let cache = Cache { log, processed: progress.processed };

    if let Some(hit) = cache.exact_hit(bracket, time, exact_window) {
        return hit.map(|s| (s.value, true));
    }
    if bracket.left == bracket.right {
        return Err(QueryError::NotYetAvailable);
    }

    let (l, r) = cache.pair(bracket)?;
    let h = r.corrected_time - l.corrected_time;
    if !(h > 0.0) {
        return Ok((l.value, true));
    }

    let node = |s: &Sample<LatLon>| (s.corrected_time, to_vec(s.value));
    let mut nodes = Vec::with_capacity(4);
    let mut left = 0;
    if let Some(b) = cache.before(bracket).filter(|b| b.corrected_time < l.corrected_time) {
        nodes.push(node(b));
        left = 1;
    }
    nodes.push(node(l));
    nodes.push(node(r));
    if let Some(a) = cache.after(bracket).filter(|a| a.corrected_time > r.corrected_time) {
        nodes.push(node(a));
    }

    let [c1, c2] = interior_controls(&nodes, left, quality.clamp(0.0, 1.0));
    let controls = [nodes[left].1, c1, c2, nodes[left + 1].1];
    let u = ((time - l.corrected_time) / h).clamp(0.0, 1.0);
    Ok((from_vec(bezier_vec(u, controls)), false))
}

// ============================================================================
// DERIVED QUERIES
// ============================================================================

/// Which quantity a derived source reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derived {
    /// Course over ground, degrees
    Heading,
    /// Speed over ground, m/s
    Speed,
}

/// Derives heading or speed at `time` from two position queries.
///
/// Tries a centered pair first, then one-sided pairs so that the very ends
/// of the base track still answer.
pub fn query_derived<F>(derived: Derived, time: f64, half_span: f64, mut position_at: F) -> Result<f64, QueryError>
where
    F: FnMut(f64) -> Result<LatLon, QueryError>,
{
    let h = half_span;
    let attempts = [(time - h, time + h), (time - 2.0 * h, time), (time, time + 2.0 * h)];

    let mut first_error = None;
    for (t0, t1) in attempts {
        let pair = position_at(t0).and_then(|a| position_at(t1).map(|b| (a, b)));
        match pair {
            Ok((a, b)) => {
                return Ok(match derived {
                    Derived::Heading => bearing_deg(a, b),
                    Derived::Speed => haversine_m(a, b) / (t1 - t0),
                });
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    Err(first_error.unwrap_or(QueryError::OutOfRange))
}
