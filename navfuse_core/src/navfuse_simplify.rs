//! The "SIMPLIFY" Stage - Track Reduction to Anchors
//!
//! A smoothed path is reduced to anchor points; every sample between two
//! anchors is projected onto the straight line joining them by linear
//! time interpolation. Two variants pick the next anchor:
//!
//! 1. **Distance threshold** (absolute positions): the first sample farther
//!    than `threshold` meters from the current anchor.
//! 2. **Minimum heading deviation** (computed tracks): among samples within
//!    a search radius, the one whose bearing from the anchor deviates least
//!    from the previous leg.
//!
//! Both variants share one contract: anchors keep their value, intermediates
//! are moved, everything in the reduced range ends `Simplified` (or stays
//! `Invalid` when removed by an edit). A `UserFixed` sample always becomes
//! an anchor verbatim.
//!
//! While a source is still open, a search that runs off the end of the
//! preprocessed range reports no progress; once the source is closed the
//! last available sample closes the final segment.

use crate::geodesy::{bearing_deg, bearing_delta_deg, planar_distance_m};
use crate::record_log::{LatLon, RecordLog, Validity};

// ============================================================================
// PARAMETERS
// ============================================================================

/// Inputs shared by both variants.
#[derive(Debug, Clone, Copy)]
pub struct SimplifyWindow {
    /// First sample not yet processed
    pub processed: usize,
    /// End of the preprocessed range (exclusive)
    pub preprocessed: usize,
    /// True when no more samples can ever arrive for this source
    pub closed: bool,
}

/// Settings of the minimum-heading-deviation variant.
#[derive(Debug, Clone, Copy)]
pub struct HeadingSearch {
    /// Candidate radius around the current anchor (meters)
    pub radius_m: f64,
    /// Legs shorter than this carry no trustworthy bearing (meters)
    pub min_leg_m: f64,
}

/// What ended a forward scan from the current anchor.
enum ScanEnd {
    /// A sample satisfied the variant's anchor rule
    Anchor(usize),
    /// Ran off the available range
    Exhausted,
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Last valid processed sample, i.e. the current anchor.
fn current_anchor(log: &RecordLog<LatLon>, processed: usize) -> Option<usize> {
    (0..processed)
        .rev()
        .find(|&i| log.get(i).map_or(false, |s| s.validity.is_valid()))
}

/// Last valid sample in `[from, to)`.
fn last_valid(log: &RecordLog<LatLon>, from: usize, to: usize) -> Option<usize> {
    (from..to)
        .rev()
        .find(|&i| log.get(i).map_or(false, |s| s.validity.is_valid()))
}

/// Makes sure an anchor exists, promoting the first valid sample if needed.
///
/// Returns the anchor and the updated processed count, or `None` when the
/// window holds no valid sample yet.
fn bootstrap(log: &mut RecordLog<LatLon>, window: &mut SimplifyWindow) -> Option<usize> {
    if let Some(a) = current_anchor(log, window.processed) {
        return Some(a);
    }

    let first = (window.processed..window.preprocessed)
        .find(|&i| log.get(i).map_or(false, |s| s.validity.is_valid()));

    match first {
        Some(f) => {
            if let Some(s) = log.get_mut(f) {
                s.validity = Validity::Simplified;
            }
            window.processed = f + 1;
            Some(f)
        }
        None => {
            // Only removed samples so far; they are final as they are
            window.processed = window.preprocessed;
            None
        }
    }
}

/// Projects the samples strictly between two anchors onto their chord and
/// finalizes the segment.
fn close_segment(log: &mut RecordLog<LatLon>, anchor: usize, next: usize) {
    let (Some(a), Some(b)) = (log.get(anchor).copied(), log.get(next).copied()) else {
        return;
    };
    let span = b.corrected_time - a.corrected_time;

    for i in anchor + 1..next {
        if let Some(s) = log.get_mut(i) {
            if !s.validity.is_valid() {
                continue;
            }
            let frac = if span > 0.0 {
                ((s.corrected_time - a.corrected_time) / span).clamp(0.0, 1.0)
            } else {
                0.0
            };
            s.value = LatLon::new(
                a.value.lat + (b.value.lat - a.value.lat) * frac,
                a.value.lon + (b.value.lon - a.value.lon) * frac,
            );
            s.validity = Validity::Simplified;
        }
    }

    if let Some(s) = log.get_mut(next) {
        s.validity = Validity::Simplified;
    }
}

/// Resolves a scan that ran off the end: closes on the last valid sample
/// when the source is finished, otherwise waits.
fn resolve_exhausted(log: &RecordLog<LatLon>, window: &mut SimplifyWindow) -> Option<usize> {
    if !window.closed {
        return None;
    }
    match last_valid(log, window.processed, window.preprocessed) {
        Some(last) => Some(last),
        None => {
            window.processed = window.preprocessed;
            None
        }
    }
}

// ============================================================================
// DISTANCE-THRESHOLD VARIANT
// ============================================================================

/// Runs the distance-threshold simplifier as far as the window allows.
///
/// Returns the new processed count.
pub fn simplify_distance(log: &mut RecordLog<LatLon>, mut window: SimplifyWindow, threshold_m: f64) -> usize {
    let Some(mut anchor) = bootstrap(log, &mut window) else {
        return window.processed;
    };

    while window.processed < window.preprocessed {
        let Some(origin) = log.get(anchor).map(|s| s.value) else {
            break;
        };

        let mut end = ScanEnd::Exhausted;
        for k in window.processed..window.preprocessed {
            let Some(s) = log.get(k) else { break };
            match s.validity {
                Validity::Invalid => continue,
                Validity::UserFixed => {
                    end = ScanEnd::Anchor(k);
                    break;
                }
                _ if planar_distance_m(origin, s.value) > threshold_m => {
                    end = ScanEnd::Anchor(k);
                    break;
                }
                _ => {}
            }
        }

        let next = match end {
            ScanEnd::Anchor(k) => k,
            ScanEnd::Exhausted => match resolve_exhausted(log, &mut window) {
                Some(last) => last,
                None => break,
            },
        };

        close_segment(log, anchor, next);
        anchor = next;
        window.processed = next + 1;
    }

    window.processed
}

// ============================================================================
// MINIMUM-HEADING-DEVIATION VARIANT
// ============================================================================

/// Picks the candidate leg that best continues the previous bearing.
///
/// `candidates` holds `(index, distance_m, bearing_deg)` in log order.
fn pick_straightest(candidates: &[(usize, f64, f64)], previous: Option<f64>, min_leg_m: f64) -> Option<(usize, f64, f64)> {
    let eligible: Vec<&(usize, f64, f64)> = candidates.iter().filter(|c| c.1 >= min_leg_m).collect();
    if eligible.is_empty() {
        return candidates.last().copied();
    }

    let best = match previous {
        // First leg: the longest run available
        None => eligible
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)),
        Some(prev) => eligible.iter().min_by(|a, b| {
            let da = bearing_delta_deg(a.2, prev);
            let db = bearing_delta_deg(b.2, prev);
            da.partial_cmp(&db)
                .unwrap_or(std::cmp::Ordering::Equal)
                // Ties go to the longer leg
                .then(b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
        }),
    };
    best.map(|c| **c)
}

/// Runs the minimum-heading-deviation simplifier as far as the window allows.
///
/// `last_bearing` carries the bearing of the previous leg across calls.
/// Returns the new processed count.
pub fn simplify_min_heading(
    log: &mut RecordLog<LatLon>,
    mut window: SimplifyWindow,
    search: HeadingSearch,
    last_bearing: &mut Option<f64>,
) -> usize {
    let Some(mut anchor) = bootstrap(log, &mut window) else {
        return window.processed;
    };

    while window.processed < window.preprocessed {
        let Some(origin) = log.get(anchor).map(|s| s.value) else {
            break;
        };

        let mut candidates: Vec<(usize, f64, f64)> = Vec::new();
        let mut forced = None;
        let mut beyond = None;

        for k in window.processed..window.preprocessed {
            let Some(s) = log.get(k) else { break };
            match s.validity {
                Validity::Invalid => continue,
                Validity::UserFixed => {
                    forced = Some(k);
                    break;
                }
                _ => {
                    let d = planar_distance_m(origin, s.value);
                    if d > search.radius_m {
                        beyond = Some(k);
                        break;
                    }
                    candidates.push((k, d, bearing_deg(origin, s.value)));
                }
            }
        }

        let next = if let Some(u) = forced {
            u
        } else if beyond.is_none() && !window.closed {
            break;
        } else if let Some((k, _, _)) = pick_straightest(&candidates, *last_bearing, search.min_leg_m) {
            k
        } else if let Some(b) = beyond {
            b
        } else {
            // Closed, nothing valid left
            window.processed = window.preprocessed;
            break;
        };

        if let Some(target) = log.get(next).map(|s| s.value) {
            if planar_distance_m(origin, target) >= search.min_leg_m {
                *last_bearing = Some(bearing_deg(origin, target));
            }
        }

        close_segment(log, anchor, next);
        anchor = next;
        window.processed = next + 1;
    }

    window.processed
}
