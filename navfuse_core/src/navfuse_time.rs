//! The "TIME" Stage - Clock-Drift Time Alignment
//!
//! Recorder stamps (`db_time`) drift against the navigation receiver's own
//! clock and carry a variable logging latency. For every sample reporting an
//! external date/time-of-day we measure the recorder-minus-external offset;
//! the minimum offset over a short trailing window is the least-latency
//! estimate of the clock difference and is subtracted from the recorder
//! stamp to give the corrected time.
//!
//! Midnight crossings are absorbed here: a device that reports a sticky date
//! but a wrapping time-of-day gets 24 h added to its date component.

use serde::{Deserialize, Serialize};

/// Seconds per day.
pub const DAY_S: f64 = 86_400.0;

/// A time-of-day after this is "late evening" for the rollover rule.
const LATE_TOD_S: f64 = 23.0 * 3600.0;

/// A time-of-day before this is "morning" for the rollover rule.
const EARLY_TOD_S: f64 = 12.0 * 3600.0;

/// External date/time estimate reported by a device alongside a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExternalTime {
    /// Epoch seconds of UTC midnight, when the device reported a date
    pub date: Option<f64>,

    /// Seconds since UTC midnight
    pub time_of_day: f64,
}

impl ExternalTime {
    pub fn new(date: Option<f64>, time_of_day: f64) -> Self {
        Self { date, time_of_day }
    }
}

/// One time-correction entry, kept for every sample that carried external time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeCorrection {
    /// Recorder stamp of the sample
    pub db_time: f64,

    /// Effective date after rollover handling
    pub external_date: f64,

    pub external_time_of_day: f64,

    /// Window-minimum of `db_time - (date + time_of_day)`
    pub drift_shift: f64,
}

impl TimeCorrection {
    /// Applies this entry's shift to a recorder stamp.
    #[inline]
    pub fn correct(&self, db_time: f64) -> f64 {
        db_time - self.drift_shift
    }
}

/// Per-source aligner state.
#[derive(Debug, Clone, Default)]
pub struct TimeAligner {
    /// Sticky date component (after rollovers)
    current_date: Option<f64>,

    /// Time-of-day of the previous sample that reported one
    last_tod: Option<f64>,

    /// One entry per sample that carried external time, in log order
    corrections: Vec<TimeCorrection>,
}

impl TimeAligner {
    pub fn new() -> Self {
        Self::default()
    }

    /// All correction entries recorded so far.
    pub fn corrections(&self) -> &[TimeCorrection] {
        &self.corrections
    }

    /// Most recent correction entry, if any.
    pub fn latest(&self) -> Option<&TimeCorrection> {
        self.corrections.last()
    }

    /// The correction in force at `db_time`: the last entry at or before it,
    /// or the earliest entry when `db_time` precedes them all.
    pub fn correction_at(&self, db_time: f64) -> Option<&TimeCorrection> {
        let idx = self.corrections.partition_point(|c| c.db_time <= db_time);
        if idx == 0 {
            self.corrections.first()
        } else {
            self.corrections.get(idx - 1)
        }
    }

    /// Resolves the date component for a new report, applying the
    /// midnight rollover rule.
    fn effective_date(&mut self, external: &ExternalTime, default_date: f64) -> f64 {
        let known = self.current_date.unwrap_or(default_date);
        let reported = external.date.unwrap_or(known);
        let mut date = reported.max(known);

        let crossed_midnight = matches!(self.last_tod, Some(prev) if prev > LATE_TOD_S)
            && external.time_of_day < EARLY_TOD_S;
        if crossed_midnight && date <= known {
            date = known + DAY_S;
        }

        self.current_date = Some(date);
        self.last_tod = Some(external.time_of_day);
        date
    }

    /// Records a sample carrying external time and returns its correction.
    ///
    /// `window` is the number of trailing entries (this one included)
    /// whose minimum offset becomes the drift shift.
    pub fn observe(
        &mut self,
        db_time: f64,
        external: &ExternalTime,
        window: usize,
        default_date: f64,
    ) -> TimeCorrection {
        let date = self.effective_date(external, default_date);
        let offset = db_time - (date + external.time_of_day);

        let start = self.corrections.len().saturating_sub(window.saturating_sub(1));
        let drift_shift = self.corrections[start..]
            .iter()
            .map(|c| c.db_time - (c.external_date + c.external_time_of_day))
            .fold(offset, f64::min);

        let entry = TimeCorrection {
            db_time,
            external_date: date,
            external_time_of_day: external.time_of_day,
            drift_shift,
        };
        self.corrections.push(entry);
        entry
    }
}
