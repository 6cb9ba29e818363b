//! Hourly snapshot calendar and immutable time series.
//!
//! A [`TimeSeries`] is shared by reference count so the same price or
//! capacity-factor trace can back every scenario of a sweep without copying.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{ColoError, ColoResult};

/// Hours in a non-leap year.
pub const HOURS_PER_YEAR: usize = 8760;

/// Ordered set of hourly snapshots starting 1 January 00:00.
///
/// Leap days are skipped, so a full calendar always has 8760 snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCalendar {
    year: i32,
    len: usize,
}

impl SnapshotCalendar {
    /// Full 8760-hour calendar for `year`.
    pub fn full_year(year: i32) -> Self {
        Self {
            year,
            len: HOURS_PER_YEAR,
        }
    }

    /// First `len` hours of `year`.
    pub fn hours(year: i32, len: usize) -> ColoResult<Self> {
        if len == 0 || len > HOURS_PER_YEAR {
            return Err(ColoError::config(format!(
                "calendar length must be in 1..={HOURS_PER_YEAR}, got {len}"
            )));
        }
        if NaiveDate::from_ymd_opt(year, 1, 1).is_none() {
            return Err(ColoError::config(format!("unsupported calendar year {year}")));
        }
        Ok(Self { year, len })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fraction of a full year covered; used to annualise short studies.
    pub fn year_fraction(&self) -> f64 {
        self.len as f64 / HOURS_PER_YEAR as f64
    }

    /// Wall-clock timestamp of snapshot `idx`.
    pub fn timestamp(&self, idx: usize) -> Option<NaiveDateTime> {
        if idx >= self.len {
            return None;
        }
        let day = (idx / 24) as u32;
        let hour = (idx % 24) as u32;
        let leap = NaiveDate::from_ymd_opt(self.year, 2, 29).is_some();
        // ordinal 60 is Feb 29 in a leap year
        let ordinal = if leap && day >= 59 { day + 2 } else { day + 1 };
        NaiveDate::from_yo_opt(self.year, ordinal)?.and_hms_opt(hour, 0, 0)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        (0..self.len).filter_map(move |i| self.timestamp(i))
    }
}

impl Default for SnapshotCalendar {
    fn default() -> Self {
        Self::full_year(2023)
    }
}

/// Immutable hourly series.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries(Arc<[f64]>);

impl TimeSeries {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values.into())
    }

    pub fn constant(value: f64, len: usize) -> Self {
        Self(vec![value; len].into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, idx: usize) -> Option<f64> {
        self.0.get(idx).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().copied()
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn mean(&self) -> f64 {
        if self.0.is_empty() {
            0.0
        } else {
            self.sum() / self.0.len() as f64
        }
    }

    pub fn max(&self) -> f64 {
        self.0.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// First `len` values as a new series.
    pub fn truncated(&self, len: usize) -> ColoResult<Self> {
        if len > self.len() {
            return Err(ColoError::Data(format!(
                "series has {} values, {len} requested",
                self.len()
            )));
        }
        Ok(Self(self.0[..len].into()))
    }
}

impl From<Vec<f64>> for TimeSeries {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

/// Per-snapshot parameter: either a constant or a full series.
#[derive(Debug, Clone, PartialEq)]
pub enum Profile {
    Constant(f64),
    Series(TimeSeries),
}

impl Profile {
    /// Value at snapshot `t`. A series shorter than `t` yields 0.
    #[inline]
    pub fn at(&self, t: usize) -> f64 {
        match self {
            Profile::Constant(v) => *v,
            Profile::Series(s) => s.get(t).unwrap_or(0.0),
        }
    }

    pub fn total(&self, len: usize) -> f64 {
        (0..len).map(|t| self.at(t)).sum()
    }

    pub fn check_len(&self, len: usize, what: &str) -> ColoResult<()> {
        match self {
            Profile::Series(s) if s.len() != len => Err(ColoError::Data(format!(
                "{what}: series has {} values but calendar has {len} snapshots",
                s.len()
            ))),
            _ => Ok(()),
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Profile::Constant(0.0)
    }
}

impl From<TimeSeries> for Profile {
    fn from(series: TimeSeries) -> Self {
        Profile::Series(series)
    }
}
