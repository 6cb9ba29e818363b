//! Hourly market inputs for the co-location study.
//!
//! [`MarketInputs`] is the read-only context every sweep worker shares: a
//! PV capacity-factor trace and a wholesale price trace on one snapshot
//! calendar. Construction is the only place the input contract is checked;
//! gaps, NaNs and out-of-range capacity factors are rejected as
//! [`ColoError::Data`], never patched.

use colo_core::{ColoError, ColoResult, SnapshotCalendar, TimeSeries, HOURS_PER_YEAR};
use tracing::debug;

pub mod io;
pub mod synthetic;

pub use io::{load_series, write_series};
pub use synthetic::{synthetic_prices, synthetic_solar_cf};

/// Validated price and PV capacity-factor series on a shared calendar.
#[derive(Debug, Clone)]
pub struct MarketInputs {
    calendar: SnapshotCalendar,
    solar_cf: TimeSeries,
    prices: TimeSeries,
}

impl MarketInputs {
    pub fn new(
        calendar: SnapshotCalendar,
        solar_cf: TimeSeries,
        prices: TimeSeries,
    ) -> ColoResult<Self> {
        check_series("solar capacity factor", &solar_cf, calendar.len())?;
        check_series("price", &prices, calendar.len())?;
        if let Some((idx, v)) = solar_cf
            .iter()
            .enumerate()
            .find(|(_, v)| !(0.0..=1.0).contains(v))
        {
            return Err(ColoError::Data(format!(
                "solar capacity factor at hour {idx} is {v}, expected a value in [0, 1]"
            )));
        }
        debug!(
            hours = calendar.len(),
            mean_cf = solar_cf.mean(),
            mean_price = prices.mean(),
            "market inputs validated"
        );
        Ok(Self {
            calendar,
            solar_cf,
            prices,
        })
    }

    /// Fit series read from disk to a calendar of `year`.
    ///
    /// Without `hours` both series must cover the full 8760-hour year. With
    /// `hours` the study runs on the first `hours` snapshots and the files
    /// must hold at least that many rows. Either way a file longer than a
    /// year is a data error.
    pub fn from_loaded(
        year: i32,
        solar_cf: TimeSeries,
        prices: TimeSeries,
        hours: Option<usize>,
    ) -> ColoResult<Self> {
        for (what, series) in [("solar capacity factor", &solar_cf), ("price", &prices)] {
            if series.len() > HOURS_PER_YEAR {
                return Err(ColoError::Data(format!(
                    "{what} series has {} values, a year has {HOURS_PER_YEAR}",
                    series.len()
                )));
            }
        }
        let Some(len) = hours else {
            return Self::new(SnapshotCalendar::full_year(year), solar_cf, prices);
        };
        let calendar = SnapshotCalendar::hours(year, len)?;
        for (what, series) in [("solar capacity factor", &solar_cf), ("price", &prices)] {
            if series.len() < len {
                return Err(ColoError::Data(format!(
                    "{what} series has {} values, a {len}-hour study needs {len}",
                    series.len()
                )));
            }
        }
        Self::new(calendar, solar_cf.truncated(len)?, prices.truncated(len)?)
    }

    /// Restrict the inputs to the first `len` snapshots of the calendar.
    pub fn truncated(&self, len: usize) -> ColoResult<Self> {
        let calendar = SnapshotCalendar::hours(self.calendar.year(), len)?;
        Self::new(
            calendar,
            self.solar_cf.truncated(len)?,
            self.prices.truncated(len)?,
        )
    }

    pub fn calendar(&self) -> &SnapshotCalendar {
        &self.calendar
    }

    pub fn solar_cf(&self) -> &TimeSeries {
        &self.solar_cf
    }

    pub fn prices(&self) -> &TimeSeries {
        &self.prices
    }

    pub fn len(&self) -> usize {
        self.calendar.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calendar.is_empty()
    }
}

fn check_series(what: &str, series: &TimeSeries, expected: usize) -> ColoResult<()> {
    if series.len() != expected {
        return Err(ColoError::Data(format!(
            "{what} series has {} values, calendar needs {expected}",
            series.len()
        )));
    }
    if let Some(idx) = series.iter().position(|v| !v.is_finite()) {
        return Err(ColoError::Data(format!("{what} series has a gap at hour {idx}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cal(len: usize) -> SnapshotCalendar {
        SnapshotCalendar::hours(2023, len).unwrap()
    }

    #[test]
    fn accepts_well_formed_inputs() {
        let inputs = MarketInputs::new(
            cal(24),
            TimeSeries::constant(0.25, 24),
            TimeSeries::constant(50.0, 24),
        )
        .unwrap();
        assert_eq!(inputs.len(), 24);
        assert_eq!(inputs.truncated(12).unwrap().prices().len(), 12);
    }

    #[test]
    fn length_mismatch_is_data_error() {
        let err = MarketInputs::new(
            cal(24),
            TimeSeries::constant(0.25, 23),
            TimeSeries::constant(50.0, 24),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "data");
    }

    #[test]
    fn nan_is_a_gap() {
        let mut prices = vec![50.0; 24];
        prices[7] = f64::NAN;
        let err = MarketInputs::new(cal(24), TimeSeries::constant(0.1, 24), prices.into())
            .unwrap_err();
        assert!(err.to_string().contains("hour 7"));
    }

    #[test]
    fn capacity_factor_out_of_range_is_rejected() {
        let mut cf = vec![0.5; 24];
        cf[3] = 1.2;
        let err = MarketInputs::new(cal(24), cf.into(), TimeSeries::constant(50.0, 24))
            .unwrap_err();
        assert!(matches!(err, ColoError::Data(_)));
    }

    #[test]
    fn loaded_series_must_span_the_year() {
        let short = MarketInputs::from_loaded(
            2023,
            TimeSeries::constant(0.2, 100),
            TimeSeries::constant(50.0, 100),
            None,
        )
        .unwrap_err();
        assert_eq!(short.kind(), "data");
        assert!(short.to_string().contains("8760"));

        let long = MarketInputs::from_loaded(
            2023,
            TimeSeries::constant(0.2, HOURS_PER_YEAR + 1),
            TimeSeries::constant(50.0, HOURS_PER_YEAR + 1),
            None,
        )
        .unwrap_err();
        assert_eq!(long.kind(), "data");

        let full = MarketInputs::from_loaded(
            2023,
            TimeSeries::constant(0.2, HOURS_PER_YEAR),
            TimeSeries::constant(50.0, HOURS_PER_YEAR),
            None,
        )
        .unwrap();
        assert_eq!(full.calendar().year_fraction(), 1.0);
    }

    #[test]
    fn short_study_takes_leading_hours() {
        let prices = TimeSeries::new((0..72).map(|h| h as f64).collect());
        let inputs =
            MarketInputs::from_loaded(2023, TimeSeries::constant(0.3, 72), prices.clone(), Some(48))
                .unwrap();
        assert_eq!(inputs.len(), 48);
        assert_eq!(inputs.prices().values()[47], 47.0);

        let err =
            MarketInputs::from_loaded(2023, TimeSeries::constant(0.3, 72), prices, Some(96))
                .unwrap_err();
        assert_eq!(err.kind(), "data");
    }

    #[test]
    fn negative_prices_are_allowed() {
        let prices = TimeSeries::new((0..24).map(|h| h as f64 - 12.0).collect());
        assert!(MarketInputs::new(cal(24), TimeSeries::constant(0.0, 24), prices).is_ok());
    }
}
