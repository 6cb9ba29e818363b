use std::path::Path;

use anyhow::{Context, Result};
use colo_ts::{load_series, MarketInputs};

pub mod dispatch;
pub mod sweep;
pub mod synth;

/// Load price and solar series into a validated input context. Without
/// `hours` the files must cover a full year; with it the study uses the
/// first `hours` rows.
pub fn load_inputs(
    prices: &Path,
    solar: &Path,
    year: i32,
    hours: Option<usize>,
) -> Result<MarketInputs> {
    let price_series = load_series(prices)?;
    let solar_series = load_series(solar)?;
    let inputs = MarketInputs::from_loaded(year, solar_series, price_series, hours)
        .with_context(|| {
            format!(
                "inputs '{}' and '{}' do not fit the {year} calendar",
                prices.display(),
                solar.display()
            )
        })?;
    Ok(inputs)
}

pub fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "undefined".to_string(), |v| format!("{:.2}%", v * 100.0))
}
