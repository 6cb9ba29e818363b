use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colo_core::SnapshotCalendar;
use colo_ts::{synthetic_prices, synthetic_solar_cf, write_series};

pub const PRICES_FILE: &str = "prices.csv";
pub const SOLAR_FILE: &str = "solar.csv";

pub fn handle(year: i32, hours: usize, seed: u64, out: &Path) -> Result<()> {
    let calendar = SnapshotCalendar::hours(year, hours)?;
    fs::create_dir_all(out)
        .with_context(|| format!("creating output directory '{}'", out.display()))?;

    let prices = synthetic_prices(&calendar, seed);
    let solar = synthetic_solar_cf(&calendar, seed);
    let prices_path = out.join(PRICES_FILE);
    let solar_path = out.join(SOLAR_FILE);
    write_series(&prices_path, &calendar, "price", &prices)?;
    write_series(&solar_path, &calendar, "capacity_factor", &solar)?;

    println!(
        "Wrote {hours} hours: {} (mean {:.2} $/MWh), {} (mean cf {:.3})",
        prices_path.display(),
        prices.mean(),
        solar_path.display(),
        solar.mean()
    );
    Ok(())
}
