//! Seeded synthetic profiles for demos and tests.
//!
//! Shapes follow a typical NEM-style day: cheap midday power when solar
//! floods the market, morning and evening price peaks, and a bell-shaped PV
//! output between 06:00 and 19:00. Same seed, same series.

use chrono::{Datelike, Timelike};
use colo_core::{SnapshotCalendar, TimeSeries};
use rand::{rngs::StdRng, Rng, SeedableRng};

const HOURLY_PRICE: [f64; 24] = [
    45.0, 40.0, 38.0, 35.0, 38.0, 55.0, 80.0, 95.0, 85.0, 60.0, 40.0, 25.0, 15.0, 10.0, 15.0,
    30.0, 55.0, 100.0, 130.0, 110.0, 85.0, 70.0, 60.0, 50.0,
];

/// Standard normal draw (Box-Muller).
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Hourly wholesale prices in $/MWh.
pub fn synthetic_prices(calendar: &SnapshotCalendar, seed: u64) -> TimeSeries {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(calendar.year() as u64));
    let values = calendar
        .timestamps()
        .map(|ts| {
            let hour = ts.hour() as usize;
            let seasonal = match ts.month() {
                1 | 2 | 12 => 1.3,
                6..=8 => 1.1,
                _ => 1.0,
            };
            let weekend = if ts.weekday().number_from_monday() >= 6 {
                0.8
            } else {
                1.0
            };
            let mut price = HOURLY_PRICE[hour] * seasonal * weekend + 15.0 * standard_normal(&mut rng);
            // rare scarcity and oversupply events
            if rng.gen::<f64>() < 0.05 {
                match hour {
                    17..=19 => price = rng.gen_range(500.0..3000.0),
                    11..=14 => price = rng.gen_range(-100.0..-20.0),
                    _ => {}
                }
            }
            price.clamp(-1000.0, 15000.0)
        })
        .collect();
    TimeSeries::new(values)
}

/// Hourly PV capacity factors in [0, 1].
pub fn synthetic_solar_cf(calendar: &SnapshotCalendar, seed: u64) -> TimeSeries {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(100 + calendar.year() as u64));
    let values = calendar
        .timestamps()
        .map(|ts| {
            let hour = ts.hour();
            if !(6..=19).contains(&hour) {
                return 0.0;
            }
            let base = (-0.5 * ((hour as f64 - 12.0) / 3.5).powi(2)).exp();
            let seasonal = match ts.month() {
                1 | 2 | 11 | 12 => 1.15,
                5..=8 => 0.75,
                _ => 0.95,
            };
            let weather = if rng.gen::<f64>() < 0.2 {
                rng.gen_range(0.3..0.7)
            } else {
                rng.gen_range(0.85..1.0)
            };
            (base * seasonal * weather).clamp(0.0, 1.0)
        })
        .collect();
    TimeSeries::new(values)
}
