use colo_core::{SnapshotCalendar, HOURS_PER_YEAR};
use colo_ts::{load_series, synthetic_prices, synthetic_solar_cf, write_series, MarketInputs};
use tempfile::tempdir;

#[test]
fn synthetic_year_survives_a_csv_round_trip() {
    let dir = tempdir().unwrap();
    let cal = SnapshotCalendar::full_year(2023);
    let prices = synthetic_prices(&cal, 11);
    let solar = synthetic_solar_cf(&cal, 11);
    write_series(&dir.path().join("prices.csv"), &cal, "price", &prices).unwrap();
    write_series(&dir.path().join("solar.csv"), &cal, "capacity_factor", &solar).unwrap();

    let prices = load_series(&dir.path().join("prices.csv")).unwrap();
    let solar = load_series(&dir.path().join("solar.csv")).unwrap();
    let inputs = MarketInputs::new(cal, solar, prices).unwrap();
    assert_eq!(inputs.len(), HOURS_PER_YEAR);

    let text = std::fs::read_to_string(dir.path().join("prices.csv")).unwrap();
    // 2023 is not a leap year: the last row is New Year's Eve 23:00
    assert!(text.trim_end().lines().last().unwrap().starts_with("2023-12-31 23:00"));
}

#[test]
fn short_file_does_not_fit_a_full_year() {
    let dir = tempdir().unwrap();
    let short = SnapshotCalendar::hours(2023, 48).unwrap();
    let path = dir.path().join("prices.csv");
    write_series(&path, &short, "price", &synthetic_prices(&short, 1)).unwrap();

    let prices = load_series(&path).unwrap();
    let full = SnapshotCalendar::full_year(2023);
    let err = MarketInputs::new(full, synthetic_solar_cf(&full, 1), prices).unwrap_err();
    assert_eq!(err.kind(), "data");
}
