//! CSV exchange format for hourly series.
//!
//! Files carry a header row and either one column (values only) or two
//! columns (`timestamp,<value>`); the last column is read as the value.
//! Empty cells are gaps and fail the load.

use std::path::Path;

use colo_core::{ColoError, ColoResult, SnapshotCalendar, TimeSeries};
use csv::{ReaderBuilder, WriterBuilder};
use tracing::info;

fn csv_error(path: &Path, err: csv::Error) -> ColoError {
    if err.is_io_error() {
        match err.into_kind() {
            csv::ErrorKind::Io(io) => ColoError::Io(io),
            other => ColoError::Parse(format!("{}: {other:?}", path.display())),
        }
    } else {
        ColoError::Parse(format!("{}: {err}", path.display()))
    }
}

/// Load an hourly series from CSV.
pub fn load_series(path: &Path) -> ColoResult<TimeSeries> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;

    let mut values = Vec::with_capacity(colo_core::HOURS_PER_YEAR);
    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| csv_error(path, e))?;
        let cell = record.iter().last().unwrap_or("");
        if cell.is_empty() {
            return Err(ColoError::Data(format!(
                "{}: gap at hour {row}",
                path.display()
            )));
        }
        let value: f64 = cell.parse().map_err(|_| {
            ColoError::Data(format!(
                "{}: hour {row} has non-numeric value '{cell}'",
                path.display()
            ))
        })?;
        values.push(value);
    }

    if values.is_empty() {
        return Err(ColoError::Data(format!("{}: no values", path.display())));
    }
    info!(path = %path.display(), hours = values.len(), "loaded series");
    Ok(TimeSeries::new(values))
}

/// Write a series with calendar timestamps.
pub fn write_series(
    path: &Path,
    calendar: &SnapshotCalendar,
    column: &str,
    series: &TimeSeries,
) -> ColoResult<()> {
    if series.len() != calendar.len() {
        return Err(ColoError::Data(format!(
            "{column}: {} values for a {}-hour calendar",
            series.len(),
            calendar.len()
        )));
    }
    let mut wtr = WriterBuilder::new()
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;
    wtr.write_record(["timestamp", column])
        .map_err(|e| csv_error(path, e))?;
    for (ts, value) in calendar.timestamps().zip(series.iter()) {
        wtr.write_record([
            ts.format("%Y-%m-%d %H:%M").to_string(),
            format!("{value:.6}"),
        ])
        .map_err(|e| csv_error(path, e))?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_two_column_files() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,price\n2023-01-01 00:00,40.5\n2023-01-01 01:00,-3").unwrap();
        let series = load_series(file.path()).unwrap();
        assert_eq!(series.values(), &[40.5, -3.0]);
    }

    #[test]
    fn empty_cell_is_a_gap() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,price\n2023-01-01 00:00,40\n2023-01-01 01:00,").unwrap();
        let err = load_series(file.path()).unwrap_err();
        assert_eq!(err.kind(), "data");
        assert!(err.to_string().contains("gap at hour 1"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_series(Path::new("/nonexistent/prices.csv")).unwrap_err();
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solar.csv");
        let cal = SnapshotCalendar::hours(2023, 3).unwrap();
        let series = TimeSeries::new(vec![0.0, 0.25, 0.5]);
        write_series(&path, &cal, "capacity_factor", &series).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("timestamp,capacity_factor\n2023-01-01 00:00,0.000000"));
        assert_eq!(load_series(&path).unwrap(), series);
    }
}
