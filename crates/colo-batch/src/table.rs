//! The flat sweep result table and its comparison view.
//!
//! The CSV rendering uses fixed float precision so that two runs over the
//! same grid and inputs produce byte-identical files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colo_core::Topology;
use serde::{Deserialize, Serialize};

use crate::job::{PointStatus, SweepRecord};

const UNDEFINED: &str = "undefined";

pub const CSV_HEADER: [&str; 17] = [
    "index",
    "scenario",
    "topology",
    "pv_mw",
    "bess_mw",
    "duration_h",
    "status",
    "capex",
    "npv",
    "irr",
    "payback_years",
    "lcos",
    "cycles_per_year",
    "year1_net_revenue",
    "shortfall_mwh",
    "solver_iterations",
    "message",
];

/// Rows in grid order, one per (topology, size) point.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepTable {
    pub rows: Vec<SweepRecord>,
}

/// Row counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub valid: usize,
    pub degraded: usize,
    pub error: usize,
    pub cancelled: usize,
}

/// Best valid point of one topology.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologyBest {
    pub topology: Topology,
    pub row: SweepRecord,
}

/// Apples-to-apples view: the best valid point (highest NPV) of every
/// topology. Degraded, errored and cancelled rows are only counted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepComparison {
    pub best: Vec<TopologyBest>,
    pub counts: StatusCounts,
}

/// Format at fixed precision, printing values that round to zero unsigned.
pub fn fixed(value: f64, precision: usize) -> String {
    // avoid "-0.00" flipping between runs for values that round to zero
    let s = format!("{value:.precision$}");
    if s.trim_start_matches('-').chars().all(|c| c == '0' || c == '.') {
        s.trim_start_matches('-').to_string()
    } else {
        s
    }
}

fn optional(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| UNDEFINED.to_string(), |v| fixed(v, precision))
}

impl SweepTable {
    pub fn new(rows: Vec<SweepRecord>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for row in &self.rows {
            match row.status {
                PointStatus::Valid => counts.valid += 1,
                PointStatus::Degraded => counts.degraded += 1,
                PointStatus::Error => counts.error += 1,
                PointStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }

    pub fn comparison(&self) -> SweepComparison {
        let mut best: Vec<TopologyBest> = Vec::new();
        for topology in Topology::ALL {
            let winner = self
                .rows
                .iter()
                .filter(|r| r.topology == topology && r.is_comparable())
                .filter_map(|r| r.metrics.as_ref().map(|m| (r, m.npv)))
                // strictly greater keeps the earliest row on ties
                .fold(None::<(&SweepRecord, f64)>, |acc, (row, npv)| match acc {
                    Some((_, best_npv)) if npv.total_cmp(&best_npv).is_le() => acc,
                    _ => Some((row, npv)),
                });
            if let Some((row, _)) = winner {
                best.push(TopologyBest {
                    topology,
                    row: row.clone(),
                });
            }
        }
        SweepComparison {
            best,
            counts: self.counts(),
        }
    }

    fn csv_fields(row: &SweepRecord) -> Vec<String> {
        let mut fields = vec![
            row.index.to_string(),
            row.scenario.clone(),
            row.topology.to_string(),
            fixed(row.pv_mw, 3),
            fixed(row.bess_mw, 3),
            fixed(row.duration_h, 3),
            row.status.as_str().to_string(),
        ];
        match &row.metrics {
            Some(m) => fields.extend([
                fixed(m.capex, 2),
                fixed(m.npv, 2),
                optional(m.irr, 6),
                m.payback_years
                    .map_or_else(|| UNDEFINED.to_string(), |y| y.to_string()),
                optional(m.lcos, 4),
                fixed(m.cycles_per_year, 3),
                fixed(m.year1_net_revenue, 2),
                fixed(m.shortfall_mwh, 3),
            ]),
            // no financial values at all, not even zeros
            None => fields.extend(std::iter::repeat(String::new()).take(8)),
        }
        fields.push(
            row.solver_iterations
                .map_or_else(String::new, |i| i.to_string()),
        );
        fields.push(row.message.clone().unwrap_or_default());
        fields
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(CSV_HEADER)
            .context("writing sweep table header")?;
        for row in &self.rows {
            writer
                .write_record(Self::csv_fields(row))
                .with_context(|| format!("writing sweep row {}", row.index))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("flushing sweep table: {e}"))?;
        String::from_utf8(bytes).context("sweep table is not valid UTF-8")
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating table directory '{}'", parent.display()))?;
        }
        let text = self.to_csv_string()?;
        fs::write(path, text)
            .with_context(|| format!("writing sweep table '{}'", path.display()))?;
        Ok(())
    }
}
