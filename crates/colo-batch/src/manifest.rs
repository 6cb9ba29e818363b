//! Run record written next to the result table.
//!
//! The table holds one row per point; the manifest says what was swept
//! (axes and topologies), under which financial assumptions, and which
//! rows won the per-topology comparison, so a table can be read back
//! without the config that produced it.

use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Utc};
use colo_algo::FinanceParams;
use colo_core::Topology;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::job::SweepRecord;
use crate::table::{StatusCounts, SweepTable};

/// Distinct values of every sweep axis, in first-seen row order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepAxes {
    pub topologies: Vec<Topology>,
    pub pv_mw: Vec<f64>,
    pub bess_mw: Vec<f64>,
    pub duration_h: Vec<f64>,
}

impl SweepAxes {
    pub fn from_rows(rows: &[SweepRecord]) -> Self {
        fn push<T: PartialEq>(values: &mut Vec<T>, value: T) {
            if !values.contains(&value) {
                values.push(value);
            }
        }
        let mut axes = Self::default();
        for row in rows {
            push(&mut axes.topologies, row.topology);
            push(&mut axes.pv_mw, row.pv_mw);
            push(&mut axes.bess_mw, row.bess_mw);
            push(&mut axes.duration_h, row.duration_h);
        }
        axes
    }

    /// Points a full grid over these axes would hold.
    pub fn grid_size(&self) -> usize {
        self.topologies.len() * self.pv_mw.len() * self.bess_mw.len() * self.duration_h.len()
    }
}

/// Table row that won its topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestPoint {
    pub topology: Topology,
    pub index: usize,
    pub scenario: String,
    pub npv: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SweepManifest {
    pub created_at: DateTime<Utc>,
    pub table: String,
    /// Snapshots simulated per point.
    pub hours: usize,
    pub threads: usize,
    pub axes: SweepAxes,
    pub finance: FinanceParams,
    pub counts: StatusCounts,
    pub best: Vec<BestPoint>,
}

impl SweepManifest {
    pub fn new(
        table: &SweepTable,
        hours: usize,
        threads: usize,
        finance: &FinanceParams,
        table_path: &Path,
    ) -> Self {
        let comparison = table.comparison();
        let best = comparison
            .best
            .iter()
            .filter_map(|b| {
                b.row.metrics.as_ref().map(|m| BestPoint {
                    topology: b.topology,
                    index: b.row.index,
                    scenario: b.row.scenario.clone(),
                    npv: m.npv,
                })
            })
            .collect();
        Self {
            created_at: Utc::now(),
            table: table_path.display().to_string(),
            hours,
            threads,
            axes: SweepAxes::from_rows(&table.rows),
            finance: finance.clone(),
            counts: comparison.counts,
            best,
        }
    }

    pub fn num_points(&self) -> usize {
        let c = &self.counts;
        c.valid + c.degraded + c.error + c.cancelled
    }

    /// Check that `table` is the one this manifest describes.
    pub fn verify(&self, table: &SweepTable) -> Result<()> {
        ensure!(
            table.len() == self.num_points(),
            "table has {} rows, manifest records {}",
            table.len(),
            self.num_points()
        );
        ensure!(
            table.counts() == self.counts,
            "row statuses differ from the manifest counts"
        );
        for best in &self.best {
            let row = table
                .rows
                .get(best.index)
                .with_context(|| format!("best {} row {} missing", best.topology, best.index))?;
            ensure!(
                row.scenario == best.scenario,
                "row {} is '{}', manifest names '{}'",
                best.index,
                row.scenario,
                best.scenario
            );
        }
        Ok(())
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating manifest directory '{}'", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serializing sweep manifest")?;
        fs::write(path, json)
            .with_context(|| format!("writing sweep manifest '{}'", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)
            .with_context(|| format!("opening sweep manifest '{}'", path.display()))?;
        serde_json::from_reader(file)
            .with_context(|| format!("parsing sweep manifest '{}'", path.display()))
    }
}
