//! Sweep grid expansion.
//!
//! A grid is the cartesian product of topologies and sizing ranges, iterated
//! topology-major: topology, then PV MW, BESS MW, duration. The position in
//! that order is the row index of the result table.

use colo_core::{ColoError, ColoResult, SizingParams, Topology};
use serde::{Deserialize, Serialize};

/// Step counts above this are almost certainly a typo in the grid definition.
const MAX_STEPS: usize = 10_000;

/// One sizing axis: either explicit values or an inclusive stepped range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SweepRange {
    Values(Vec<f64>),
    Stepped { start: f64, stop: f64, step: f64 },
}

impl SweepRange {
    pub fn single(value: f64) -> Self {
        SweepRange::Values(vec![value])
    }

    /// Expand to concrete values. `axis` names the range in error messages.
    pub fn values(&self, axis: &str) -> ColoResult<Vec<f64>> {
        let values = match self {
            SweepRange::Values(values) => values.clone(),
            SweepRange::Stepped { start, stop, step } => {
                if !(*step > 0.0) || !step.is_finite() {
                    return Err(ColoError::Configuration(format!(
                        "{axis}: step must be > 0, got {step}"
                    )));
                }
                if stop < start {
                    return Err(ColoError::Configuration(format!(
                        "{axis}: stop {stop} is below start {start}"
                    )));
                }
                let steps = ((stop - start) / step + 1e-9).floor() as usize;
                if steps > MAX_STEPS {
                    return Err(ColoError::Configuration(format!(
                        "{axis}: {steps} steps exceeds the limit of {MAX_STEPS}"
                    )));
                }
                // multiply rather than accumulate so values do not drift
                (0..=steps)
                    .map(|i| round_to_grid(start + i as f64 * step))
                    .collect()
            }
        };
        if values.is_empty() {
            return Err(ColoError::Configuration(format!("{axis}: range is empty")));
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(ColoError::Configuration(format!(
                "{axis}: non-finite value {bad}"
            )));
        }
        Ok(values)
    }
}

fn round_to_grid(v: f64) -> f64 {
    (v * 1e9).round() / 1e9
}

/// Sweep axes plus the topologies to evaluate at every size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepGrid {
    #[serde(default = "all_topologies")]
    pub topologies: Vec<Topology>,
    pub pv_mw: SweepRange,
    pub bess_mw: SweepRange,
    pub duration_h: SweepRange,
    /// Grid connection override applied to every point.
    #[serde(default)]
    pub connection_mw: Option<f64>,
}

fn all_topologies() -> Vec<Topology> {
    Topology::ALL.to_vec()
}

/// A single position in the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPoint {
    pub index: usize,
    pub topology: Topology,
    pub sizing: SizingParams,
}

impl SweepGrid {
    /// Expand into points in iteration order.
    pub fn points(&self) -> ColoResult<Vec<SweepPoint>> {
        if self.topologies.is_empty() {
            return Err(ColoError::Configuration("grid lists no topologies".into()));
        }
        let pv = self.pv_mw.values("pv_mw")?;
        let bess = self.bess_mw.values("bess_mw")?;
        let duration = self.duration_h.values("duration_h")?;

        let capacity = self.topologies.len() * pv.len() * bess.len() * duration.len();
        let mut points = Vec::with_capacity(capacity);
        for &topology in &self.topologies {
            for &pv_mw in &pv {
                for &bess_mw in &bess {
                    for &duration_h in &duration {
                        let mut sizing = SizingParams::new(pv_mw, bess_mw, duration_h);
                        if let Some(connection) = self.connection_mw {
                            sizing = sizing.with_connection(connection);
                        }
                        points.push(SweepPoint {
                            index: points.len(),
                            topology,
                            sizing,
                        });
                    }
                }
            }
        }
        Ok(points)
    }
}
