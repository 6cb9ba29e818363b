use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Why a dispatch is not an optimal LP solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedReason {
    Infeasible,
    Unbounded,
    /// The solve ran out of its time budget.
    TimeLimit,
    Numerical,
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DegradedReason::Infeasible => "infeasible",
            DegradedReason::Unbounded => "unbounded",
            DegradedReason::TimeLimit => "time limit",
            DegradedReason::Numerical => "numerical",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Optimal,
    /// Deterministic fallback dispatch; never to be reported as a clean result.
    Degraded(DegradedReason),
}

impl DispatchStatus {
    pub fn is_optimal(&self) -> bool {
        matches!(self, DispatchStatus::Optimal)
    }

    pub fn degraded_reason(&self) -> Option<DegradedReason> {
        match self {
            DispatchStatus::Optimal => None,
            DispatchStatus::Degraded(reason) => Some(*reason),
        }
    }
}

impl fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchStatus::Optimal => f.write_str("optimal"),
            DispatchStatus::Degraded(reason) => write!(f, "degraded ({reason})"),
        }
    }
}

/// Hourly trajectory of one storage unit (MW, MWh).
#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageDispatch {
    pub charge: Vec<f64>,
    pub discharge: Vec<f64>,
    /// State of charge at the end of each snapshot.
    pub soc: Vec<f64>,
    /// State of charge before the first snapshot.
    pub initial_soc: f64,
    pub energy_capacity: f64,
}

impl StorageDispatch {
    pub fn idle(len: usize, energy_capacity: f64) -> Self {
        Self {
            charge: vec![0.0; len],
            discharge: vec![0.0; len],
            soc: vec![0.0; len],
            initial_soc: 0.0,
            energy_capacity,
        }
    }

    /// Net injection into the bus at snapshot `t`.
    pub fn net(&self, t: usize) -> f64 {
        self.discharge[t] - self.charge[t]
    }
}

/// Dispatch outcome for one constrained network. Keyed by component name.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    pub status: DispatchStatus,
    pub iterations: u32,
    pub solve_time_ms: u128,
    /// Total system cost ($).
    pub objective: f64,
    pub generators: BTreeMap<String, Vec<f64>>,
    pub storage: BTreeMap<String, StorageDispatch>,
    /// Served demand of every load (fixed loads echo their profile).
    pub loads: BTreeMap<String, Vec<f64>>,
    pub links: BTreeMap<String, Vec<f64>>,
    /// Shadow price of each bus's energy balance ($/MWh).
    pub bus_prices: BTreeMap<String, Vec<f64>>,
}

impl OptimizationResult {
    pub fn is_optimal(&self) -> bool {
        self.status.is_optimal()
    }

    pub fn generator_total(&self, name: &str) -> f64 {
        self.generators.get(name).map_or(0.0, |v| v.iter().sum())
    }

    pub fn load_total(&self, name: &str) -> f64 {
        self.loads.get(name).map_or(0.0, |v| v.iter().sum())
    }
}
