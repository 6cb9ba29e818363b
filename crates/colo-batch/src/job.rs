use colo_algo::{FinancialResult, OptimizationResult};
use colo_core::{ConstraintOptions, ContractSpec, Scenario, StorageSpec, Topology};
use serde::{Deserialize, Serialize};

use crate::grid::SweepPoint;

/// Settings shared by every point of a sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioTemplate {
    pub storage: StorageSpec,
    pub contract: Option<ContractSpec>,
    pub constraints: ConstraintOptions,
}

impl ScenarioTemplate {
    pub fn scenario(&self, point: &SweepPoint) -> Scenario {
        let mut scenario = Scenario::new(point.topology, point.sizing)
            .with_storage(self.storage.clone())
            .with_constraints(self.constraints.clone());
        if let Some(contract) = &self.contract {
            scenario = scenario.with_contract(contract.clone());
        }
        scenario
    }
}

/// One unit of work: a grid position and the scenario evaluated there.
#[derive(Debug, Clone)]
pub struct SweepJob {
    pub index: usize,
    pub scenario: Scenario,
}

pub fn jobs_from_points(points: &[SweepPoint], template: &ScenarioTemplate) -> Vec<SweepJob> {
    points
        .iter()
        .map(|point| SweepJob {
            index: point.index,
            scenario: template.scenario(point),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointStatus {
    /// Optimal dispatch; financial metrics are comparable.
    Valid,
    /// Fallback dispatch; metrics are reported but flagged.
    Degraded,
    /// Configuration or data error for this point only.
    Error,
    /// Not run, or stopped by the sweep deadline.
    Cancelled,
}

impl PointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointStatus::Valid => "valid",
            PointStatus::Degraded => "degraded",
            PointStatus::Error => "error",
            PointStatus::Cancelled => "cancelled",
        }
    }
}

/// Financial metrics carried by a table row. `None` means undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointMetrics {
    pub capex: f64,
    pub npv: f64,
    pub irr: Option<f64>,
    pub payback_years: Option<u32>,
    pub lcos: Option<f64>,
    pub cycles_per_year: f64,
    pub year1_net_revenue: f64,
    pub shortfall_mwh: f64,
}

impl From<&FinancialResult> for PointMetrics {
    fn from(fin: &FinancialResult) -> Self {
        Self {
            capex: fin.capex,
            npv: fin.npv,
            irr: fin.irr,
            payback_years: fin.payback_years,
            lcos: fin.lcos,
            cycles_per_year: fin.cycles_per_year,
            year1_net_revenue: fin.cash_flows.get(1).copied().unwrap_or(0.0),
            shortfall_mwh: fin.energy.shortfall_mwh,
        }
    }
}

/// One row of the sweep result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRecord {
    pub index: usize,
    pub scenario: String,
    pub topology: Topology,
    pub pv_mw: f64,
    pub bess_mw: f64,
    pub duration_h: f64,
    pub status: PointStatus,
    pub metrics: Option<PointMetrics>,
    /// Error text, degradation caveat or cancellation reason.
    pub message: Option<String>,
    pub solver_iterations: Option<u32>,
}

impl SweepRecord {
    fn bare(job: &SweepJob, status: PointStatus, message: Option<String>) -> Self {
        let sizing = &job.scenario.sizing;
        Self {
            index: job.index,
            scenario: job.scenario.name.clone(),
            topology: job.scenario.topology,
            pv_mw: sizing.pv_mw,
            bess_mw: sizing.bess_mw,
            duration_h: sizing.duration_h,
            status,
            metrics: None,
            message,
            solver_iterations: None,
        }
    }

    pub fn cancelled(job: &SweepJob, reason: &str) -> Self {
        Self::bare(job, PointStatus::Cancelled, Some(reason.to_string()))
    }

    pub fn error(job: &SweepJob, message: String) -> Self {
        Self::bare(job, PointStatus::Error, Some(message))
    }

    pub fn evaluated(job: &SweepJob, dispatch: &OptimizationResult, fin: &FinancialResult) -> Self {
        let status = if fin.valid {
            PointStatus::Valid
        } else {
            PointStatus::Degraded
        };
        let mut record = Self::bare(job, status, fin.caveat.clone());
        record.metrics = Some(PointMetrics::from(fin));
        record.solver_iterations = Some(dispatch.iterations);
        record
    }

    /// True when the row may take part in a financial comparison.
    pub fn is_comparable(&self) -> bool {
        self.status == PointStatus::Valid && self.metrics.is_some()
    }
}
