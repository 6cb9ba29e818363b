//! Dispatch Optimizer.
//!
//! [`optimize`] never fails because the LP is infeasible: a failed solve is
//! replaced by a deterministic fallback flagged [`DispatchStatus::Degraded`],
//! so one bad sweep point cannot abort the sweep. Errors are reserved for
//! problems that could not be set up at all.

mod fallback;
mod lp;
mod types;

use std::collections::BTreeMap;

use colo_core::{ColoResult, LoadDemand, Network};
use tracing::{info, warn};

pub use lp::SolveOptions;
pub use types::{DegradedReason, DispatchStatus, OptimizationResult, StorageDispatch};

use crate::constraints::ConstrainedNetwork;

/// Energy-balance residual above which a solved dispatch is logged (MW).
pub const BALANCE_TOLERANCE_MW: f64 = 1e-3;

/// Solve the hourly dispatch of a constrained network.
pub fn optimize(cn: &ConstrainedNetwork, options: &SolveOptions) -> ColoResult<OptimizationResult> {
    let result = match lp::solve_lp(cn, options)? {
        lp::LpOutcome::Solved(result) => result,
        lp::LpOutcome::Failed { reason, iterations } => {
            warn!(
                scenario = %cn.built.scenario.name,
                %reason,
                "dispatch degraded, using fallback"
            );
            fallback::fallback_dispatch(&cn.built, reason, iterations)
        }
    };

    if result.is_optimal() {
        let residual = max_balance_residual(&cn.built.network, &result);
        if residual > BALANCE_TOLERANCE_MW {
            warn!(
                scenario = %cn.built.scenario.name,
                residual_mw = residual,
                "energy balance residual exceeds tolerance"
            );
        }
    }

    info!(
        scenario = %cn.built.scenario.name,
        status = %result.status,
        objective = result.objective,
        iterations = result.iterations,
        "dispatch complete"
    );
    Ok(result)
}

/// Per-bus, per-snapshot mismatch `supply − demand` of a dispatch.
///
/// Supply is generation + discharge + link imports (after efficiency);
/// demand is served load + charge + link exports.
pub fn balance_residuals(network: &Network, result: &OptimizationResult) -> Vec<(String, Vec<f64>)> {
    let t_len = result
        .bus_prices
        .values()
        .next()
        .map_or(0, |prices| prices.len());
    let series = |map: &BTreeMap<String, Vec<f64>>, name: &str, t: usize| {
        map.get(name).and_then(|v| v.get(t).copied()).unwrap_or(0.0)
    };

    network
        .buses()
        .into_iter()
        .filter(|b| result.bus_prices.contains_key(&b.name))
        .map(|bus| {
            let residuals = (0..t_len)
                .map(|t| {
                    let mut net = 0.0;
                    for g in network.generators().iter().filter(|g| g.bus == bus.id) {
                        net += series(&result.generators, &g.name, t);
                    }
                    for s in network.storage_units().iter().filter(|s| s.bus == bus.id) {
                        if let Some(d) = result.storage.get(&s.name) {
                            net += d.net(t);
                        }
                    }
                    for l in network.loads().iter().filter(|l| l.bus == bus.id) {
                        net -= match &l.demand {
                            LoadDemand::Fixed(p) => p.at(t),
                            LoadDemand::Free { .. } => series(&result.loads, &l.name, t),
                        };
                    }
                    for link in network.links() {
                        let f = series(&result.links, &link.name, t);
                        if link.bus0 == bus.id {
                            net -= f;
                        }
                        if link.bus1 == bus.id {
                            net += link.efficiency * f;
                        }
                    }
                    net
                })
                .collect();
            (bus.name.clone(), residuals)
        })
        .collect()
}

/// Largest absolute energy-balance residual across all buses and snapshots.
pub fn max_balance_residual(network: &Network, result: &OptimizationResult) -> f64 {
    balance_residuals(network, result)
        .iter()
        .flat_map(|(_, r)| r.iter())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()))
}
