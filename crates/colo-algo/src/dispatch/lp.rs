//! Hourly dispatch LP solved with Clarabel.
//!
//! ## Formulation
//!
//! All variables are non-negative, one per component per snapshot:
//!
//! ```text
//! p[g,t]    generator output        ≤ p_nom·availability[t]
//! ch[s,t]   storage charge          ≤ p_nom
//! dis[s,t]  storage discharge       ≤ p_nom
//! soc[s,t]  end-of-hour energy      ≤ p_nom·max_hours
//! soc0[s]   energy before hour 0    ≤ p_nom·max_hours
//! w[l,t]    free-load consumption   ≤ p_max
//! f[k,t]    link flow bus0 → bus1   ≤ p_nom
//! ```
//!
//! Energy balance per bus and snapshot (zero cone):
//!
//! ```text
//! −Σp − Σdis + Σch + Σw + Σf_out − Ση·f_in = −fixed_load
//! ```
//!
//! Written this way the dual of the row is the marginal cost of one more MWh
//! of demand at that bus, i.e. the shadow price, with no sign flip.
//!
//! Storage dynamics: `soc[t] = (1 − loss)·soc[t−1] + η_c·ch[t] − dis[t]/η_d`
//! with `soc[−1] = soc0`, and `soc0 = soc[T−1]` when cyclic.
//!
//! Objective: `Σ mc·p + Σ cycling·dis − Σ value·w`.
//!
//! A capacity-factor floor caps annual shortfall energy and, hour by hour,
//! requires the contracted load to be covered by renewable output, storage
//! discharge or shortfall, never by merchant purchases.

use std::collections::HashMap;
use std::time::Duration;

use clarabel::{
    algebra::CscMatrix,
    solver::{DefaultSettingsBuilder, IPSolver, SolverStatus, SupportedConeT},
};
use colo_core::{BusId, ColoError, ColoResult, GenId, LoadDemand, LoadId, Network, StorageId};
use tracing::debug;
use web_time::Instant;

use super::types::{DegradedReason, DispatchStatus, OptimizationResult, StorageDispatch};
use crate::constraints::{ConstrainedNetwork, OperatingConstraint};

/// Solver knobs for one dispatch.
#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Wall-clock budget handed to the solver.
    pub time_limit: Option<Duration>,
    pub max_iter: u32,
    pub verbose: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            time_limit: None,
            max_iter: 200,
            verbose: false,
        }
    }
}

/// Result of the raw LP: either a solved dispatch or the reason it failed.
pub(crate) enum LpOutcome {
    Solved(OptimizationResult),
    Failed {
        reason: DegradedReason,
        iterations: u32,
    },
}

// ============================================================================
// PROBLEM ASSEMBLY
// ============================================================================

/// Column-wise constraint storage: `rows[col]` holds `(row, coeff)` pairs.
struct LpBuilder {
    rows: Vec<Vec<(usize, f64)>>,
    rhs: Vec<f64>,
    cones: Vec<SupportedConeT<f64>>,
}

impl LpBuilder {
    fn new(n_var: usize) -> Self {
        Self {
            rows: vec![Vec::new(); n_var],
            rhs: Vec::new(),
            cones: Vec::new(),
        }
    }

    /// Σ coeffᵢ·xᵢ = b (zero cone)
    fn push_eq(&mut self, coeffs: &[(usize, f64)], b: f64) -> usize {
        let row = self.push_row(coeffs, b);
        match self.cones.last_mut() {
            Some(SupportedConeT::ZeroConeT(n)) => *n += 1,
            _ => self.cones.push(SupportedConeT::ZeroConeT(1)),
        }
        row
    }

    /// Σ coeffᵢ·xᵢ ≤ b (non-negative cone on the slack)
    fn push_leq(&mut self, coeffs: &[(usize, f64)], b: f64) -> usize {
        let row = self.push_row(coeffs, b);
        match self.cones.last_mut() {
            Some(SupportedConeT::NonnegativeConeT(n)) => *n += 1,
            _ => self.cones.push(SupportedConeT::NonnegativeConeT(1)),
        }
        row
    }

    fn push_row(&mut self, coeffs: &[(usize, f64)], b: f64) -> usize {
        let row = self.rhs.len();
        for &(col, val) in coeffs {
            if val != 0.0 {
                self.rows[col].push((row, val));
            }
        }
        self.rhs.push(b);
        row
    }

    /// 0 ≤ x ≤ ub, ub omitted when unbounded.
    fn push_bounds(&mut self, col: usize, ub: Option<f64>) {
        self.push_leq(&[(col, -1.0)], 0.0);
        if let Some(ub) = ub {
            self.push_leq(&[(col, 1.0)], ub.max(0.0));
        }
    }

    /// Convert the accumulated columns to CSC.
    fn into_csc(mut self) -> (CscMatrix<f64>, Vec<f64>, Vec<SupportedConeT<f64>>) {
        let n_var = self.rows.len();
        let n_rows = self.rhs.len();
        let mut col_ptr = Vec::with_capacity(n_var + 1);
        let mut row_idx = Vec::new();
        let mut values = Vec::new();
        let mut nnz = 0;
        for col in self.rows.iter_mut() {
            col_ptr.push(nnz);
            col.sort_by_key(|(r, _)| *r);
            for &(r, v) in col.iter() {
                row_idx.push(r);
                values.push(v);
                nnz += 1;
            }
        }
        col_ptr.push(nnz);
        (
            CscMatrix::new(n_rows, n_var, col_ptr, row_idx, values),
            self.rhs,
            self.cones,
        )
    }
}

/// First column of each component's block of `T` variables.
struct VarLayout {
    n_var: usize,
    gen: HashMap<GenId, usize>,
    charge: HashMap<StorageId, usize>,
    discharge: HashMap<StorageId, usize>,
    soc: HashMap<StorageId, usize>,
    soc0: HashMap<StorageId, usize>,
    free_load: HashMap<LoadId, usize>,
    link: Vec<usize>,
}

impl VarLayout {
    fn new(network: &Network, t_len: usize) -> Self {
        let mut next = 0usize;
        let mut block = |n: usize| {
            let start = next;
            next += n;
            start
        };

        let gen = network
            .generators()
            .iter()
            .map(|g| (g.id, block(t_len)))
            .collect();
        let mut charge = HashMap::new();
        let mut discharge = HashMap::new();
        let mut soc = HashMap::new();
        let mut soc0 = HashMap::new();
        for s in network.storage_units() {
            charge.insert(s.id, block(t_len));
            discharge.insert(s.id, block(t_len));
            soc.insert(s.id, block(t_len));
            soc0.insert(s.id, block(1));
        }
        let free_load = network
            .loads()
            .iter()
            .filter(|l| l.is_free())
            .map(|l| (l.id, block(t_len)))
            .collect();
        let link = network.links().iter().map(|_| block(t_len)).collect();

        Self {
            n_var: next,
            gen,
            charge,
            discharge,
            soc,
            soc0,
            free_load,
            link,
        }
    }
}

/// Buses that carry at least one component or link.
fn active_buses(network: &Network) -> Vec<BusId> {
    let links = network.links();
    network
        .buses()
        .iter()
        .map(|b| b.id)
        .filter(|id| {
            network.attached_count(*id) > 0
                || links.iter().any(|l| l.bus0 == *id || l.bus1 == *id)
        })
        .collect()
}

// ============================================================================
// SOLVE
// ============================================================================

pub(crate) fn solve_lp(cn: &ConstrainedNetwork, options: &SolveOptions) -> ColoResult<LpOutcome> {
    let start = Instant::now();
    let network = &cn.built.network;
    let t_len = cn.built.calendar.len();

    let generators = network.generators();
    let storage = network.storage_units();
    let loads = network.loads();
    let links = network.links();
    let layout = VarLayout::new(network, t_len);
    let mut lp = LpBuilder::new(layout.n_var);
    let mut q = vec![0.0; layout.n_var];

    // ------------------------------------------------------------------------
    // Energy balance (first, so the dual block is contiguous)
    // ------------------------------------------------------------------------
    let buses = active_buses(network);
    let mut balance_rows: Vec<(BusId, usize)> = Vec::with_capacity(buses.len());
    for &bus in &buses {
        let first_row = lp.rhs.len();
        for t in 0..t_len {
            let mut coeffs = Vec::new();
            let mut fixed = 0.0;
            for g in generators.iter().filter(|g| g.bus == bus) {
                coeffs.push((layout.gen[&g.id] + t, -1.0));
            }
            for s in storage.iter().filter(|s| s.bus == bus) {
                coeffs.push((layout.discharge[&s.id] + t, -1.0));
                coeffs.push((layout.charge[&s.id] + t, 1.0));
            }
            for l in loads.iter().filter(|l| l.bus == bus) {
                match &l.demand {
                    LoadDemand::Fixed(profile) => fixed += profile.at(t),
                    LoadDemand::Free { .. } => coeffs.push((layout.free_load[&l.id] + t, 1.0)),
                }
            }
            for (k, link) in links.iter().enumerate() {
                if link.bus0 == bus {
                    coeffs.push((layout.link[k] + t, 1.0));
                }
                if link.bus1 == bus {
                    coeffs.push((layout.link[k] + t, -link.efficiency));
                }
            }
            lp.push_eq(&coeffs, -fixed);
        }
        balance_rows.push((bus, first_row));
    }

    // ------------------------------------------------------------------------
    // Storage dynamics and cyclic boundary
    // ------------------------------------------------------------------------
    for s in &storage {
        let (ch, dis, soc, soc0) = (
            layout.charge[&s.id],
            layout.discharge[&s.id],
            layout.soc[&s.id],
            layout.soc0[&s.id],
        );
        let keep = 1.0 - s.standing_loss;
        for t in 0..t_len {
            let prev = if t == 0 { soc0 } else { soc + t - 1 };
            lp.push_eq(
                &[
                    (soc + t, 1.0),
                    (prev, -keep),
                    (ch + t, -s.efficiency_store),
                    (dis + t, 1.0 / s.efficiency_dispatch),
                ],
                0.0,
            );
        }
        if s.cyclic {
            lp.push_eq(&[(soc0, 1.0), (soc + t_len - 1, -1.0)], 0.0);
        } else {
            lp.push_eq(
                &[(soc0, 1.0)],
                s.initial_soc_fraction * s.energy_capacity().value(),
            );
        }
    }

    // ------------------------------------------------------------------------
    // Variable bounds and objective
    // ------------------------------------------------------------------------
    for g in &generators {
        let col = layout.gen[&g.id];
        for t in 0..t_len {
            lp.push_bounds(col + t, g.p_max_at(t));
            q[col + t] = g.marginal_cost.at(t);
        }
    }
    for s in &storage {
        let e_max = s.energy_capacity().value();
        for t in 0..t_len {
            lp.push_bounds(layout.charge[&s.id] + t, Some(s.p_nom.value()));
            lp.push_bounds(layout.discharge[&s.id] + t, Some(s.p_nom.value()));
            lp.push_bounds(layout.soc[&s.id] + t, Some(e_max));
            q[layout.discharge[&s.id] + t] = s.cycling_cost;
        }
        lp.push_bounds(layout.soc0[&s.id], Some(e_max));
    }
    for l in &loads {
        if let LoadDemand::Free { p_max, value } = &l.demand {
            let col = layout.free_load[&l.id];
            for t in 0..t_len {
                lp.push_bounds(col + t, Some(p_max.value()));
                q[col + t] = -value.at(t);
            }
        }
    }
    for (k, link) in links.iter().enumerate() {
        for t in 0..t_len {
            lp.push_bounds(layout.link[k] + t, Some(link.p_nom.value()));
        }
    }

    // ------------------------------------------------------------------------
    // Operating constraints
    // ------------------------------------------------------------------------
    for constraint in cn.constraints() {
        match constraint {
            OperatingConstraint::CapacityFactorFloor {
                shortfall,
                contract_load,
                renewables,
                storage: units,
                target,
            } => {
                let Some(LoadDemand::Fixed(profile)) = loads
                    .iter()
                    .find(|l| l.id == *contract_load)
                    .map(|l| &l.demand)
                else {
                    return Err(ColoError::Configuration(format!(
                        "{}: capacity-factor floor needs a fixed contracted load",
                        cn.built.scenario.name
                    )));
                };
                let col = layout.gen[shortfall];
                let coeffs: Vec<_> = (0..t_len).map(|t| (col + t, 1.0)).collect();
                lp.push_leq(&coeffs, profile.total(t_len) * (1.0 - target));

                // contract[t] − renewable[t] − discharge[t] − shortfall[t] ≤ 0
                for t in 0..t_len {
                    let mut coeffs = vec![(col + t, -1.0)];
                    for g in renewables {
                        coeffs.push((layout.gen[g] + t, -1.0));
                    }
                    for s in units {
                        coeffs.push((layout.discharge[s] + t, -1.0));
                    }
                    lp.push_leq(&coeffs, -profile.at(t));
                }
            }
            OperatingConstraint::MerchantBuyCap {
                merchant_buy,
                renewables,
                storage: units,
                pct,
            } => {
                let mut coeffs = Vec::with_capacity(t_len * (1 + renewables.len() + units.len()));
                for t in 0..t_len {
                    coeffs.push((layout.gen[merchant_buy] + t, 1.0));
                    for g in renewables {
                        coeffs.push((layout.gen[g] + t, -pct));
                    }
                    for s in units {
                        coeffs.push((layout.discharge[s] + t, -pct));
                    }
                }
                lp.push_leq(&coeffs, 0.0);
            }
            OperatingConstraint::SharedConnection {
                renewables,
                storage: units,
                limit_mw,
                ..
            } => {
                for t in 0..t_len {
                    let mut coeffs = Vec::new();
                    for g in renewables {
                        coeffs.push((layout.gen[g] + t, 1.0));
                    }
                    for s in units {
                        coeffs.push((layout.discharge[s] + t, 1.0));
                        coeffs.push((layout.charge[s] + t, -1.0));
                    }
                    let negated: Vec<_> = coeffs.iter().map(|&(c, v)| (c, -v)).collect();
                    lp.push_leq(&coeffs, *limit_mw);
                    lp.push_leq(&negated, *limit_mw);
                }
            }
            OperatingConstraint::ChargeSourceLimit {
                storage: unit,
                sources,
            } => {
                for t in 0..t_len {
                    let mut coeffs = vec![(layout.charge[unit] + t, 1.0)];
                    for g in sources {
                        coeffs.push((layout.gen[g] + t, -1.0));
                    }
                    lp.push_leq(&coeffs, 0.0);
                }
            }
        }
    }

    let n_var = layout.n_var;
    let (a_mat, b, cones) = lp.into_csc();
    debug!(
        scenario = %cn.built.scenario.name,
        variables = n_var,
        rows = b.len(),
        "dispatch LP assembled"
    );

    // ========================================================================
    // INVOKE THE CONIC SOLVER
    // ========================================================================
    //
    // Clarabel solves  min ½x'Px + q'x  s.t.  Ax + s = b, s ∈ K.
    // The problem is a pure LP, so P is the empty n×n matrix.

    let p_mat = CscMatrix::new(n_var, n_var, vec![0; n_var + 1], Vec::new(), Vec::new());
    let mut builder = DefaultSettingsBuilder::default();
    builder.verbose(options.verbose).max_iter(options.max_iter);
    if let Some(limit) = options.time_limit {
        builder.time_limit(limit.as_secs_f64());
    }
    let settings = builder
        .build()
        .map_err(|e| ColoError::Solver(format!("Clarabel settings error: {:?}", e)))?;

    let mut solver = clarabel::solver::DefaultSolver::new(&p_mat, &q, &a_mat, &b, &cones, settings)
        .map_err(|e| ColoError::Solver(format!("Clarabel initialization failed: {:?}", e)))?;
    solver.solve();

    let sol = solver.solution;
    let status = match sol.status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => DispatchStatus::Optimal,
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            DispatchStatus::Degraded(DegradedReason::Infeasible)
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
            DispatchStatus::Degraded(DegradedReason::Unbounded)
        }
        SolverStatus::MaxTime => DispatchStatus::Degraded(DegradedReason::TimeLimit),
        _ => DispatchStatus::Degraded(DegradedReason::Numerical),
    };
    debug!(
        scenario = %cn.built.scenario.name,
        status = ?sol.status,
        iterations = sol.iterations,
        "Clarabel finished"
    );
    if let DispatchStatus::Degraded(reason) = status {
        return Ok(LpOutcome::Failed {
            reason,
            iterations: sol.iterations,
        });
    }

    // ========================================================================
    // EXTRACT SOLUTION
    // ========================================================================

    let x = &sol.x;
    let z = &sol.z;
    let series = |col: usize| -> Vec<f64> { (0..t_len).map(|t| x[col + t].max(0.0)).collect() };

    let mut result = OptimizationResult {
        status,
        iterations: sol.iterations,
        solve_time_ms: start.elapsed().as_millis(),
        objective: q.iter().zip(x.iter()).map(|(c, v)| c * v).sum(),
        generators: Default::default(),
        storage: Default::default(),
        loads: Default::default(),
        links: Default::default(),
        bus_prices: Default::default(),
    };

    for g in &generators {
        result
            .generators
            .insert(g.name.clone(), series(layout.gen[&g.id]));
    }
    for s in &storage {
        result.storage.insert(
            s.name.clone(),
            StorageDispatch {
                charge: series(layout.charge[&s.id]),
                discharge: series(layout.discharge[&s.id]),
                soc: series(layout.soc[&s.id]),
                initial_soc: x[layout.soc0[&s.id]].max(0.0),
                energy_capacity: s.energy_capacity().value(),
            },
        );
    }
    for l in &loads {
        let served = match &l.demand {
            LoadDemand::Fixed(profile) => (0..t_len).map(|t| profile.at(t)).collect(),
            LoadDemand::Free { .. } => series(layout.free_load[&l.id]),
        };
        result.loads.insert(l.name.clone(), served);
    }
    for (k, link) in links.iter().enumerate() {
        result.links.insert(link.name.clone(), series(layout.link[k]));
    }
    for (bus, first_row) in balance_rows {
        if let Some(b) = network.bus(bus) {
            result
                .bus_prices
                .insert(b.name.clone(), (0..t_len).map(|t| z[first_row + t]).collect());
        }
    }

    Ok(LpOutcome::Solved(result))
}
