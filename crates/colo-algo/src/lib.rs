//! # colo-algo: Co-location Analysis Pipeline
//!
//! The four stages that turn one scenario into comparable numbers:
//!
//! 1. [`builder`] - topology tag + sizing -> network graph
//! 2. [`constraints`] - operating rules attached to the built network
//! 3. [`dispatch`] - hourly LP (Clarabel) with a deterministic fallback
//! 4. [`finance`] - cash flows, IRR, NPV, payback, LCOS
//!
//! [`run_scenario`] chains them for a single sweep point.

pub mod builder;
pub mod constraints;
pub mod dispatch;
pub mod finance;

pub use builder::{build_network, AssetHandles, BuiltNetwork, MARKET_SPREAD};
pub use constraints::{ConstrainedNetwork, OperatingConstraint, RECOGNIZED_OPTIONS};
pub use dispatch::{
    max_balance_residual, optimize, DegradedReason, DispatchStatus, OptimizationResult,
    SolveOptions, StorageDispatch,
};
pub use finance::{evaluate, FinanceParams, FinancialResult};

use colo_core::{ColoResult, Scenario};
use colo_ts::MarketInputs;

/// Everything produced for one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub network: ConstrainedNetwork,
    pub dispatch: OptimizationResult,
    pub financials: FinancialResult,
}

/// Build, constrain, dispatch and evaluate one scenario.
pub fn run_scenario(
    scenario: &Scenario,
    inputs: &MarketInputs,
    finance: &FinanceParams,
    options: &SolveOptions,
) -> ColoResult<ScenarioOutcome> {
    let built = build_network(scenario, inputs)?;
    let network = ConstrainedNetwork::from_scenario(built)?;
    let dispatch = optimize(&network, options)?;
    let financials = evaluate(&network.built, &dispatch, finance)?;
    Ok(ScenarioOutcome {
        network,
        dispatch,
        financials,
    })
}
