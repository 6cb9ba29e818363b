//! TOML run configuration shared by `sweep` and `dispatch`.
//!
//! ```toml
//! year = 2023
//!
//! [grid]
//! topologies = ["standalone", "ac_coupled", "dc_coupled"]
//! pv_mw = [50, 100]
//! bess_mw = { start = 25, stop = 50, step = 25 }
//! duration_h = [2, 4]
//!
//! [contract]
//! load_mw = 20
//! price_per_mwh = 75
//!
//! [constraints]
//! merchant_buy_limit_pct = 0.3
//!
//! [finance]
//! discount_rate = 0.07
//! horizon_years = 20
//! tax_rate = 0.3
//! mlf = 0.95
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colo_algo::{FinanceParams, SolveOptions};
use colo_batch::{ScenarioTemplate, SweepGrid};
use colo_core::{ColoResult, ConstraintOptions, ContractSpec, StorageSpec};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverSection {
    #[serde(default = "default_max_iter")]
    pub max_iter: u32,
    #[serde(default)]
    pub verbose: bool,
}

fn default_max_iter() -> u32 {
    SolveOptions::default().max_iter
}

impl Default for SolverSection {
    fn default() -> Self {
        Self {
            max_iter: default_max_iter(),
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Calendar year of the input series.
    #[serde(default = "default_year")]
    pub year: i32,
    /// Required by `sweep`, ignored by `dispatch`.
    #[serde(default)]
    pub grid: Option<SweepGrid>,
    #[serde(default)]
    pub storage: StorageSpec,
    #[serde(default)]
    pub contract: Option<ContractSpec>,
    #[serde(default)]
    pub constraints: ConstraintOptions,
    /// Checked against the known finance keys by [`RunConfig::finance_params`].
    #[serde(default)]
    pub finance: BTreeMap<String, f64>,
    #[serde(default)]
    pub solver: SolverSection,
}

fn default_year() -> i32 {
    2023
}

impl RunConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing run configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config '{}'", path.display()))?;
        Self::parse(&text).with_context(|| format!("in config '{}'", path.display()))
    }

    pub fn finance_params(&self) -> ColoResult<FinanceParams> {
        FinanceParams::from_options(&self.finance)
    }

    pub fn template(&self) -> ScenarioTemplate {
        ScenarioTemplate {
            storage: self.storage.clone(),
            contract: self.contract.clone(),
            constraints: self.constraints.clone(),
        }
    }

    pub fn solve_options(&self) -> SolveOptions {
        SolveOptions {
            max_iter: self.solver.max_iter,
            verbose: self.solver.verbose,
            ..SolveOptions::default()
        }
    }
}
