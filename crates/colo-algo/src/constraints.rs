//! Constraint Engine: scenario-specific operating rules layered on a built
//! network.
//!
//! Structural rules implied by the topology (PV-only charging behind a DC
//! inverter, the shared AC connection) are derived when the
//! [`ConstrainedNetwork`] is created. Optional rules come from a
//! `key -> number` option map. Rules are only ever added.

use colo_core::{
    BusId, ChargeSources, ColoError, ColoResult, ConstraintOptions, GenId, LoadId, StorageId,
    Topology,
};
use tracing::{debug, info};

use crate::builder::BuiltNetwork;

pub const ANNUAL_CAPACITY_FACTOR_TARGET: &str = "annual_capacity_factor_target";
pub const MERCHANT_BUY_LIMIT_PCT: &str = "merchant_buy_limit_pct";
pub const SHARED_CONNECTION_MW: &str = "shared_connection_mw";

/// Option keys understood by [`ConstrainedNetwork::attach`].
pub const RECOGNIZED_OPTIONS: [&str; 3] = [
    ANNUAL_CAPACITY_FACTOR_TARGET,
    MERCHANT_BUY_LIMIT_PCT,
    SHARED_CONNECTION_MW,
];

/// A linear operating rule, expressed over network components.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatingConstraint {
    /// `Σ shortfall ≤ Σ contract_load · (1 − target)` over the horizon, and
    /// `contract_load[t] ≤ Σ renewable[t] + Σ discharge[t] + shortfall[t]` in
    /// every snapshot so market purchases cannot stand in for on-site supply.
    CapacityFactorFloor {
        shortfall: GenId,
        contract_load: LoadId,
        renewables: Vec<GenId>,
        storage: Vec<StorageId>,
        target: f64,
    },
    /// `Σ merchant_buy ≤ pct · (Σ renewable + Σ discharge)` over the horizon.
    MerchantBuyCap {
        merchant_buy: GenId,
        renewables: Vec<GenId>,
        storage: Vec<StorageId>,
        pct: f64,
    },
    /// `|Σ renewable + Σ discharge − Σ charge| ≤ limit` in every snapshot.
    SharedConnection {
        bus: BusId,
        renewables: Vec<GenId>,
        storage: Vec<StorageId>,
        limit_mw: f64,
    },
    /// Storage charging never exceeds the output of the listed generators.
    ChargeSourceLimit {
        storage: StorageId,
        sources: Vec<GenId>,
    },
}

impl OperatingConstraint {
    pub fn name(&self) -> &'static str {
        match self {
            OperatingConstraint::CapacityFactorFloor { .. } => "capacity_factor_floor",
            OperatingConstraint::MerchantBuyCap { .. } => "merchant_buy_cap",
            OperatingConstraint::SharedConnection { .. } => "shared_connection",
            OperatingConstraint::ChargeSourceLimit { .. } => "charge_source_limit",
        }
    }
}

/// A built network plus its operating rules, ready for dispatch.
#[derive(Debug, Clone)]
pub struct ConstrainedNetwork {
    pub built: BuiltNetwork,
    constraints: Vec<OperatingConstraint>,
}

impl ConstrainedNetwork {
    /// Wrap a built network and derive its structural constraints.
    pub fn new(built: BuiltNetwork) -> Self {
        let mut constraints = Vec::new();

        for unit in built.network.storage_units() {
            if let ChargeSources::Only(sources) = &unit.charge_sources {
                constraints.push(OperatingConstraint::ChargeSourceLimit {
                    storage: unit.id,
                    sources: sources.clone(),
                });
            }
        }

        if built.topology() == Topology::AcCoupled {
            constraints.push(OperatingConstraint::SharedConnection {
                bus: built.handles.site_bus,
                renewables: built.handles.pv.into_iter().collect(),
                storage: built.handles.storage.into_iter().collect(),
                limit_mw: built.connection_mw(),
            });
        }

        debug!(
            scenario = %built.scenario.name,
            structural = constraints.len(),
            "derived structural constraints"
        );
        Self { built, constraints }
    }

    /// Build the constrained network and apply the scenario's own options.
    pub fn from_scenario(built: BuiltNetwork) -> ColoResult<Self> {
        let options = built.scenario.constraints.clone();
        let mut constrained = Self::new(built);
        constrained.apply_options(&options)?;
        Ok(constrained)
    }

    pub fn constraints(&self) -> &[OperatingConstraint] {
        &self.constraints
    }

    /// Apply every entry of an option map.
    pub fn apply_options(&mut self, options: &ConstraintOptions) -> ColoResult<()> {
        for (key, value) in options {
            self.attach(key, *value)?;
        }
        Ok(())
    }

    /// Attach one optional rule. Unknown keys and out-of-range values are
    /// configuration errors.
    pub fn attach(&mut self, key: &str, value: f64) -> ColoResult<()> {
        let handles = &self.built.handles;
        let constraint = match key {
            ANNUAL_CAPACITY_FACTOR_TARGET => {
                if !(value > 0.0 && value <= 1.0) {
                    return Err(out_of_range(key, value, "(0, 1]"));
                }
                match (handles.shortfall, handles.contract_load) {
                    (Some(shortfall), Some(contract_load)) => {
                        OperatingConstraint::CapacityFactorFloor {
                            shortfall,
                            contract_load,
                            renewables: handles.pv.into_iter().collect(),
                            storage: handles.storage.into_iter().collect(),
                            target: value,
                        }
                    }
                    _ => {
                        return Err(ColoError::Configuration(format!(
                            "{key} needs a contracted load; scenario {} has none",
                            self.built.scenario.name
                        )))
                    }
                }
            }
            MERCHANT_BUY_LIMIT_PCT => {
                if !(0.0..=1.0).contains(&value) {
                    return Err(out_of_range(key, value, "[0, 1]"));
                }
                let Some(merchant_buy) = handles.merchant_buy else {
                    debug!(
                        scenario = %self.built.scenario.name,
                        "no market purchases in this topology, {key} already holds"
                    );
                    return Ok(());
                };
                OperatingConstraint::MerchantBuyCap {
                    merchant_buy,
                    renewables: handles.pv.into_iter().collect(),
                    storage: handles.storage.into_iter().collect(),
                    pct: value,
                }
            }
            SHARED_CONNECTION_MW => {
                if !(value > 0.0) || !value.is_finite() {
                    return Err(out_of_range(key, value, "(0, inf)"));
                }
                if self.built.topology() == Topology::Standalone {
                    return Err(ColoError::Configuration(format!(
                        "{key} does not apply to a standalone battery (no shared connection)"
                    )));
                }
                OperatingConstraint::SharedConnection {
                    bus: handles.site_bus,
                    renewables: handles.pv.into_iter().collect(),
                    storage: handles.storage.into_iter().collect(),
                    limit_mw: value,
                }
            }
            other => {
                return Err(ColoError::Configuration(format!(
                    "unrecognized constraint option '{other}' (expected one of {})",
                    RECOGNIZED_OPTIONS.join(", ")
                )))
            }
        };
        info!(
            scenario = %self.built.scenario.name,
            constraint = constraint.name(),
            value,
            "constraint attached"
        );
        self.constraints.push(constraint);
        Ok(())
    }
}

fn out_of_range(key: &str, value: f64, range: &str) -> ColoError {
    ColoError::Configuration(format!("{key} must be in {range}, got {value}"))
}
