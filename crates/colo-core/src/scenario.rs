//! Scenario definitions: topology tag, sizing, storage technology and the
//! optional contracted offtake.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ColoError, ColoResult};
use crate::units::{Hours, MegawattHours, Megawatts};

/// Physical coupling between the PV plant and the battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Battery on its own connection; PV is not part of the model.
    Standalone,
    /// PV and battery share one AC connection; the grid may charge the battery.
    AcCoupled,
    /// Battery sits behind the PV inverter and charges from PV only.
    DcCoupled,
}

impl Topology {
    pub const ALL: [Topology; 3] = [Topology::Standalone, Topology::AcCoupled, Topology::DcCoupled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::Standalone => "standalone",
            Topology::AcCoupled => "ac_coupled",
            Topology::DcCoupled => "dc_coupled",
        }
    }

    pub fn is_hybrid(&self) -> bool {
        !matches!(self, Topology::Standalone)
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topology {
    type Err = ColoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standalone" => Ok(Topology::Standalone),
            "ac_coupled" => Ok(Topology::AcCoupled),
            "dc_coupled" => Ok(Topology::DcCoupled),
            other => Err(ColoError::config(format!(
                "unrecognized topology '{other}' (expected standalone, ac_coupled or dc_coupled)"
            ))),
        }
    }
}

/// Asset sizes for one sweep point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingParams {
    pub pv_mw: f64,
    pub bess_mw: f64,
    pub duration_h: f64,
    /// Grid connection capacity. Defaults to the larger of PV and BESS power.
    #[serde(default)]
    pub connection_mw: Option<f64>,
}

impl SizingParams {
    pub fn new(pv_mw: f64, bess_mw: f64, duration_h: f64) -> Self {
        Self {
            pv_mw,
            bess_mw,
            duration_h,
            connection_mw: None,
        }
    }

    pub fn with_connection(mut self, mw: f64) -> Self {
        self.connection_mw = Some(mw);
        self
    }

    pub fn validate(&self) -> ColoResult<()> {
        if !(self.duration_h > 0.0) {
            return Err(ColoError::config(format!(
                "storage duration must be > 0 h, got {}",
                self.duration_h
            )));
        }
        if !(self.pv_mw >= 0.0) || !(self.bess_mw >= 0.0) {
            return Err(ColoError::config(format!(
                "nominal powers must be >= 0 (pv {} MW, bess {} MW)",
                self.pv_mw, self.bess_mw
            )));
        }
        if let Some(c) = self.connection_mw {
            if !(c > 0.0) {
                return Err(ColoError::config(format!(
                    "connection capacity must be > 0 MW, got {c}"
                )));
            }
        }
        Ok(())
    }

    pub fn bess_power(&self) -> Megawatts {
        Megawatts(self.bess_mw)
    }

    pub fn bess_energy(&self) -> MegawattHours {
        Megawatts(self.bess_mw) * Hours(self.duration_h)
    }

    /// Connection used by the builder when none is given explicitly.
    pub fn effective_connection_mw(&self, topology: Topology) -> f64 {
        self.connection_mw.unwrap_or(match topology {
            Topology::Standalone => self.bess_mw,
            _ => self.pv_mw.max(self.bess_mw),
        })
    }
}

/// Battery technology parameters shared by every sweep point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSpec {
    pub efficiency_store: f64,
    pub efficiency_dispatch: f64,
    /// Fraction of stored energy lost per hour.
    pub standing_loss: f64,
    /// $/MWh discharged.
    pub cycling_cost: f64,
    pub cyclic: bool,
    pub initial_soc_fraction: f64,
}

impl Default for StorageSpec {
    fn default() -> Self {
        Self {
            efficiency_store: 0.92,
            efficiency_dispatch: 0.92,
            standing_loss: 1e-4,
            cycling_cost: 0.5,
            cyclic: true,
            initial_soc_fraction: 0.5,
        }
    }
}

impl StorageSpec {
    pub fn round_trip_efficiency(&self) -> f64 {
        self.efficiency_store * self.efficiency_dispatch
    }

    pub fn validate(&self) -> ColoResult<()> {
        for (name, v) in [
            ("efficiency_store", self.efficiency_store),
            ("efficiency_dispatch", self.efficiency_dispatch),
        ] {
            if !(v > 0.0 && v <= 1.0) {
                return Err(ColoError::config(format!("{name} must be in (0, 1], got {v}")));
            }
        }
        if !(0.0..1.0).contains(&self.standing_loss) {
            return Err(ColoError::config(format!(
                "standing_loss must be in [0, 1), got {}",
                self.standing_loss
            )));
        }
        if !(self.cycling_cost >= 0.0) {
            return Err(ColoError::config("cycling_cost must be >= 0"));
        }
        if !(0.0..=1.0).contains(&self.initial_soc_fraction) {
            return Err(ColoError::config("initial_soc_fraction must be in [0, 1]"));
        }
        Ok(())
    }
}

/// Flat contracted offtake served from the site, topped up by a penalised
/// shortfall generator when PV and storage fall short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractSpec {
    pub load_mw: f64,
    #[serde(default)]
    pub price_per_mwh: f64,
    #[serde(default = "default_shortfall_penalty")]
    pub shortfall_penalty_per_mwh: f64,
}

fn default_shortfall_penalty() -> f64 {
    300.0
}

impl ContractSpec {
    pub fn new(load_mw: f64, price_per_mwh: f64) -> Self {
        Self {
            load_mw,
            price_per_mwh,
            shortfall_penalty_per_mwh: default_shortfall_penalty(),
        }
    }

    pub fn validate(&self) -> ColoResult<()> {
        if !(self.load_mw > 0.0) {
            return Err(ColoError::config("contract load_mw must be > 0"));
        }
        if !(self.shortfall_penalty_per_mwh >= 0.0) {
            return Err(ColoError::config("shortfall_penalty_per_mwh must be >= 0"));
        }
        Ok(())
    }
}

/// Operating-constraint options keyed by name, validated downstream.
pub type ConstraintOptions = BTreeMap<String, f64>;

/// A fully described sweep point. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    pub topology: Topology,
    pub sizing: SizingParams,
    pub storage: StorageSpec,
    pub contract: Option<ContractSpec>,
    pub constraints: ConstraintOptions,
}

impl Scenario {
    pub fn new(topology: Topology, sizing: SizingParams) -> Self {
        let name = format!(
            "{}_pv{}_bess{}_{}h",
            topology, sizing.pv_mw, sizing.bess_mw, sizing.duration_h
        );
        Self {
            name,
            topology,
            sizing,
            storage: StorageSpec::default(),
            contract: None,
            constraints: ConstraintOptions::new(),
        }
    }

    pub fn with_storage(mut self, storage: StorageSpec) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_contract(mut self, contract: ContractSpec) -> Self {
        self.contract = Some(contract);
        self
    }

    pub fn with_constraint(mut self, key: impl Into<String>, value: f64) -> Self {
        self.constraints.insert(key.into(), value);
        self
    }

    pub fn with_constraints(mut self, options: ConstraintOptions) -> Self {
        self.constraints.extend(options);
        self
    }
}
