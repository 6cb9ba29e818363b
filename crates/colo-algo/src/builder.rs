//! Network Builder: scenario topology + sizing -> wired network graph.
//!
//! One function, one `match` on the topology tag. Every topology can sell to
//! the market through a merchant-sell free load valued at the wholesale
//! price. Standalone and AC-coupled sites can also buy through a merchant-buy
//! generator priced at it; a DC-coupled site has no import path at all, so
//! grid energy can neither charge the battery nor free up PV to charge it.
//! When a contract is configured the site also gets a flat contracted load
//! and a penalised shortfall generator.

use colo_core::{
    BusId, ChargeSources, ColoError, ColoResult, GenId, GenRole, Generator, Hours, Load, LoadId,
    LoadRole, Megawatts, Network, Profile, Scenario, SizingParams, SnapshotCalendar, StorageId,
    StorageUnit, TimeSeries, Topology,
};
use colo_ts::MarketInputs;
use tracing::debug;

/// Premium on merchant purchases ($/MWh). Keeps simultaneous buy and sell
/// strictly suboptimal so the market interface has a unique optimum.
pub const MARKET_SPREAD: f64 = 0.01;

/// Handles to the assets later stages need to find.
#[derive(Debug, Clone)]
pub struct AssetHandles {
    /// Bus carrying the storage unit and the market interface.
    pub site_bus: BusId,
    /// Separate PV bus of a standalone layout (left empty).
    pub pv_bus: Option<BusId>,
    pub pv: Option<GenId>,
    pub storage: Option<StorageId>,
    /// Absent for DC-coupled sites.
    pub merchant_buy: Option<GenId>,
    pub merchant_sell: LoadId,
    pub contract_load: Option<LoadId>,
    pub shortfall: Option<GenId>,
}

/// Output of [`build_network`]: the graph plus the context it was built in.
#[derive(Debug, Clone)]
pub struct BuiltNetwork {
    pub network: Network,
    pub scenario: Scenario,
    pub calendar: SnapshotCalendar,
    /// Wholesale price the market interface settles at.
    pub market_prices: TimeSeries,
    pub handles: AssetHandles,
}

impl BuiltNetwork {
    pub fn topology(&self) -> Topology {
        self.scenario.topology
    }

    pub fn sizing(&self) -> &SizingParams {
        &self.scenario.sizing
    }

    pub fn connection_mw(&self) -> f64 {
        self.scenario
            .sizing
            .effective_connection_mw(self.scenario.topology)
    }
}

/// Build the network for one sweep point.
pub fn build_network(scenario: &Scenario, inputs: &MarketInputs) -> ColoResult<BuiltNetwork> {
    let sizing = scenario.sizing;
    sizing.validate()?;
    scenario.storage.validate()?;
    if let Some(contract) = &scenario.contract {
        contract.validate()?;
    }

    let mut net = Network::new();
    let connection = sizing.effective_connection_mw(scenario.topology);

    let (site_bus, pv_bus, pv) = match scenario.topology {
        Topology::Standalone => {
            let bess_bus = net.add_bus("bess");
            // The PV plant lives on its own connection and is not modelled.
            let pv_bus = net.add_bus("pv");
            (bess_bus, Some(pv_bus), None)
        }
        Topology::AcCoupled | Topology::DcCoupled => {
            let site = net.add_bus("site");
            let pv = net.add_generator(
                Generator::new("pv", site, Megawatts(sizing.pv_mw))
                    .with_availability(Profile::Series(inputs.solar_cf().clone()))
                    .with_role(GenRole::Renewable),
            )?;
            (site, None, Some(pv))
        }
    };

    let charge_sources = match (scenario.topology, pv) {
        (Topology::DcCoupled, Some(pv)) => ChargeSources::Only(vec![pv]),
        _ => ChargeSources::Unrestricted,
    };
    let storage = if sizing.bess_mw > 0.0 {
        Some(
            net.add_storage(
                StorageUnit::from_spec(
                    "battery",
                    site_bus,
                    sizing.bess_power(),
                    Hours(sizing.duration_h),
                    &scenario.storage,
                )
                .with_charge_sources(charge_sources),
            )?,
        )
    } else {
        None
    };

    let contract_mw = scenario.contract.as_ref().map_or(0.0, |c| c.load_mw);
    let buy_price: Vec<f64> = inputs.prices().iter().map(|p| p + MARKET_SPREAD).collect();
    let merchant_buy = match scenario.topology {
        Topology::DcCoupled => None,
        Topology::Standalone | Topology::AcCoupled => Some(
            net.add_generator(
                Generator::new("grid_import", site_bus, Megawatts(connection + contract_mw))
                    .with_marginal_cost(Profile::Series(TimeSeries::new(buy_price)))
                    .with_role(GenRole::MerchantBuy),
            )?,
        ),
    };
    let merchant_sell = net.add_load(
        Load::free(
            "grid_export",
            site_bus,
            Megawatts(connection),
            Profile::Series(inputs.prices().clone()),
        )
        .with_role(LoadRole::MerchantSell),
    )?;

    let (contract_load, shortfall) = match &scenario.contract {
        Some(contract) => {
            let load = net.add_load(
                Load::fixed("contract", site_bus, Profile::Constant(contract.load_mw))
                    .with_role(LoadRole::Contracted),
            )?;
            let gen = net.add_generator(
                Generator::new("shortfall", site_bus, Megawatts(f64::INFINITY))
                    .with_marginal_cost(Profile::Constant(contract.shortfall_penalty_per_mwh))
                    .with_role(GenRole::Shortfall),
            )?;
            (Some(load), Some(gen))
        }
        None => (None, None),
    };

    net.check_profiles(inputs.len())
        .map_err(|e| ColoError::Data(format!("{}: {e}", scenario.name)))?;

    debug!(
        scenario = %scenario.name,
        stats = %net.stats(),
        connection_mw = connection,
        "network built"
    );

    Ok(BuiltNetwork {
        network: net,
        scenario: scenario.clone(),
        calendar: *inputs.calendar(),
        market_prices: inputs.prices().clone(),
        handles: AssetHandles {
            site_bus,
            pv_bus,
            pv,
            storage,
            merchant_buy,
            merchant_sell,
            contract_load,
            shortfall,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use colo_core::{ContractSpec, GenRole};

    fn inputs() -> MarketInputs {
        MarketInputs::new(
            SnapshotCalendar::hours(2023, 24).unwrap(),
            TimeSeries::constant(0.3, 24),
            TimeSeries::constant(50.0, 24),
        )
        .unwrap()
    }

    #[test]
    fn standalone_has_two_buses_and_no_pv() {
        let scenario = Scenario::new(Topology::Standalone, SizingParams::new(100.0, 50.0, 4.0));
        let built = build_network(&scenario, &inputs()).unwrap();
        assert_eq!(built.network.buses().len(), 2);
        assert!(built.handles.pv.is_none());
        assert!(built
            .network
            .generators_with_role(GenRole::Renewable)
            .is_empty());
        assert_eq!(built.network.attached_count(built.handles.pv_bus.unwrap()), 0);
        assert_eq!(built.connection_mw(), 50.0);
    }

    #[test]
    fn hybrids_share_one_bus() {
        for topology in [Topology::AcCoupled, Topology::DcCoupled] {
            let scenario = Scenario::new(topology, SizingParams::new(100.0, 50.0, 2.0));
            let built = build_network(&scenario, &inputs()).unwrap();
            assert_eq!(built.network.buses().len(), 1);
            let storage = &built.network.storage_units()[0];
            assert_eq!(storage.bus, built.handles.site_bus);
            assert_eq!(storage.energy_capacity().value(), 100.0);
        }
    }

    #[test]
    fn dc_coupled_charges_from_pv_only() {
        let scenario = Scenario::new(Topology::DcCoupled, SizingParams::new(80.0, 40.0, 2.0));
        let built = build_network(&scenario, &inputs()).unwrap();
        let storage = &built.network.storage_units()[0];
        assert_eq!(
            storage.charge_sources,
            ChargeSources::Only(vec![built.handles.pv.unwrap()])
        );
        assert!(built.handles.merchant_buy.is_none());
        assert!(built
            .network
            .generators_with_role(GenRole::MerchantBuy)
            .is_empty());
        assert!(built
            .network
            .loads()
            .iter()
            .any(|l| l.role == LoadRole::MerchantSell));

        let ac = Scenario::new(Topology::AcCoupled, SizingParams::new(80.0, 40.0, 2.0));
        let built = build_network(&ac, &inputs()).unwrap();
        assert_eq!(
            built.network.storage_units()[0].charge_sources,
            ChargeSources::Unrestricted
        );
        assert!(built.handles.merchant_buy.is_some());
    }

    #[test]
    fn contract_adds_load_and_shortfall() {
        let scenario = Scenario::new(Topology::AcCoupled, SizingParams::new(100.0, 50.0, 2.0))
            .with_contract(ContractSpec::new(20.0, 70.0));
        let built = build_network(&scenario, &inputs()).unwrap();
        assert!(built.handles.contract_load.is_some());
        let shortfall = built
            .network
            .generator(built.handles.shortfall.unwrap())
            .unwrap();
        assert_eq!(shortfall.p_max_at(0), None);
        assert_eq!(shortfall.marginal_cost.at(0), 300.0);
    }

    #[test]
    fn invalid_sizing_is_configuration_error() {
        let bad = Scenario::new(Topology::AcCoupled, SizingParams::new(100.0, 50.0, 0.0));
        assert!(matches!(
            build_network(&bad, &inputs()),
            Err(ColoError::Configuration(_))
        ));
        let neg = Scenario::new(Topology::Standalone, SizingParams::new(0.0, -5.0, 2.0));
        assert!(build_network(&neg, &inputs()).is_err());
    }

    #[test]
    fn zero_power_battery_is_omitted() {
        let scenario = Scenario::new(Topology::AcCoupled, SizingParams::new(50.0, 0.0, 2.0));
        let built = build_network(&scenario, &inputs()).unwrap();
        assert!(built.handles.storage.is_none());
        assert!(built.network.storage_units().is_empty());
    }
}
