use colo_algo::constraints::{ANNUAL_CAPACITY_FACTOR_TARGET, MERCHANT_BUY_LIMIT_PCT};
use colo_algo::*;
use colo_core::{
    ContractSpec, Link, Load, Megawatts, Profile, Scenario, SizingParams, SnapshotCalendar,
    Topology,
};
use colo_ts::{synthetic_prices, synthetic_solar_cf, MarketInputs};

const TOL: f64 = 1e-3;

fn synthetic_inputs(hours: usize) -> MarketInputs {
    let cal = SnapshotCalendar::hours(2023, hours).unwrap();
    MarketInputs::new(cal, synthetic_solar_cf(&cal, 7), synthetic_prices(&cal, 7)).unwrap()
}

fn inputs(cf: Vec<f64>, prices: Vec<f64>) -> MarketInputs {
    let cal = SnapshotCalendar::hours(2023, cf.len()).unwrap();
    MarketInputs::new(cal, cf.into(), prices.into()).unwrap()
}

fn solve(scenario: &Scenario, inputs: &MarketInputs) -> (ConstrainedNetwork, OptimizationResult) {
    let built = build_network(scenario, inputs).unwrap();
    let cn = ConstrainedNetwork::from_scenario(built).unwrap();
    let result = optimize(&cn, &SolveOptions::default()).unwrap();
    (cn, result)
}

#[test]
fn energy_balance_and_soc_bounds_hold_for_every_topology() {
    let inputs = synthetic_inputs(48);
    for topology in Topology::ALL {
        let scenario = Scenario::new(topology, SizingParams::new(100.0, 50.0, 2.0))
            .with_contract(ContractSpec::new(10.0, 65.0));
        let (cn, result) = solve(&scenario, &inputs);
        assert!(result.is_optimal(), "{topology}: {}", result.status);

        let residual = max_balance_residual(&cn.built.network, &result);
        assert!(residual < TOL, "{topology}: residual {residual}");

        let battery = &result.storage["battery"];
        assert_eq!(battery.soc.len(), 48);
        for soc in &battery.soc {
            assert!(*soc >= -TOL && *soc <= battery.energy_capacity + TOL);
        }
        // cyclic boundary
        let last = battery.soc[47];
        assert!(
            (battery.initial_soc - last).abs() <= 1e-5 * battery.energy_capacity.max(1.0),
            "{topology}: start {} end {last}",
            battery.initial_soc
        );
    }
}

#[test]
fn dc_coupled_never_charges_in_the_dark() {
    let inputs = synthetic_inputs(72);
    let scenario = Scenario::new(Topology::DcCoupled, SizingParams::new(80.0, 40.0, 4.0));
    let (_, result) = solve(&scenario, &inputs);
    assert!(result.is_optimal());

    let battery = &result.storage["battery"];
    let mut dark_hours = 0;
    for (t, cf) in inputs.solar_cf().iter().enumerate() {
        if cf == 0.0 {
            dark_hours += 1;
            assert!(battery.charge[t] < TOL, "hour {t}: charge {}", battery.charge[t]);
        }
        assert!(battery.charge[t] <= result.generators["pv"][t] + TOL);
    }
    assert!(dark_hours > 20);
}

#[test]
fn flat_price_standalone_battery_stays_idle() {
    let hours = 24;
    let inputs = inputs(vec![0.25; hours], vec![50.0; hours]);
    let scenario = Scenario::new(Topology::Standalone, SizingParams::new(100.0, 50.0, 4.0))
        .with_contract(ContractSpec::new(10.0, 60.0));
    let (cn, result) = solve(&scenario, &inputs);
    assert!(result.is_optimal());

    let battery = &result.storage["battery"];
    assert!(battery.discharge.iter().sum::<f64>() < 1e-2);
    assert!(battery.charge.iter().sum::<f64>() < 1e-2);

    // load is met straight from the grid
    for t in 0..hours {
        assert!((result.generators["grid_import"][t] - 10.0).abs() < TOL);
        assert!(result.generators["shortfall"][t] < TOL);
        assert!((result.bus_prices["bess"][t] - (50.0 + MARKET_SPREAD)).abs() < TOL);
    }
    assert!((result.objective - 10.0 * (50.0 + MARKET_SPREAD) * hours as f64).abs() < 1e-1);

    // no PV in a standalone layout, and the separate pv bus is not dispatched
    assert!(!result.generators.contains_key("pv"));
    assert!(!result.bus_prices.contains_key("pv"));
    assert!(max_balance_residual(&cn.built.network, &result) < TOL);
}

#[test]
fn dc_coupled_without_merchant_buying_records_shortfall() {
    // 12 sunny hours, 12 dark hours, 12 sunny hours
    let cf: Vec<f64> = (0..36)
        .map(|t| if (12..24).contains(&t) { 0.0 } else { 0.6 })
        .collect();
    let inputs = inputs(cf, vec![60.0; 36]);
    let scenario = Scenario::new(Topology::DcCoupled, SizingParams::new(50.0, 20.0, 2.0))
        .with_contract(ContractSpec::new(20.0, 80.0))
        .with_constraint(MERCHANT_BUY_LIMIT_PCT, 0.0);
    let (_, result) = solve(&scenario, &inputs);
    assert!(result.is_optimal(), "{}", result.status);

    let battery = &result.storage["battery"];
    assert!(!result.generators.contains_key("grid_import"));

    let dark_discharge: f64 = battery.discharge[12..24].iter().sum();
    let dark_shortfall: f64 = result.generators["shortfall"][12..24].iter().sum();
    let deliverable = battery.energy_capacity * 0.92;
    assert!(dark_discharge <= deliverable + TOL);
    assert!(dark_shortfall >= 12.0 * 20.0 - deliverable - TOL);
    assert!(battery.soc.iter().all(|s| *s >= -TOL));
}

#[test]
fn dc_coupled_battery_is_not_grid_charged_by_substitution() {
    // cheap sunny morning, expensive dark evening, PV just covers the contract
    let cf: Vec<f64> = (0..24).map(|t| if t < 12 { 1.0 } else { 0.0 }).collect();
    let prices: Vec<f64> = (0..24).map(|t| if t < 12 { 10.0 } else { 200.0 }).collect();
    let inputs = inputs(cf, prices);
    let scenario = Scenario::new(Topology::DcCoupled, SizingParams::new(20.0, 20.0, 4.0))
        .with_contract(ContractSpec::new(20.0, 70.0));
    let (cn, result) = solve(&scenario, &inputs);
    assert!(result.is_optimal(), "{}", result.status);
    assert!(cn.built.handles.merchant_buy.is_none());
    assert!(!result.generators.contains_key("grid_import"));

    let battery = &result.storage["battery"];
    let pv = &result.generators["pv"];
    let shortfall = &result.generators["shortfall"];
    for t in 0..24 {
        // PV left after serving the contract bounds what the battery can take
        let served_by_site = 20.0 - shortfall[t] - battery.discharge[t];
        assert!(
            battery.charge[t] + served_by_site <= pv[t] + TOL,
            "hour {t}: charge {} pv {}",
            battery.charge[t],
            pv[t]
        );
    }
    // every sunny MWh is already owed to the contract
    assert!(battery.charge.iter().sum::<f64>() < 1e-2);
    assert!(shortfall[12..].iter().sum::<f64>() >= 12.0 * 20.0 - TOL);
    assert!(max_balance_residual(&cn.built.network, &result) < TOL);
}

#[test]
fn capacity_factor_target_cannot_be_met_with_market_purchases() {
    let hours = 24;
    let inputs = inputs(vec![0.1; hours], vec![50.0; hours]);
    let scenario = Scenario::new(Topology::AcCoupled, SizingParams::new(10.0, 0.0, 2.0))
        .with_contract(ContractSpec::new(20.0, 70.0))
        .with_constraint(ANNUAL_CAPACITY_FACTOR_TARGET, 0.9);
    let (cn, result) = solve(&scenario, &inputs);

    // 1 MW of PV against a 20 MW contract can never reach 90 % renewable
    assert!(!result.is_optimal());
    let pv: f64 = result.generators["pv"].iter().sum();
    let contracted = 20.0 * hours as f64;
    assert!(pv / contracted < 0.9);
    let fin = evaluate(&cn.built, &result, &FinanceParams::default()).unwrap();
    assert!(!fin.valid);
}

#[test]
fn capacity_factor_target_routes_top_up_through_shortfall() {
    // 12 sunny hours then 12 dark hours with cheap grid energy
    let cf: Vec<f64> = (0..24).map(|t| if t < 12 { 1.0 } else { 0.0 }).collect();
    let prices: Vec<f64> = (0..24).map(|t| if t < 12 { 60.0 } else { 10.0 }).collect();
    let inputs = inputs(cf, prices);
    let scenario = Scenario::new(Topology::AcCoupled, SizingParams::new(20.0, 0.0, 2.0))
        .with_contract(ContractSpec::new(10.0, 70.0))
        .with_constraint(ANNUAL_CAPACITY_FACTOR_TARGET, 0.4);
    let (cn, result) = solve(&scenario, &inputs);
    assert!(result.is_optimal(), "{}", result.status);

    let pv = &result.generators["pv"];
    let shortfall = &result.generators["shortfall"];
    let grid: f64 = result.generators["grid_import"][12..].iter().sum();
    assert!(grid < TOL, "dark-hour purchases {grid}");

    let total_shortfall: f64 = shortfall.iter().sum();
    assert!(total_shortfall >= 120.0 - TOL);
    assert!(total_shortfall <= 240.0 * 0.6 + TOL);

    let renewable_served: f64 = pv.iter().map(|p| p.min(10.0)).sum();
    assert!(renewable_served / 240.0 >= 0.4 - 1e-6);
    assert!(max_balance_residual(&cn.built.network, &result) < TOL);
}

#[test]
fn relaxing_merchant_limit_never_reduces_value() {
    let inputs = synthetic_inputs(48);
    let mut previous = f64::NEG_INFINITY;
    for pct in [0.0, 0.25, 0.5, 1.0] {
        let scenario = Scenario::new(Topology::AcCoupled, SizingParams::new(60.0, 30.0, 2.0))
            .with_contract(ContractSpec::new(15.0, 70.0))
            .with_constraint(MERCHANT_BUY_LIMIT_PCT, pct);
        let (_, result) = solve(&scenario, &inputs);
        assert!(result.is_optimal());
        let value = -result.objective;
        assert!(
            value >= previous - 1e-4 * previous.abs().max(1.0),
            "value fell from {previous} to {value} at {pct}"
        );
        previous = value;
    }
}

#[test]
fn infeasible_targets_fall_back_to_flagged_dispatch() {
    let hours = 24;
    let inputs = inputs(vec![0.0; hours], vec![50.0; hours]);
    let scenario = Scenario::new(Topology::AcCoupled, SizingParams::new(0.0, 10.0, 2.0))
        .with_contract(ContractSpec::new(10.0, 60.0))
        .with_constraint(ANNUAL_CAPACITY_FACTOR_TARGET, 1.0)
        .with_constraint(MERCHANT_BUY_LIMIT_PCT, 0.0);
    let (cn, result) = solve(&scenario, &inputs);

    assert!(!result.is_optimal());
    assert!(result.status.degraded_reason().is_some());
    // PV at availability (zero), storage idle, shortfall covers the contract
    let battery = &result.storage["battery"];
    assert!(battery.charge.iter().chain(&battery.discharge).all(|v| *v == 0.0));
    assert!(result.generators["shortfall"].iter().all(|v| (*v - 10.0).abs() < 1e-12));
    assert_eq!(result.bus_prices["site"], vec![50.0; hours]);
    assert!(max_balance_residual(&cn.built.network, &result) < 1e-9);

    let fin = evaluate(&cn.built, &result, &FinanceParams::default()).unwrap();
    assert!(!fin.valid);
    assert!(fin.caveat.unwrap().contains("degraded"));
}

#[test]
fn fallback_is_deterministic() {
    let hours = 24;
    let inputs = inputs(vec![0.0; hours], vec![50.0; hours]);
    let scenario = Scenario::new(Topology::AcCoupled, SizingParams::new(0.0, 10.0, 2.0))
        .with_contract(ContractSpec::new(10.0, 60.0))
        .with_constraint(ANNUAL_CAPACITY_FACTOR_TARGET, 1.0)
        .with_constraint(MERCHANT_BUY_LIMIT_PCT, 0.0);
    let (_, a) = solve(&scenario, &inputs);
    let (_, b) = solve(&scenario, &inputs);
    assert_eq!(a.generators, b.generators);
    assert_eq!(a.loads, b.loads);
    assert_eq!(a.objective, b.objective);
}

#[test]
fn links_carry_energy_with_losses() {
    let hours = 24;
    let inputs = inputs(vec![0.0; hours], vec![40.0; hours]);
    let scenario = Scenario::new(Topology::Standalone, SizingParams::new(0.0, 20.0, 2.0));
    let mut built = build_network(&scenario, &inputs).unwrap();
    let from = built.handles.site_bus;
    let to = built.handles.pv_bus.unwrap();
    built
        .network
        .add_link(Link::new("feeder", from, to, Megawatts(20.0)).with_efficiency(0.9))
        .unwrap();
    built
        .network
        .add_load(Load::fixed("aux", to, Profile::Constant(4.5)))
        .unwrap();

    let cn = ConstrainedNetwork::new(built);
    let result = optimize(&cn, &SolveOptions::default()).unwrap();
    assert!(result.is_optimal());
    for t in 0..hours {
        assert!((result.links["feeder"][t] - 5.0).abs() < TOL);
    }
    assert!(max_balance_residual(&cn.built.network, &result) < TOL);
    // downstream energy costs the upstream price grossed up for losses
    assert!((result.bus_prices["pv"][0] - (40.0 + MARKET_SPREAD) / 0.9).abs() < 1e-2);
}

#[test]
fn run_scenario_chains_all_stages() {
    let inputs = synthetic_inputs(48);
    let scenario = Scenario::new(Topology::AcCoupled, SizingParams::new(50.0, 25.0, 2.0));
    let outcome = run_scenario(
        &scenario,
        &inputs,
        &FinanceParams::default(),
        &SolveOptions::default(),
    )
    .unwrap();
    assert!(outcome.dispatch.is_optimal());
    assert!(outcome.financials.valid);
    assert_eq!(outcome.financials.cash_flows.len(), 16);
    assert!(outcome.network.constraints().len() >= 1);
}

#[test]
fn unknown_constraint_option_aborts_the_scenario() {
    let inputs = synthetic_inputs(24);
    let scenario = Scenario::new(Topology::AcCoupled, SizingParams::new(50.0, 25.0, 2.0))
        .with_constraint("ramp_limit", 5.0);
    let err = run_scenario(
        &scenario,
        &inputs,
        &FinanceParams::default(),
        &SolveOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), "configuration");
}

#[test]
fn time_series_shape_is_preserved_in_results() {
    let inputs = synthetic_inputs(24);
    let scenario = Scenario::new(Topology::AcCoupled, SizingParams::new(50.0, 25.0, 2.0));
    let (_, result) = solve(&scenario, &inputs);
    for series in result.generators.values().chain(result.loads.values()) {
        assert_eq!(series.len(), 24);
    }
    let pv_cap: Vec<f64> = inputs.solar_cf().iter().map(|cf| cf * 50.0).collect();
    for (t, p) in result.generators["pv"].iter().enumerate() {
        assert!(*p <= pv_cap[t] + TOL);
    }
}
