//! Financial Evaluator: dispatch + assumptions -> cash flows and returns.
//!
//! Year one is the simulated year (annualised when the calendar is shorter
//! than 8760 hours); later years repeat it, adjusted by escalation, asset
//! degradation, debt service and tax. Market energy settles at the shadow
//! price of the site bus, scaled by the site's marginal loss factor.
//!
//! Tax is levied on positive taxable income: EBITDA less straight-line
//! depreciation of capex over the horizon and less loan interest.

mod metrics;
mod params;

use colo_core::{ColoResult, Topology};
use serde::Serialize;
use tracing::debug;

pub use metrics::{
    capital_recovery_factor, irr, npv, payback_year, IRR_BRACKET, IRR_MAX_ITERATIONS,
    IRR_TOLERANCE,
};
pub use params::{default_mlf, FinanceParams};

use crate::builder::BuiltNetwork;
use crate::dispatch::OptimizationResult;

/// Annual energy totals by role (MWh/yr).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnergySummary {
    pub pv_mwh: f64,
    pub charge_mwh: f64,
    pub discharge_mwh: f64,
    pub merchant_buy_mwh: f64,
    pub merchant_sell_mwh: f64,
    pub contracted_mwh: f64,
    pub shortfall_mwh: f64,
}

/// Year-one cash-flow components ($).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RevenueBreakdown {
    pub merchant_sales: f64,
    pub merchant_purchases: f64,
    pub contract_revenue: f64,
    pub shortfall_penalty: f64,
    pub opex: f64,
    pub insurance: f64,
    pub debt_service: f64,
    pub tax: f64,
}

impl RevenueBreakdown {
    pub fn net_revenue(&self) -> f64 {
        self.merchant_sales - self.merchant_purchases + self.contract_revenue
            - self.shortfall_penalty
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FinancialResult {
    pub capex: f64,
    /// Year-zero outflow borne by equity.
    pub equity_investment: f64,
    /// `cash_flows[0]` is year zero.
    pub cash_flows: Vec<f64>,
    pub irr: Option<f64>,
    pub npv: f64,
    pub payback_years: Option<u32>,
    /// Levelised cost of storage ($/MWh discharged).
    pub lcos: Option<f64>,
    pub cycles_per_year: f64,
    pub year1: RevenueBreakdown,
    pub energy: EnergySummary,
    /// False whenever the dispatch behind these numbers was degraded.
    pub valid: bool,
    pub caveat: Option<String>,
}

/// Upfront capital cost of a sweep point.
pub fn capex(topology: Topology, pv_mw: f64, bess_mw: f64, bess_mwh: f64, p: &FinanceParams) -> f64 {
    let pv = if topology.is_hybrid() {
        pv_mw * p.pv_capex_per_mw
    } else {
        0.0
    };
    let storage = bess_mw * p.bess_capex_per_mw + bess_mwh * p.bess_capex_per_mwh;
    let discount = if topology.is_hybrid() {
        1.0 - p.synergy_discount_pct
    } else {
        1.0
    };
    (pv + storage) * discount
}

fn total(series: Option<&Vec<f64>>) -> f64 {
    series.map_or(0.0, |v| v.iter().sum())
}

fn hourly_discharge(result: &OptimizationResult, t_len: usize) -> Vec<f64> {
    let mut hourly = vec![0.0; t_len];
    for unit in result.storage.values() {
        for (slot, d) in hourly.iter_mut().zip(&unit.discharge) {
            *slot += d;
        }
    }
    hourly
}

fn name_of_gen(built: &BuiltNetwork, id: Option<colo_core::GenId>) -> Option<String> {
    id.and_then(|id| built.network.generator(id)).map(|g| g.name.clone())
}

fn name_of_load(built: &BuiltNetwork, id: Option<colo_core::LoadId>) -> Option<String> {
    id.and_then(|id| built.network.loads().into_iter().find(|l| l.id == id))
        .map(|l| l.name.clone())
}

impl EnergySummary {
    /// Horizon totals scaled to a full year.
    pub fn from_dispatch(built: &BuiltNetwork, result: &OptimizationResult) -> Self {
        let scale = 1.0 / built.calendar.year_fraction();
        let h = &built.handles;
        let gen_total = |id| {
            name_of_gen(built, id).map_or(0.0, |n| total(result.generators.get(&n))) * scale
        };
        let load_total =
            |id| name_of_load(built, id).map_or(0.0, |n| total(result.loads.get(&n))) * scale;

        let (charge, discharge) = result.storage.values().fold((0.0, 0.0), |(c, d), s| {
            (c + s.charge.iter().sum::<f64>(), d + s.discharge.iter().sum::<f64>())
        });

        Self {
            pv_mwh: gen_total(h.pv),
            charge_mwh: charge * scale,
            discharge_mwh: discharge * scale,
            merchant_buy_mwh: gen_total(h.merchant_buy),
            merchant_sell_mwh: load_total(Some(h.merchant_sell)),
            contracted_mwh: load_total(h.contract_load),
            shortfall_mwh: gen_total(h.shortfall),
        }
    }
}

/// Turn one dispatch into a cash-flow series and return metrics.
pub fn evaluate(
    built: &BuiltNetwork,
    result: &OptimizationResult,
    params: &FinanceParams,
) -> ColoResult<FinancialResult> {
    params.validate()?;
    let sizing = built.sizing();
    let topology = built.topology();
    let scale = 1.0 / built.calendar.year_fraction();
    let energy = EnergySummary::from_dispatch(built, result);

    // settlement at the site bus shadow price
    let site = built
        .network
        .bus(built.handles.site_bus)
        .map(|b| b.name.clone())
        .unwrap_or_default();
    let prices: Vec<f64> = match result.bus_prices.get(&site) {
        Some(p) => p.clone(),
        None => built.market_prices.values().to_vec(),
    };
    let mlf = params.mlf_for(topology);
    let settle = |series: Option<&Vec<f64>>| -> f64 {
        series.map_or(0.0, |v| {
            v.iter().zip(prices.iter()).map(|(e, p)| e * p).sum::<f64>()
        }) * mlf
            * scale
    };
    let sell_name = name_of_load(built, Some(built.handles.merchant_sell));
    let buy_name = name_of_gen(built, built.handles.merchant_buy);
    let merchant_sales = settle(sell_name.and_then(|n| result.loads.get(&n)));
    let merchant_purchases = settle(buy_name.and_then(|n| result.generators.get(&n)));

    let (contract_revenue, shortfall_penalty) = match &built.scenario.contract {
        Some(c) => (
            c.price_per_mwh * energy.contracted_mwh,
            c.shortfall_penalty_per_mwh * energy.shortfall_mwh,
        ),
        None => (0.0, 0.0),
    };

    let pv_mw = if topology.is_hybrid() { sizing.pv_mw } else { 0.0 };
    let fixed_opex = params.fixed_opex_per_mw_year * (pv_mw + sizing.bess_mw);
    let opex = fixed_opex + params.variable_opex_per_mwh * (energy.pv_mwh + energy.discharge_mwh);

    let capex_total = capex(
        topology,
        sizing.pv_mw,
        sizing.bess_mw,
        sizing.bess_energy().value(),
        params,
    );
    let insurance = capex_total * params.insurance_pct;
    let debt = capex_total * params.debt_fraction;
    let debt_service = if debt > 0.0 {
        debt * capital_recovery_factor(params.debt_term_years, params.debt_interest_rate)
    } else {
        0.0
    };
    let equity_investment = capex_total - debt;

    // market value of the energy each asset class produced in year one,
    // the part of revenue that fades as the asset degrades
    let pv_name = name_of_gen(built, built.handles.pv);
    let pv_value = settle(pv_name.and_then(|n| result.generators.get(&n)));
    let discharged_by_hour = hourly_discharge(result, prices.len());
    let discharge_value = settle(Some(&discharged_by_hour));

    let mut year1 = RevenueBreakdown {
        merchant_sales,
        merchant_purchases,
        contract_revenue,
        shortfall_penalty,
        opex,
        insurance,
        debt_service,
        tax: 0.0,
    };

    let depreciation = capex_total / params.horizon_years as f64;
    let mut balance = debt;
    let mut cash_flows = Vec::with_capacity(params.horizon_years as usize + 1);
    cash_flows.push(-equity_investment);
    for year in 1..=params.horizon_years {
        let n = (year - 1) as i32;
        let escalation = (1.0 + params.escalation_rate).powi(n);
        let pv_lost = pv_value * (1.0 - (1.0 - params.pv_degradation_pct).powi(n));
        let bess_lost = discharge_value * (1.0 - (1.0 - params.bess_degradation_pct).powi(n));
        let revenue = (year1.net_revenue() - pv_lost - bess_lost) * escalation;
        let ebitda = revenue - (opex + insurance) * escalation;

        let (service, interest) = if year <= params.debt_term_years && balance > 0.0 {
            let interest = balance * params.debt_interest_rate;
            balance -= debt_service - interest;
            (debt_service, interest)
        } else {
            (0.0, 0.0)
        };
        let tax = params.tax_rate * (ebitda - depreciation - interest).max(0.0);
        if year == 1 {
            year1.tax = tax;
        }
        cash_flows.push(ebitda - service - tax);
    }

    // storage-only cost over storage-only discharge
    let synergy = if topology.is_hybrid() {
        1.0 - params.synergy_discount_pct
    } else {
        1.0
    };
    let storage_capex = (sizing.bess_mw * params.bess_capex_per_mw
        + sizing.bess_energy().value() * params.bess_capex_per_mwh)
        * synergy;
    let storage_opex = params.fixed_opex_per_mw_year * sizing.bess_mw
        + params.variable_opex_per_mwh * energy.discharge_mwh
        + storage_capex * params.insurance_pct;
    let (mut cost, mut discharged) = (storage_capex, 0.0);
    for year in 1..=params.horizon_years {
        let n = (year - 1) as i32;
        let df = (1.0 + params.discount_rate).powi(year as i32);
        cost += storage_opex * (1.0 + params.escalation_rate).powi(n) / df;
        discharged += energy.discharge_mwh * (1.0 - params.bess_degradation_pct).powi(n) / df;
    }
    let lcos = (discharged > 1e-9).then(|| cost / discharged);

    let bess_mwh = sizing.bess_energy().value();
    let cycles_per_year = if bess_mwh > 0.0 {
        energy.discharge_mwh / bess_mwh
    } else {
        0.0
    };

    let valid = result.is_optimal();
    let caveat = (!valid).then(|| {
        format!(
            "dispatch {}: fallback dispatch, not an optimised result",
            result.status
        )
    });

    let fin = FinancialResult {
        capex: capex_total,
        equity_investment,
        irr: irr(&cash_flows),
        npv: npv(params.discount_rate, &cash_flows),
        payback_years: payback_year(&cash_flows),
        cash_flows,
        lcos,
        cycles_per_year,
        year1,
        energy,
        valid,
        caveat,
    };
    debug!(
        scenario = %built.scenario.name,
        capex = fin.capex,
        npv = fin.npv,
        irr = ?fin.irr,
        valid = fin.valid,
        "financials evaluated"
    );
    Ok(fin)
}
