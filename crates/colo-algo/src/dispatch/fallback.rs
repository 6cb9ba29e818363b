//! Deterministic dispatch used when the LP does not reach an optimum.
//!
//! PV runs at full availability, storage stays idle and empty, and each
//! bus's residual demand is met by its shortfall generator (or, without one,
//! by merchant purchases up to the connection). Any surplus is sold up to the
//! export cap and the rest is curtailed. Bus prices are the wholesale price
//! wherever the market interface sits, zero elsewhere.

use colo_core::{GenRole, LoadDemand, LoadRole};

use super::types::{DegradedReason, DispatchStatus, OptimizationResult, StorageDispatch};
use crate::builder::BuiltNetwork;

pub(crate) fn fallback_dispatch(
    built: &BuiltNetwork,
    reason: DegradedReason,
    iterations: u32,
) -> OptimizationResult {
    let network = &built.network;
    let t_len = built.calendar.len();

    let mut result = OptimizationResult {
        status: DispatchStatus::Degraded(reason),
        iterations,
        solve_time_ms: 0,
        objective: 0.0,
        generators: Default::default(),
        storage: Default::default(),
        loads: Default::default(),
        links: Default::default(),
        bus_prices: Default::default(),
    };

    for g in network.generators() {
        result.generators.insert(g.name.clone(), vec![0.0; t_len]);
    }
    for s in network.storage_units() {
        result.storage.insert(
            s.name.clone(),
            StorageDispatch::idle(t_len, s.energy_capacity().value()),
        );
    }
    for l in network.loads() {
        let served = match &l.demand {
            LoadDemand::Fixed(profile) => (0..t_len).map(|t| profile.at(t)).collect(),
            LoadDemand::Free { .. } => vec![0.0; t_len],
        };
        result.loads.insert(l.name.clone(), served);
    }
    for link in network.links() {
        result.links.insert(link.name.clone(), vec![0.0; t_len]);
    }

    for bus in network
        .buses()
        .into_iter()
        .filter(|b| network.attached_count(b.id) > 0)
    {
        let gens: Vec<_> = network
            .generators()
            .into_iter()
            .filter(|g| g.bus == bus.id)
            .collect();
        let loads: Vec<_> = network
            .loads()
            .into_iter()
            .filter(|l| l.bus == bus.id)
            .collect();
        let market = loads.iter().find(|l| l.role == LoadRole::MerchantSell);

        for t in 0..t_len {
            let available: f64 = gens
                .iter()
                .filter(|g| g.role == GenRole::Renewable)
                .map(|g| g.p_max_at(t).unwrap_or(0.0))
                .sum();
            let demand: f64 = loads
                .iter()
                .filter_map(|l| match &l.demand {
                    LoadDemand::Fixed(p) => Some(p.at(t)),
                    LoadDemand::Free { .. } => None,
                })
                .sum();

            let mut residual = demand - available;
            let mut renewable_scale = 1.0;
            if residual > 0.0 {
                let shortfall = gens.iter().find(|g| g.role == GenRole::Shortfall);
                let suppliers = shortfall.into_iter().chain(
                    gens.iter()
                        .filter(|g| g.role == GenRole::MerchantBuy && shortfall.is_none()),
                );
                for g in suppliers {
                    let take = g.p_max_at(t).map_or(residual, |cap| residual.min(cap));
                    if let Some(v) = result.generators.get_mut(&g.name) {
                        v[t] = take;
                    }
                    residual -= take;
                    if residual <= 0.0 {
                        break;
                    }
                }
            } else if residual < 0.0 {
                let mut surplus = -residual;
                if let Some(sell) = market {
                    if let LoadDemand::Free { p_max, .. } = &sell.demand {
                        let sold = surplus.min(p_max.value());
                        if let Some(v) = result.loads.get_mut(&sell.name) {
                            v[t] = sold;
                        }
                        surplus -= sold;
                    }
                }
                // curtail whatever could not be sold
                if available > 0.0 {
                    renewable_scale = (available - surplus) / available;
                }
            }

            for g in gens.iter().filter(|g| g.role == GenRole::Renewable) {
                if let Some(v) = result.generators.get_mut(&g.name) {
                    v[t] = g.p_max_at(t).unwrap_or(0.0) * renewable_scale;
                }
            }
        }

        let prices = match market.map(|l| &l.demand) {
            Some(LoadDemand::Free { value, .. }) => (0..t_len).map(|t| value.at(t)).collect(),
            _ => vec![0.0; t_len],
        };
        result.bus_prices.insert(bus.name.clone(), prices);
    }

    let mut objective = 0.0;
    for g in network.generators() {
        if let Some(p) = result.generators.get(&g.name) {
            objective += p
                .iter()
                .enumerate()
                .map(|(t, v)| v * g.marginal_cost.at(t))
                .sum::<f64>();
        }
    }
    for l in network.loads() {
        if let (LoadDemand::Free { value, .. }, Some(w)) = (&l.demand, result.loads.get(&l.name)) {
            objective -= w
                .iter()
                .enumerate()
                .map(|(t, v)| v * value.at(t))
                .sum::<f64>();
        }
    }
    result.objective = objective;
    result
}
