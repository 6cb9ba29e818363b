//! # colo-core: Co-location Network Model
//!
//! Data structures shared by every stage of the PV + storage co-location
//! study: the network graph, unit newtypes, hourly time series, scenario
//! definitions and the unified error type.
//!
//! ## Design
//!
//! A network is an **undirected graph** where:
//! - **Nodes**: buses, generators, storage units and loads
//! - **Edges**: `Attachment` (component to its bus) and `Link` (bus to bus)
//!
//! Components are added through [`Network::add_generator`] and friends,
//! which reject references to buses that do not exist. That makes "every
//! component sits on exactly one existing bus" a construction-time
//! guarantee rather than something solvers have to re-check.
//!
//! ```rust
//! use colo_core::*;
//!
//! let mut net = Network::new();
//! let bus = net.add_bus("site");
//! let pv = Generator::new("pv", bus, Megawatts(100.0))
//!     .with_availability(Profile::Constant(0.25))
//!     .with_role(GenRole::Renewable);
//! net.add_generator(pv).unwrap();
//! assert_eq!(net.stats().num_generators, 1);
//! ```
//!
//! ## Modules
//!
//! - [`scenario`] - topology tags, sizing and technology parameters
//! - [`timeseries`] - snapshot calendar, [`TimeSeries`], [`Profile`]
//! - [`units`] - MW / MWh / hour newtypes

use std::collections::HashMap;

use petgraph::{prelude::*, Undirected};
use serde::{Deserialize, Serialize};

pub mod error;
pub mod scenario;
pub mod timeseries;
pub mod units;

pub use error::{ColoError, ColoResult};
pub use petgraph::graph::NodeIndex;
pub use scenario::{ConstraintOptions, ContractSpec, Scenario, SizingParams, StorageSpec, Topology};
pub use timeseries::{Profile, SnapshotCalendar, TimeSeries, HOURS_PER_YEAR};
pub use units::{Hours, MegawattHours, Megawatts};

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(usize);

macro_rules! impl_id {
    ($($id:ident),*) => {
        $(
            impl $id {
                #[inline]
                pub fn new(value: usize) -> Self {
                    $id(value)
                }
                #[inline]
                pub fn value(&self) -> usize {
                    self.0
                }
            }
        )*
    };
}

impl_id!(BusId, GenId, StorageId, LoadId, LinkId);

#[derive(Debug, Clone)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    pub carrier: String,
}

/// What a generator stands for in the study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenRole {
    /// PV plant; counts as renewable output.
    Renewable,
    /// Energy bought from the wholesale market at the market price.
    MerchantBuy,
    /// Penalised grid top-up that serves contracted load.
    Shortfall,
    Conventional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadRole {
    /// Contracted offtake (fixed profile).
    Contracted,
    /// Energy sold into the wholesale market (free load valued at price).
    MerchantSell,
    Other,
}

#[derive(Debug, Clone)]
pub struct Generator {
    pub id: GenId,
    pub name: String,
    pub bus: BusId,
    /// Nominal power; `f64::INFINITY` for an unconstrained generator.
    pub p_nom: Megawatts,
    /// Per-snapshot availability as a fraction of `p_nom`.
    pub availability: Profile,
    /// $/MWh.
    pub marginal_cost: Profile,
    pub role: GenRole,
}

impl Generator {
    pub fn new(name: impl Into<String>, bus: BusId, p_nom: Megawatts) -> Self {
        Self {
            id: GenId(0),
            name: name.into(),
            bus,
            p_nom,
            availability: Profile::Constant(1.0),
            marginal_cost: Profile::Constant(0.0),
            role: GenRole::Conventional,
        }
    }

    pub fn with_availability(mut self, availability: Profile) -> Self {
        self.availability = availability;
        self
    }

    pub fn with_marginal_cost(mut self, cost: Profile) -> Self {
        self.marginal_cost = cost;
        self
    }

    pub fn with_role(mut self, role: GenRole) -> Self {
        self.role = role;
        self
    }

    /// Upper bound on output at snapshot `t`, or `None` when unconstrained.
    pub fn p_max_at(&self, t: usize) -> Option<f64> {
        if self.p_nom.is_finite() {
            Some(self.p_nom.value() * self.availability.at(t).clamp(0.0, 1.0))
        } else {
            None
        }
    }
}

/// Which generators may feed a storage unit's charging leg.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ChargeSources {
    #[default]
    Unrestricted,
    Only(Vec<GenId>),
}

#[derive(Debug, Clone)]
pub struct StorageUnit {
    pub id: StorageId,
    pub name: String,
    pub bus: BusId,
    pub p_nom: Megawatts,
    pub max_hours: Hours,
    pub efficiency_store: f64,
    pub efficiency_dispatch: f64,
    pub standing_loss: f64,
    /// $/MWh discharged.
    pub cycling_cost: f64,
    /// State of charge wraps from the last snapshot to the first.
    pub cyclic: bool,
    /// Starting state of charge as a fraction of energy capacity (non-cyclic only).
    pub initial_soc_fraction: f64,
    pub charge_sources: ChargeSources,
}

impl StorageUnit {
    pub fn new(name: impl Into<String>, bus: BusId, p_nom: Megawatts, max_hours: Hours) -> Self {
        Self::from_spec(name, bus, p_nom, max_hours, &StorageSpec::default())
    }

    pub fn from_spec(
        name: impl Into<String>,
        bus: BusId,
        p_nom: Megawatts,
        max_hours: Hours,
        spec: &StorageSpec,
    ) -> Self {
        Self {
            id: StorageId(0),
            name: name.into(),
            bus,
            p_nom,
            max_hours,
            efficiency_store: spec.efficiency_store,
            efficiency_dispatch: spec.efficiency_dispatch,
            standing_loss: spec.standing_loss,
            cycling_cost: spec.cycling_cost,
            cyclic: spec.cyclic,
            initial_soc_fraction: spec.initial_soc_fraction,
            charge_sources: ChargeSources::Unrestricted,
        }
    }

    pub fn with_charge_sources(mut self, sources: ChargeSources) -> Self {
        self.charge_sources = sources;
        self
    }

    pub fn energy_capacity(&self) -> MegawattHours {
        self.p_nom * self.max_hours
    }
}

#[derive(Debug, Clone)]
pub enum LoadDemand {
    /// Must be served in every snapshot.
    Fixed(Profile),
    /// Dispatchable consumption up to `p_max`, worth `value` $/MWh when served.
    Free { p_max: Megawatts, value: Profile },
}

#[derive(Debug, Clone)]
pub struct Load {
    pub id: LoadId,
    pub name: String,
    pub bus: BusId,
    pub demand: LoadDemand,
    pub role: LoadRole,
}

impl Load {
    pub fn fixed(name: impl Into<String>, bus: BusId, demand: Profile) -> Self {
        Self {
            id: LoadId(0),
            name: name.into(),
            bus,
            demand: LoadDemand::Fixed(demand),
            role: LoadRole::Other,
        }
    }

    pub fn free(name: impl Into<String>, bus: BusId, p_max: Megawatts, value: Profile) -> Self {
        Self {
            id: LoadId(0),
            name: name.into(),
            bus,
            demand: LoadDemand::Free { p_max, value },
            role: LoadRole::Other,
        }
    }

    pub fn with_role(mut self, role: LoadRole) -> Self {
        self.role = role;
        self
    }

    pub fn is_free(&self) -> bool {
        matches!(self.demand, LoadDemand::Free { .. })
    }
}

/// Lossy one-way transfer from `bus0` to `bus1`.
#[derive(Debug, Clone)]
pub struct Link {
    pub id: LinkId,
    pub name: String,
    pub bus0: BusId,
    pub bus1: BusId,
    pub p_nom: Megawatts,
    pub efficiency: f64,
}

impl Link {
    pub fn new(name: impl Into<String>, bus0: BusId, bus1: BusId, p_nom: Megawatts) -> Self {
        Self {
            id: LinkId(0),
            name: name.into(),
            bus0,
            bus1,
            p_nom,
            efficiency: 1.0,
        }
    }

    pub fn with_efficiency(mut self, efficiency: f64) -> Self {
        self.efficiency = efficiency;
        self
    }
}

// Enum to represent different types of nodes in the graph
#[derive(Debug, Clone)]
pub enum Node {
    Bus(Bus),
    Generator(Generator),
    Storage(StorageUnit),
    Load(Load),
}

// Enum to represent different types of edges in the graph
#[derive(Debug, Clone)]
pub enum Edge {
    /// Component node to the bus it is connected at.
    Attachment,
    Link(Link),
}

/// The co-location network graph
#[derive(Debug, Default, Clone)]
pub struct Network {
    pub graph: Graph<Node, Edge, Undirected>,
    bus_nodes: HashMap<BusId, NodeIndex>,
    next_gen: usize,
    next_storage: usize,
    next_load: usize,
    next_link: usize,
}

impl Network {
    pub fn new() -> Self {
        Self {
            graph: Graph::new_undirected(),
            ..Self::default()
        }
    }

    pub fn add_bus(&mut self, name: impl Into<String>) -> BusId {
        let id = BusId(self.bus_nodes.len());
        let idx = self.graph.add_node(Node::Bus(Bus {
            id,
            name: name.into(),
            carrier: "electricity".to_string(),
        }));
        self.bus_nodes.insert(id, idx);
        id
    }

    fn bus_node(&self, bus: BusId, component: &str) -> ColoResult<NodeIndex> {
        self.bus_nodes.get(&bus).copied().ok_or_else(|| {
            ColoError::config(format!(
                "{component} references bus {} which does not exist",
                bus.value()
            ))
        })
    }

    pub fn add_generator(&mut self, mut gen: Generator) -> ColoResult<GenId> {
        let bus = self.bus_node(gen.bus, &gen.name)?;
        if gen.p_nom.value() < 0.0 || gen.p_nom.is_nan() {
            return Err(ColoError::config(format!(
                "generator {} has negative nominal power",
                gen.name
            )));
        }
        let id = GenId(self.next_gen);
        self.next_gen += 1;
        gen.id = id;
        let idx = self.graph.add_node(Node::Generator(gen));
        self.graph.add_edge(idx, bus, Edge::Attachment);
        Ok(id)
    }

    pub fn add_storage(&mut self, mut unit: StorageUnit) -> ColoResult<StorageId> {
        let bus = self.bus_node(unit.bus, &unit.name)?;
        if unit.max_hours.value() <= 0.0 || unit.max_hours.is_nan() {
            return Err(ColoError::config(format!(
                "storage {} duration must be > 0 h",
                unit.name
            )));
        }
        if unit.p_nom.value() < 0.0 || unit.p_nom.is_nan() {
            return Err(ColoError::config(format!(
                "storage {} has negative nominal power",
                unit.name
            )));
        }
        if let ChargeSources::Only(sources) = &unit.charge_sources {
            if let Some(missing) = sources.iter().find(|g| self.generator(**g).is_none()) {
                return Err(ColoError::config(format!(
                    "storage {} charge source {} does not exist",
                    unit.name,
                    missing.value()
                )));
            }
        }
        let id = StorageId(self.next_storage);
        self.next_storage += 1;
        unit.id = id;
        let idx = self.graph.add_node(Node::Storage(unit));
        self.graph.add_edge(idx, bus, Edge::Attachment);
        Ok(id)
    }

    pub fn add_load(&mut self, mut load: Load) -> ColoResult<LoadId> {
        let bus = self.bus_node(load.bus, &load.name)?;
        let id = LoadId(self.next_load);
        self.next_load += 1;
        load.id = id;
        let idx = self.graph.add_node(Node::Load(load));
        self.graph.add_edge(idx, bus, Edge::Attachment);
        Ok(id)
    }

    pub fn add_link(&mut self, mut link: Link) -> ColoResult<LinkId> {
        let from = self.bus_node(link.bus0, &link.name)?;
        let to = self.bus_node(link.bus1, &link.name)?;
        let id = LinkId(self.next_link);
        self.next_link += 1;
        link.id = id;
        self.graph.add_edge(from, to, Edge::Link(link));
        Ok(id)
    }

    /// Get all buses as a vector, ordered by id
    pub fn buses(&self) -> Vec<&Bus> {
        let mut buses: Vec<&Bus> = self
            .graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Bus(b) => Some(b),
                _ => None,
            })
            .collect();
        buses.sort_by_key(|b| b.id);
        buses
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        let idx = self.bus_nodes.get(&id)?;
        match &self.graph[*idx] {
            Node::Bus(b) => Some(b),
            _ => None,
        }
    }

    /// Get all generators as a vector
    pub fn generators(&self) -> Vec<&Generator> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Generator(g) => Some(g),
                _ => None,
            })
            .collect()
    }

    pub fn generator(&self, id: GenId) -> Option<&Generator> {
        self.generators().into_iter().find(|g| g.id == id)
    }

    pub fn generators_with_role(&self, role: GenRole) -> Vec<&Generator> {
        self.generators()
            .into_iter()
            .filter(|g| g.role == role)
            .collect()
    }

    pub fn storage_units(&self) -> Vec<&StorageUnit> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Storage(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn loads(&self) -> Vec<&Load> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Load(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn loads_with_role(&self, role: LoadRole) -> Vec<&Load> {
        self.loads().into_iter().filter(|l| l.role == role).collect()
    }

    pub fn links(&self) -> Vec<&Link> {
        self.graph
            .edge_weights()
            .filter_map(|e| match e {
                Edge::Link(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    /// Number of components attached to a bus (links excluded).
    pub fn attached_count(&self, bus: BusId) -> usize {
        self.bus_nodes
            .get(&bus)
            .map(|idx| {
                self.graph
                    .edges(*idx)
                    .filter(|e| matches!(e.weight(), Edge::Attachment))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Check every time-varying profile against the calendar length.
    pub fn check_profiles(&self, len: usize) -> ColoResult<()> {
        for g in self.generators() {
            g.availability.check_len(len, &g.name)?;
            g.marginal_cost.check_len(len, &g.name)?;
        }
        for l in self.loads() {
            match &l.demand {
                LoadDemand::Fixed(p) => p.check_len(len, &l.name)?,
                LoadDemand::Free { value, .. } => value.check_len(len, &l.name)?,
            }
        }
        Ok(())
    }

    /// Compute basic statistics about the network
    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats::default();
        for node in self.graph.node_weights() {
            match node {
                Node::Bus(_) => stats.num_buses += 1,
                Node::Generator(g) => {
                    stats.num_generators += 1;
                    if g.p_nom.is_finite() {
                        stats.total_gen_capacity_mw += g.p_nom.value();
                    }
                }
                Node::Storage(s) => {
                    stats.num_storage += 1;
                    stats.total_storage_mwh += s.energy_capacity().value();
                }
                Node::Load(_) => stats.num_loads += 1,
            }
        }
        stats.num_links = self.links().len();
        stats
    }
}

/// Statistics about a network's size and capacity
#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_generators: usize,
    pub num_storage: usize,
    pub num_loads: usize,
    pub num_links: usize,
    pub total_gen_capacity_mw: f64,
    pub total_storage_mwh: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} links, {} gens ({:.0} MW), {} storage ({:.0} MWh), {} loads",
            self.num_buses,
            self.num_links,
            self.num_generators,
            self.total_gen_capacity_mw,
            self.num_storage,
            self.total_storage_mwh,
            self.num_loads
        )
    }
}

impl Node {
    /// Returns a human-readable label for the node.
    pub fn label(&self) -> &str {
        match self {
            Node::Bus(bus) => &bus.name,
            Node::Generator(gen) => &gen.name,
            Node::Storage(s) => &s.name,
            Node::Load(load) => &load.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components_attach_to_their_bus() {
        let mut net = Network::new();
        let bus = net.add_bus("site");
        net.add_generator(Generator::new("pv", bus, Megawatts(10.0)))
            .unwrap();
        net.add_storage(StorageUnit::new("bess", bus, Megawatts(5.0), Hours(2.0)))
            .unwrap();
        net.add_load(Load::fixed("offtake", bus, Profile::Constant(3.0)))
            .unwrap();

        assert_eq!(net.attached_count(bus), 3);
        // bus + three components, three attachment edges
        assert_eq!(net.graph.node_count(), 4);
        assert_eq!(net.graph.edge_count(), 3);
    }

    #[test]
    fn test_unknown_bus_is_rejected() {
        let mut net = Network::new();
        net.add_bus("site");
        let err = net
            .add_generator(Generator::new("pv", BusId::new(7), Megawatts(1.0)))
            .unwrap_err();
        assert_eq!(err.kind(), "configuration");
        assert!(err.to_string().contains("pv"));
    }

    #[test]
    fn test_storage_duration_must_be_positive() {
        let mut net = Network::new();
        let bus = net.add_bus("site");
        let err = net
            .add_storage(StorageUnit::new("bess", bus, Megawatts(5.0), Hours(0.0)))
            .unwrap_err();
        assert!(matches!(err, ColoError::Configuration(_)));
    }

    #[test]
    fn test_charge_sources_must_exist() {
        let mut net = Network::new();
        let bus = net.add_bus("site");
        let unit = StorageUnit::new("bess", bus, Megawatts(5.0), Hours(2.0))
            .with_charge_sources(ChargeSources::Only(vec![GenId::new(3)]));
        assert!(net.add_storage(unit).is_err());
    }

    #[test]
    fn test_roles_and_stats() {
        let mut net = Network::new();
        let a = net.add_bus("a");
        let b = net.add_bus("b");
        net.add_generator(
            Generator::new("grid", a, Megawatts(f64::INFINITY)).with_role(GenRole::MerchantBuy),
        )
        .unwrap();
        net.add_link(Link::new("a-b", a, b, Megawatts(20.0)).with_efficiency(0.98))
            .unwrap();

        assert_eq!(net.generators_with_role(GenRole::MerchantBuy).len(), 1);
        assert!(net.generators_with_role(GenRole::Renewable).is_empty());
        let stats = net.stats();
        assert_eq!(stats.num_buses, 2);
        assert_eq!(stats.num_links, 1);
        assert_eq!(stats.total_gen_capacity_mw, 0.0);
        assert_eq!(net.bus(b).unwrap().name, "b");
    }

    #[test]
    fn test_infinite_generator_has_no_upper_bound() {
        let g = Generator::new("shortfall", BusId::new(0), Megawatts(f64::INFINITY));
        assert_eq!(g.p_max_at(0), None);
        let pv = Generator::new("pv", BusId::new(0), Megawatts(10.0))
            .with_availability(Profile::Constant(0.3));
        assert!((pv.p_max_at(5).unwrap() - 3.0).abs() < 1e-12);
    }
}
