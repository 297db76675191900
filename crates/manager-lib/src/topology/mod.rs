//! Topology model for the backhaul network
//!
//! The graph is built once from a discovery snapshot. Node tiers and link
//! categories are derived from structure alone: hosts come from negative
//! datapath ids, a switch that serves at least one host is an aggregation
//! switch, and every other switch is a core switch.

mod redundancy;


pub use redundancy::{GroupId, RedundancyGroup, RedundancyIndex};

use crate::error::{ControllerError, Result};
use crate::models::{
    Endpoint, Link, LinkId, LinkKind, Node, NodeId, PowerState, Tier, TopologySnapshot,
};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

/// Set of links currently considered ACTIVE
pub type ActiveSet = BTreeSet<LinkId>;

/// Graph of nodes and links plus adjacency used for connectivity checks
#[derive(Debug, Clone)]
pub struct TopologyGraph {
    nodes: BTreeMap<NodeId, Node>,
    links: BTreeMap<LinkId, Link>,
    adjacency: UnGraph<NodeId, LinkId>,
    node_index: HashMap<NodeId, NodeIndex>,
}

impl TopologyGraph {
    /// Build the graph from a discovery snapshot
    ///
    /// Every link starts ACTIVE with zero utilization.
    pub fn build(snapshot: &TopologySnapshot) -> Result<Self> {
        if snapshot.topology.is_empty() {
            return Err(ControllerError::TopologyUnavailable(
                "snapshot contains no links".to_string(),
            ));
        }

        if let Some(expected) = snapshot.total_links {
            if expected != snapshot.topology.len() {
                return Err(ControllerError::TopologyUnavailable(format!(
                    "snapshot announces {} links but carries {}",
                    expected,
                    snapshot.topology.len()
                )));
            }
        }

        let mut raw_links = Vec::with_capacity(snapshot.topology.len());
        for (id, (dpid_a, port_a, hw_a, dpid_b, port_b, hw_b)) in &snapshot.topology {
            let a = Endpoint {
                node: NodeId(*dpid_a),
                port: *port_a,
                hw_addr: hw_a.clone(),
            };
            let b = Endpoint {
                node: NodeId(*dpid_b),
                port: *port_b,
                hw_addr: hw_b.clone(),
            };
            validate_endpoints(id, &a, &b)?;
            raw_links.push((LinkId::new(id.as_str()), a, b));
        }

        let nodes = classify_nodes(&raw_links);

        let mut adjacency = UnGraph::new_undirected();
        let node_index: HashMap<NodeId, NodeIndex> = nodes
            .keys()
            .map(|id| (*id, adjacency.add_node(*id)))
            .collect();

        let mut links = BTreeMap::new();
        for (id, a, b) in raw_links {
            let kind = LinkKind::from_tiers(nodes[&a.node].tier, nodes[&b.node].tier);
            adjacency.add_edge(node_index[&a.node], node_index[&b.node], id.clone());

            debug!(link_id = %id, a = %a.node, b = %b.node, kind = %kind, "Registered link");

            links.insert(
                id.clone(),
                Link {
                    id,
                    endpoints: (a, b),
                    kind,
                    capacity_gbps: kind.capacity_gbps(),
                    state: PowerState::Active,
                    utilization: 0.0,
                },
            );
        }

        let graph = Self {
            nodes,
            links,
            adjacency,
            node_index,
        };

        info!(
            links = graph.links.len(),
            core = graph.nodes_in_tier(Tier::Core).count(),
            aggregation = graph.nodes_in_tier(Tier::Aggregation).count(),
            hosts = graph.nodes_in_tier(Tier::Host).count(),
            "Built topology graph"
        );

        Ok(graph)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn nodes_in_tier(&self, tier: Tier) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(move |n| n.tier == tier)
    }

    pub fn link(&self, id: &LinkId) -> Option<&Link> {
        self.links.get(id)
    }

    /// Links in identifier order
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Link identifiers in identifier order
    pub fn link_ids(&self) -> Vec<LinkId> {
        self.links.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Identifiers of all currently ACTIVE links
    pub fn active_set(&self) -> ActiveSet {
        self.links
            .values()
            .filter(|l| l.is_active())
            .map(|l| l.id.clone())
            .collect()
    }

    /// Number of ACTIVE and SLEEPING links
    pub fn state_counts(&self) -> (usize, usize) {
        let active = self.links.values().filter(|l| l.is_active()).count();
        (active, self.links.len() - active)
    }

    /// Overwrite the last known utilization of a link
    pub fn set_utilization(&mut self, id: &str, ratio: f64) -> Result<()> {
        let link = self
            .links
            .get_mut(&LinkId::new(id))
            .ok_or_else(|| ControllerError::UnknownLinkReference(id.to_string()))?;
        link.utilization = ratio;
        Ok(())
    }

    /// Set the power state of a link, returning the previous state
    pub fn set_state(&mut self, id: &LinkId, state: PowerState) -> Option<PowerState> {
        self.links
            .get_mut(id)
            .map(|link| std::mem::replace(&mut link.state, state))
    }

    /// Whether every host and every core node share one connected
    /// component of the subgraph induced by `active`
    pub fn hosts_reachable(&self, active: &ActiveSet) -> bool {
        let components = self.components(active, |_| true);

        let mut anchors = self
            .nodes
            .values()
            .filter(|n| matches!(n.tier, Tier::Host | Tier::Core))
            .map(|n| components.find(self.node_index[&n.id].index()));

        match anchors.next() {
            Some(first) => anchors.all(|root| root == first),
            None => true,
        }
    }

    /// Whether the core nodes stay connected using only ACTIVE core-mesh links
    pub fn core_mesh_connected(&self, active: &ActiveSet) -> bool {
        let components = self.components(active, |link| link.kind == LinkKind::CoreMesh);

        let mut roots = self
            .nodes_in_tier(Tier::Core)
            .map(|n| components.find(self.node_index[&n.id].index()));

        match roots.next() {
            Some(first) => roots.all(|root| root == first),
            None => true,
        }
    }

    fn components(&self, active: &ActiveSet, include: impl Fn(&Link) -> bool) -> UnionFind<usize> {
        let mut components = UnionFind::new(self.adjacency.node_count());
        for edge in self.adjacency.edge_references() {
            let id = edge.weight();
            if !active.contains(id) {
                continue;
            }
            if self.links.get(id).map(&include).unwrap_or(false) {
                components.union(edge.source().index(), edge.target().index());
            }
        }
        components
    }
}

fn validate_endpoints(id: &str, a: &Endpoint, b: &Endpoint) -> Result<()> {
    if a.node.0 == 0 || b.node.0 == 0 {
        return Err(ControllerError::TopologyUnavailable(format!(
            "{}: datapath id 0 is not a valid node",
            id
        )));
    }
    if a.node == b.node {
        return Err(ControllerError::TopologyUnavailable(format!(
            "{}: self-loop on {}",
            id, a.node
        )));
    }
    if a.node.is_host() && b.node.is_host() {
        return Err(ControllerError::TopologyUnavailable(format!(
            "{}: host-to-host link between {} and {}",
            id, a.node, b.node
        )));
    }
    Ok(())
}

fn classify_nodes(raw_links: &[(LinkId, Endpoint, Endpoint)]) -> BTreeMap<NodeId, Node> {
    let mut serves_host = BTreeMap::new();

    for (_, a, b) in raw_links {
        for (this, other) in [(a, b), (b, a)] {
            let entry = serves_host.entry(this.node).or_insert(false);
            *entry |= other.node.is_host();
        }
    }

    serves_host
        .into_iter()
        .map(|(id, serves_host)| {
            let tier = if id.is_host() {
                Tier::Host
            } else if serves_host {
                Tier::Aggregation
            } else {
                Tier::Core
            };
            (id, Node { id, tier })
        })
        .collect()
}
