//! Redundancy index derived from topology structure
//!
//! Links are siblings when they are interchangeable for keeping one shared
//! endpoint attached: the access links of one host, the core uplinks of one
//! aggregation switch, or the links of the core mesh.

use super::{ActiveSet, TopologyGraph};
use crate::models::{LinkId, LinkKind, NodeId, Tier};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Identity of a redundancy group, named after the endpoint it protects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "node")]
pub enum GroupId {
    /// Access links of one host
    HostAccess(NodeId),
    /// Core uplinks of one aggregation switch
    AggregationUplinks(NodeId),
    /// All core-to-core links
    CoreMesh,
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupId::HostAccess(node) => write!(f, "access:{}", node),
            GroupId::AggregationUplinks(node) => write!(f, "uplinks:{}", node),
            GroupId::CoreMesh => write!(f, "core-mesh"),
        }
    }
}

/// Set of mutually substitutable links
#[derive(Debug, Clone, Serialize)]
pub struct RedundancyGroup {
    pub id: GroupId,
    pub members: BTreeSet<LinkId>,
}

impl RedundancyGroup {
    /// Members other than `link` that are in `active`
    pub fn active_siblings<'a>(
        &'a self,
        link: &'a LinkId,
        active: &'a ActiveSet,
    ) -> impl Iterator<Item = &'a LinkId> + 'a {
        self.members
            .iter()
            .filter(move |m| *m != link && active.contains(*m))
    }
}

/// Read-only mapping from links to their redundancy groups
#[derive(Debug, Clone, Default)]
pub struct RedundancyIndex {
    groups: BTreeMap<GroupId, RedundancyGroup>,
    by_link: HashMap<LinkId, GroupId>,
    by_node: BTreeMap<NodeId, BTreeSet<GroupId>>,
}

impl RedundancyIndex {
    /// Derive groups from the structure of `graph`
    pub fn compute(graph: &TopologyGraph) -> Self {
        let mut index = Self::default();

        for link in graph.links() {
            let (a, b) = link.nodes();
            let group = match link.kind {
                LinkKind::Access => {
                    let host = if a.is_host() { a } else { b };
                    GroupId::HostAccess(host)
                }
                LinkKind::Uplink => {
                    let aggregation = match graph.node(a).map(|n| n.tier) {
                        Some(Tier::Aggregation) => a,
                        _ => b,
                    };
                    GroupId::AggregationUplinks(aggregation)
                }
                LinkKind::CoreMesh => GroupId::CoreMesh,
                LinkKind::Unclassified => continue,
            };

            index
                .groups
                .entry(group)
                .or_insert_with(|| RedundancyGroup {
                    id: group,
                    members: BTreeSet::new(),
                })
                .members
                .insert(link.id.clone());
            index.by_link.insert(link.id.clone(), group);
            for node in [a, b] {
                index.by_node.entry(node).or_default().insert(group);
            }
        }

        index
    }

    /// Group containing `link`, if it is substitutable at all
    pub fn group_of(&self, link: &LinkId) -> Option<&RedundancyGroup> {
        self.by_link.get(link).and_then(|id| self.groups.get(id))
    }

    pub fn group(&self, id: &GroupId) -> Option<&RedundancyGroup> {
        self.groups.get(id)
    }

    /// Groups with at least one link incident to `node`
    pub fn groups_for_node(&self, node: NodeId) -> impl Iterator<Item = &RedundancyGroup> {
        self.by_node
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|id| self.groups.get(id))
    }

    /// Mapping of every grouped link to its group
    pub fn link_groups(&self) -> BTreeMap<&LinkId, &RedundancyGroup> {
        self.by_link
            .iter()
            .filter_map(|(link, id)| self.groups.get(id).map(|g| (link, g)))
            .collect()
    }

    /// Whether every grouped node keeps at least one ACTIVE incident link
    /// inside one of its groups
    pub fn coverage_holds(&self, graph: &TopologyGraph, active: &ActiveSet) -> bool {
        self.by_node.iter().all(|(node, groups)| {
            groups
                .iter()
                .filter_map(|id| self.groups.get(id))
                .flat_map(|g| g.members.iter())
                .filter(|m| active.contains(*m))
                .filter_map(|m| graph.link(m))
                .any(|link| {
                    let (a, b) = link.nodes();
                    a == *node || b == *node
                })
        })
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
