//! Sleep safety evaluation
//!
//! Decides whether a single ACTIVE link may be powered down without
//! detaching any part of the network. Checks run in a fixed order and
//! anything that cannot be classified is refused.

use crate::models::{LinkId, LinkKind};
use crate::topology::{ActiveSet, GroupId, RedundancyIndex, TopologyGraph};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How core-mesh links are judged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreMeshPolicy {
    /// Sleep only if the core switches stay connected over the remaining
    /// active mesh links
    #[default]
    Verify,
    /// Treat the mesh as redundant by construction and always allow sleep
    AssumeRedundant,
}

/// Why a candidate was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    UnknownLink,
    Unclassified,
    NoActiveSibling(GroupId),
    CoreMeshSplit,
    Partition,
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refusal::UnknownLink => write!(f, "link not in topology"),
            Refusal::Unclassified => write!(f, "link category unknown"),
            Refusal::NoActiveSibling(group) => write!(f, "no active sibling in {}", group),
            Refusal::CoreMeshSplit => write!(f, "core mesh would split"),
            Refusal::Partition => write!(f, "a host would lose reachability to the core"),
        }
    }
}

/// Result of a safety evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepVerdict {
    Safe,
    Refused(Refusal),
}

impl SleepVerdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, SleepVerdict::Safe)
    }
}

/// Pure evaluator over an immutable topology view
pub struct SafetyEvaluator<'a> {
    graph: &'a TopologyGraph,
    index: &'a RedundancyIndex,
    policy: CoreMeshPolicy,
}

impl<'a> SafetyEvaluator<'a> {
    pub fn new(
        graph: &'a TopologyGraph,
        index: &'a RedundancyIndex,
        policy: CoreMeshPolicy,
    ) -> Self {
        Self {
            graph,
            index,
            policy,
        }
    }

    /// Whether `candidate` may sleep given the links in `active`
    pub fn can_sleep(&self, active: &ActiveSet, candidate: &LinkId) -> bool {
        self.evaluate(active, candidate).is_safe()
    }

    pub fn evaluate(&self, active: &ActiveSet, candidate: &LinkId) -> SleepVerdict {
        let link = match self.graph.link(candidate) {
            Some(link) => link,
            None => return SleepVerdict::Refused(Refusal::UnknownLink),
        };

        let remaining: ActiveSet = active.iter().filter(|l| *l != candidate).cloned().collect();

        let category = match link.kind {
            LinkKind::Access | LinkKind::Uplink => self.sibling_rule(candidate, active),
            LinkKind::CoreMesh => match self.policy {
                CoreMeshPolicy::AssumeRedundant => SleepVerdict::Safe,
                CoreMeshPolicy::Verify if self.graph.core_mesh_connected(&remaining) => {
                    SleepVerdict::Safe
                }
                CoreMeshPolicy::Verify => SleepVerdict::Refused(Refusal::CoreMeshSplit),
            },
            LinkKind::Unclassified => SleepVerdict::Refused(Refusal::Unclassified),
        };

        if !category.is_safe() {
            return category;
        }

        if self.graph.hosts_reachable(&remaining) {
            SleepVerdict::Safe
        } else {
            SleepVerdict::Refused(Refusal::Partition)
        }
    }

    /// At least one other member of the candidate's group must stay active
    fn sibling_rule(&self, candidate: &LinkId, active: &ActiveSet) -> SleepVerdict {
        let group = match self.index.group_of(candidate) {
            Some(group) => group,
            None => return SleepVerdict::Refused(Refusal::Unclassified),
        };

        if group.active_siblings(candidate, active).next().is_some() {
            SleepVerdict::Safe
        } else {
            SleepVerdict::Refused(Refusal::NoActiveSibling(group.id))
        }
    }
}
