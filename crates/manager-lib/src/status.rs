//! Read-only status snapshots for the API
//!
//! The control loop is the only writer of link state. After each cycle it
//! publishes a copy here; API handlers only ever read the copy.

use crate::energy::{MetricsSample, MetricsSeries};
use crate::models::{Endpoint, LinkId, LinkKind, PowerState};
use crate::topology::{RedundancyIndex, TopologyGraph};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Samples kept in the published snapshot
pub const RECENT_SAMPLES: usize = 48;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkStatus {
    pub id: LinkId,
    pub endpoints: (Endpoint, Endpoint),
    pub kind: LinkKind,
    pub capacity_gbps: u32,
    pub state: PowerState,
    pub utilization: f64,
    /// Redundancy group the link belongs to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyStatus {
    /// Cycles completed so far
    pub cycle: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<MetricsSample>,
    /// Energy summed over every recorded cycle
    pub total_energy_w: u64,
    pub recorded: usize,
    pub recent: Vec<MetricsSample>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub links: Vec<LinkStatus>,
    pub energy: EnergyStatus,
}

impl NetworkStatus {
    pub fn capture(
        graph: &TopologyGraph,
        index: &RedundancyIndex,
        series: &MetricsSeries,
        cycle: u64,
    ) -> Self {
        let links = graph
            .links()
            .map(|link| LinkStatus {
                id: link.id.clone(),
                endpoints: link.endpoints.clone(),
                kind: link.kind,
                capacity_gbps: link.capacity_gbps,
                state: link.state,
                utilization: link.utilization,
                group: index.group_of(&link.id).map(|g| g.id.to_string()),
            })
            .collect();

        let energy = EnergyStatus {
            cycle,
            latest: series.latest().cloned(),
            total_energy_w: series.total_energy_w(),
            recorded: series.len(),
            recent: series.recent(RECENT_SAMPLES).to_vec(),
        };

        Self { links, energy }
    }
}

/// Shared handle to the most recently published snapshot
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<NetworkStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn publish(&self, status: NetworkStatus) {
        *self.inner.write().await = status;
    }

    pub async fn snapshot(&self) -> NetworkStatus {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::energy::EnergyModel;
    use crate::fixtures;

    #[tokio::test]
    async fn test_publish_and_read_snapshot() {
        let (mut graph, index) = fixtures::dual_homed();
        graph.set_state(&LinkId::from("link_2"), PowerState::Sleeping);

        let mut series = MetricsSeries::new();
        series.record(EnergyModel::default().sample(1, &graph));

        let board = StatusBoard::new();
        assert!(board.snapshot().await.links.is_empty());

        board
            .publish(NetworkStatus::capture(&graph, &index, &series, 1))
            .await;

        let status = board.snapshot().await;
        assert_eq!(status.links.len(), 2);
        assert_eq!(status.links[1].state, PowerState::Sleeping);
        assert_eq!(status.links[0].group.as_deref(), Some("access:h1"));
        assert_eq!(status.energy.cycle, 1);
        assert_eq!(status.energy.total_energy_w, 110);
        assert_eq!(status.energy.latest.map(|s| s.active_links), Some(1));
    }
}
