//! Energy accounting for link power states
//!
//! Each cycle contributes one sample to an append-only series that is
//! exported periodically and on shutdown.

mod export;

pub use export::{CsvExporter, ExportSchedule, EXPORT_HEADER};

use crate::topology::TopologyGraph;
use serde::{Deserialize, Serialize};

/// Per-state unit power costs in abstract watts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyModel {
    pub cost_active_w: u64,
    pub cost_sleeping_w: u64,
}

impl Default for EnergyModel {
    fn default() -> Self {
        Self {
            cost_active_w: 100,
            cost_sleeping_w: 10,
        }
    }
}

impl EnergyModel {
    pub fn energy(&self, active: usize, sleeping: usize) -> u64 {
        active as u64 * self.cost_active_w + sleeping as u64 * self.cost_sleeping_w
    }

    /// Sample the current link states of `graph`
    pub fn sample(&self, cycle: u64, graph: &TopologyGraph) -> MetricsSample {
        let (active, sleeping) = graph.state_counts();
        MetricsSample {
            cycle,
            energy_w: self.energy(active, sleeping),
            active_links: active,
            sleeping_links: sleeping,
        }
    }
}

/// One row of the metrics series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub cycle: u64,
    pub energy_w: u64,
    pub active_links: usize,
    pub sleeping_links: usize,
}

/// Append-only time series of cycle samples
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSeries {
    samples: Vec<MetricsSample>,
}

impl MetricsSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: MetricsSample) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[MetricsSample] {
        &self.samples
    }

    pub fn latest(&self) -> Option<&MetricsSample> {
        self.samples.last()
    }

    /// Up to `n` most recent samples, oldest first
    pub fn recent(&self, n: usize) -> &[MetricsSample] {
        &self.samples[self.samples.len().saturating_sub(n)..]
    }

    pub fn total_energy_w(&self) -> u64 {
        self.samples.iter().map(|s| s.energy_w).sum()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::models::{LinkId, PowerState};

    #[test]
    fn test_energy_defaults() {
        let model = EnergyModel::default();
        assert_eq!(model.energy(39, 0), 3900);
        assert_eq!(model.energy(30, 9), 3090);
        assert_eq!(model.energy(0, 0), 0);
    }

    #[test]
    fn test_sample_counts_states() {
        let (mut graph, _) = fixtures::backhaul();
        graph.set_state(&LinkId::from("link_1"), PowerState::Sleeping);
        graph.set_state(&LinkId::from("link_28"), PowerState::Sleeping);

        let sample = EnergyModel::default().sample(4, &graph);

        assert_eq!(sample.cycle, 4);
        assert_eq!(sample.active_links, 37);
        assert_eq!(sample.sleeping_links, 2);
        assert_eq!(sample.energy_w, 37 * 100 + 2 * 10);
    }

    #[test]
    fn test_series_recent_and_totals() {
        let mut series = MetricsSeries::new();
        for cycle in 0..5 {
            series.record(MetricsSample {
                cycle,
                energy_w: 100 + cycle,
                active_links: 1,
                sleeping_links: 0,
            });
        }

        assert_eq!(series.len(), 5);
        assert_eq!(series.latest().unwrap().cycle, 4);
        assert_eq!(series.recent(2).iter().map(|s| s.cycle).collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(series.recent(10).len(), 5);
        assert_eq!(series.total_energy_w(), 510);
    }
}
