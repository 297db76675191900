//! Per-cycle link power-state decisions

use super::safety::{CoreMeshPolicy, SafetyEvaluator, SleepVerdict};
use crate::error::{ControllerError, Result};
use crate::models::{PowerState, Transition};
use crate::topology::{RedundancyIndex, TopologyGraph};
use tracing::debug;

/// Default utilization ratio below which an idle link may sleep
pub const DEFAULT_SLEEP_THRESHOLD: f64 = 0.10;

/// Sleep/wake thresholds. A wake threshold above the sleep threshold forms
/// a hysteresis band in which neither transition fires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub sleep: f64,
    pub wake: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::uniform(DEFAULT_SLEEP_THRESHOLD)
    }
}

impl Thresholds {
    pub fn uniform(threshold: f64) -> Self {
        Self {
            sleep: threshold,
            wake: threshold,
        }
    }

    pub fn new(sleep: f64, wake: f64) -> Result<Self> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !in_range(sleep) || !in_range(wake) {
            return Err(ControllerError::InvalidConfig(format!(
                "thresholds must lie in [0, 1], got sleep={} wake={}",
                sleep, wake
            )));
        }
        if wake < sleep {
            return Err(ControllerError::InvalidConfig(format!(
                "wake threshold {} is below sleep threshold {}",
                wake, sleep
            )));
        }
        Ok(Self { sleep, wake })
    }
}

/// Result of one controller pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleOutcome {
    /// Transitions in the order they were applied
    pub transitions: Vec<Transition>,
    /// Idle links kept awake by the safety evaluator
    pub refused: usize,
    pub active: usize,
    pub sleeping: usize,
}

impl CycleOutcome {
    pub fn woken(&self) -> usize {
        self.transitions
            .iter()
            .filter(|t| t.to == PowerState::Active)
            .count()
    }

    pub fn slept(&self) -> usize {
        self.transitions.len() - self.woken()
    }
}

/// Applies thresholds and the safety evaluator to every link once per cycle
#[derive(Debug, Clone, Default)]
pub struct StateController {
    thresholds: Thresholds,
    policy: CoreMeshPolicy,
}

impl StateController {
    pub fn new(thresholds: Thresholds, policy: CoreMeshPolicy) -> Self {
        Self { thresholds, policy }
    }

    /// Evaluate every link in identifier order and apply transitions
    ///
    /// Each link is visited exactly once, so no link transitions twice in
    /// a cycle. Sleep decisions see the effect of earlier decisions in the
    /// same pass.
    pub fn run_cycle(&self, graph: &mut TopologyGraph, index: &RedundancyIndex) -> CycleOutcome {
        let mut outcome = CycleOutcome::default();
        let mut active = graph.active_set();

        for id in graph.link_ids() {
            let (state, utilization) = match graph.link(&id) {
                Some(link) => (link.state, link.utilization),
                None => continue,
            };

            let next = match state {
                PowerState::Sleeping if utilization >= self.thresholds.wake => {
                    Some(PowerState::Active)
                }
                PowerState::Active if utilization < self.thresholds.sleep => {
                    let verdict =
                        SafetyEvaluator::new(graph, index, self.policy).evaluate(&active, &id);
                    match verdict {
                        SleepVerdict::Safe => Some(PowerState::Sleeping),
                        SleepVerdict::Refused(reason) => {
                            debug!(link_id = %id, utilization, reason = %reason, "Keeping idle link awake");
                            outcome.refused += 1;
                            None
                        }
                    }
                }
                _ => None,
            };

            if let Some(to) = next {
                graph.set_state(&id, to);
                match to {
                    PowerState::Active => active.insert(id.clone()),
                    PowerState::Sleeping => active.remove(&id),
                };
                outcome.transitions.push(Transition {
                    link_id: id,
                    from: state,
                    to,
                    utilization,
                });
            }
        }

        let (active_count, sleeping_count) = graph.state_counts();
        outcome.active = active_count;
        outcome.sleeping = sleeping_count;
        outcome
    }
}
