//! Observability infrastructure for the energy manager
//!
//! Provides:
//! - Prometheus metrics (link states, energy cost, transitions, failures, cycle latency)
//! - Structured JSON logging with tracing

use crate::controller::CoreMeshPolicy;
use crate::models::{PowerState, Transition};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for cycle latency (in seconds). Cycles are dominated
/// by the forecast fetch, bounded by the request timeout.
const CYCLE_LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ControllerMetricsInner> = OnceLock::new();

struct ControllerMetricsInner {
    active_links: IntGauge,
    sleeping_links: IntGauge,
    energy_watts: IntGauge,
    cycles: IntCounter,
    transitions: IntCounterVec,
    refused_sleeps: IntCounter,
    forecast_failures: IntCounter,
    export_failures: IntCounter,
    unknown_link_references: IntCounter,
    cycle_latency_seconds: Histogram,
}

impl ControllerMetricsInner {
    fn new() -> Self {
        Self {
            active_links: register_int_gauge!(
                "backhaul_energy_active_links",
                "Number of links currently powered up"
            )
            .expect("Failed to register active_links"),

            sleeping_links: register_int_gauge!(
                "backhaul_energy_sleeping_links",
                "Number of links currently sleeping"
            )
            .expect("Failed to register sleeping_links"),

            energy_watts: register_int_gauge!(
                "backhaul_energy_cycle_energy_watts",
                "Energy cost of the most recent cycle in abstract watts"
            )
            .expect("Failed to register energy_watts"),

            cycles: register_int_counter!(
                "backhaul_energy_cycles_total",
                "Control cycles completed"
            )
            .expect("Failed to register cycles"),

            transitions: register_int_counter_vec!(
                "backhaul_energy_transitions_total",
                "Link power-state transitions",
                &["to"]
            )
            .expect("Failed to register transitions"),

            refused_sleeps: register_int_counter!(
                "backhaul_energy_refused_sleeps_total",
                "Idle links kept awake by the safety evaluator"
            )
            .expect("Failed to register refused_sleeps"),

            forecast_failures: register_int_counter!(
                "backhaul_energy_forecast_failures_total",
                "Cycles that ran on stale utilization because the forecast was unavailable"
            )
            .expect("Failed to register forecast_failures"),

            export_failures: register_int_counter!(
                "backhaul_energy_export_failures_total",
                "Failed metrics exports"
            )
            .expect("Failed to register export_failures"),

            unknown_link_references: register_int_counter!(
                "backhaul_energy_unknown_link_references_total",
                "Forecast entries naming links outside the topology"
            )
            .expect("Failed to register unknown_link_references"),

            cycle_latency_seconds: register_histogram!(
                "backhaul_energy_cycle_latency_seconds",
                "Wall time of one control cycle",
                CYCLE_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),
        }
    }
}

/// Controller metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct ControllerMetrics {
    _private: (),
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ControllerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ControllerMetricsInner {
        GLOBAL_METRICS.get_or_init(ControllerMetricsInner::new)
    }

    /// Record the link census and energy of a finished cycle
    pub fn record_cycle(&self, active: usize, sleeping: usize, energy_w: u64, latency_secs: f64) {
        let inner = self.inner();
        inner.active_links.set(active as i64);
        inner.sleeping_links.set(sleeping as i64);
        inner.energy_watts.set(energy_w as i64);
        inner.cycles.inc();
        inner.cycle_latency_seconds.observe(latency_secs);
    }

    pub fn inc_transition(&self, to: PowerState) {
        self.inner()
            .transitions
            .with_label_values(&[&to.to_string()])
            .inc();
    }

    pub fn inc_refused_sleeps(&self, count: usize) {
        self.inner().refused_sleeps.inc_by(count as u64);
    }

    pub fn inc_forecast_failures(&self) {
        self.inner().forecast_failures.inc();
    }

    pub fn inc_export_failures(&self) {
        self.inner().export_failures.inc();
    }

    pub fn inc_unknown_link_references(&self, count: usize) {
        self.inner().unknown_link_references.inc_by(count as u64);
    }
}

/// Structured logger for controller events
///
/// Provides consistent JSON-formatted logging for transitions, cycle
/// summaries and lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, policy: CoreMeshPolicy) {
        info!(
            event = "manager_started",
            instance = %self.instance,
            version = %version,
            core_mesh_policy = ?policy,
            "Energy manager started"
        );
        if policy == CoreMeshPolicy::AssumeRedundant {
            warn!(
                event = "core_mesh_unverified",
                instance = %self.instance,
                "Core-mesh links will sleep without a connectivity check"
            );
        }
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "manager_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Energy manager shutting down"
        );
    }

    pub fn log_topology_acquired(&self, source: &str, links: usize, groups: usize, attempts: u32) {
        info!(
            event = "topology_acquired",
            instance = %self.instance,
            source = %source,
            links = links,
            redundancy_groups = groups,
            attempts = attempts,
            "Topology acquired"
        );
    }

    /// Log a link waking up or going to sleep
    pub fn log_transition(&self, cycle: u64, transition: &Transition) {
        let verb = match transition.to {
            PowerState::Active => "Link woke",
            PowerState::Sleeping => "Link slept",
        };
        info!(
            event = "link_transition",
            instance = %self.instance,
            cycle = cycle,
            link_id = %transition.link_id,
            from = %transition.from,
            to = %transition.to,
            utilization_percent = transition.utilization * 100.0,
            "{}",
            verb
        );
    }

    pub fn log_cycle_summary(
        &self,
        cycle: u64,
        energy_w: u64,
        active: usize,
        sleeping: usize,
        stale: bool,
    ) {
        info!(
            event = "cycle_summary",
            instance = %self.instance,
            cycle = cycle,
            energy_w = energy_w,
            active_links = active,
            sleeping_links = sleeping,
            total_links = active + sleeping,
            stale_forecast = stale,
            "Cycle complete"
        );
    }

    pub fn log_forecast_failure(&self, cycle: u64, error: &str) {
        warn!(
            event = "forecast_unavailable",
            instance = %self.instance,
            cycle = cycle,
            error = %error,
            "Forecast unavailable, evaluating stale utilization"
        );
    }

    pub fn log_export(&self, path: &Path, rows: usize) {
        info!(
            event = "metrics_exported",
            instance = %self.instance,
            path = %path.display(),
            rows = rows,
            "Metrics exported"
        );
    }

    pub fn log_export_failure(&self, path: &Path, error: &str, retained: usize) {
        warn!(
            event = "metrics_export_failed",
            instance = %self.instance,
            path = %path.display(),
            error = %error,
            retained_rows = retained,
            "Metrics export failed, series retained for the next attempt"
        );
    }
}
