//! Fixed-period control loop
//!
//! Acquires the topology once, then on every tick pulls a forecast, runs
//! the state controller, records energy and exports the series on
//! schedule. A final export runs on shutdown.

use super::ingest::apply_forecast;
use super::safety::CoreMeshPolicy;
use super::state::{StateController, Thresholds};
use crate::energy::{CsvExporter, EnergyModel, ExportSchedule, MetricsSample, MetricsSeries};
use crate::error::Result;
use crate::health::{components, HealthRegistry};
use crate::observability::{ControllerMetrics, StructuredLogger};
use crate::sources::{ForecastSource, TopologySource};
use crate::status::{NetworkStatus, StatusBoard};
use crate::topology::{RedundancyIndex, TopologyGraph};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Bootstrap retry policy for topology acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

/// Topology and redundancy index acquired at startup
#[derive(Debug)]
pub struct Bootstrap {
    pub graph: TopologyGraph,
    pub index: RedundancyIndex,
    pub attempts: u32,
}

/// Fetch and build the topology, retrying with a fixed delay
///
/// Fetch failures and malformed snapshots are both retried. Returns the
/// last error only when `retry.max_attempts` is reached.
pub async fn acquire_topology(source: &dyn TopologySource, retry: RetryPolicy) -> Result<Bootstrap> {
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let built = match source.fetch().await {
            Ok(snapshot) => TopologyGraph::build(&snapshot),
            Err(e) => Err(e),
        };

        match built {
            Ok(graph) => {
                let index = RedundancyIndex::compute(&graph);
                return Ok(Bootstrap {
                    graph,
                    index,
                    attempts,
                });
            }
            Err(e) if retry.exhausted(attempts) => return Err(e),
            Err(e) => {
                warn!(
                    source = %source.describe(),
                    attempt = attempts,
                    retry_in_secs = retry.delay.as_secs_f64(),
                    error = %e,
                    "Topology unavailable, retrying"
                );
                tokio::time::sleep(retry.delay).await;
            }
        }
    }
}

/// Configuration for the control loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// One simulated hour (default: 10 seconds)
    pub interval: Duration,
    pub thresholds: Thresholds,
    pub policy: CoreMeshPolicy,
    pub energy: EnergyModel,
    pub export_schedule: ExportSchedule,
    pub export_path: PathBuf,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            thresholds: Thresholds::default(),
            policy: CoreMeshPolicy::default(),
            energy: EnergyModel::default(),
            export_schedule: ExportSchedule::default(),
            export_path: PathBuf::from("energy_metrics.csv"),
        }
    }
}

/// What happened during one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub sample: MetricsSample,
    /// Utilization was not refreshed this tick
    pub stale: bool,
    pub woken: usize,
    pub slept: usize,
    /// `Some(success)` if an export was attempted
    pub exported: Option<bool>,
}

/// Single owner and mutator of link state
pub struct ControlLoop {
    graph: TopologyGraph,
    index: RedundancyIndex,
    forecast: Arc<dyn ForecastSource>,
    controller: StateController,
    config: LoopConfig,
    exporter: CsvExporter,
    series: MetricsSeries,
    cycle: u64,
    health: HealthRegistry,
    status: StatusBoard,
    metrics: ControllerMetrics,
    logger: StructuredLogger,
}

impl ControlLoop {
    pub fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    pub fn series(&self) -> &MetricsSeries {
        &self.series
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Run until a shutdown signal, then export once more
    ///
    /// Returns the full series recorded during the run.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> MetricsSeries {
        info!(
            interval_secs = self.config.interval.as_secs_f64(),
            links = self.graph.len(),
            export_every = self.config.export_schedule.every(),
            "Starting control loop"
        );

        self.publish().await;

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    info!(cycles = self.cycle, "Shutting down control loop");
                    break;
                }
            }
        }

        self.export().await;
        self.publish().await;
        self.series
    }

    /// Execute one cycle to completion. Never fails; errors degrade the
    /// cycle instead.
    pub async fn tick(&mut self) -> TickReport {
        let start = Instant::now();
        self.cycle += 1;
        let cycle = self.cycle;

        let stale = match self.forecast.fetch().await {
            Ok(forecast) => {
                let report = apply_forecast(&mut self.graph, &forecast);
                if !report.unknown.is_empty() {
                    self.metrics
                        .inc_unknown_link_references(report.unknown.len());
                }
                self.health.set_healthy(components::FORECAST).await;
                false
            }
            Err(e) => {
                self.logger.log_forecast_failure(cycle, &e.to_string());
                self.metrics.inc_forecast_failures();
                self.health
                    .set_degraded(components::FORECAST, e.to_string())
                    .await;
                true
            }
        };

        let outcome = self.controller.run_cycle(&mut self.graph, &self.index);
        for transition in &outcome.transitions {
            self.logger.log_transition(cycle, transition);
            self.metrics.inc_transition(transition.to);
        }
        if outcome.refused > 0 {
            self.metrics.inc_refused_sleeps(outcome.refused);
        }

        let sample = self.config.energy.sample(cycle, &self.graph);
        self.series.record(sample);
        self.health.set_healthy(components::CONTROLLER).await;

        let exported = if self.config.export_schedule.is_due(self.series.len()) {
            Some(self.export().await)
        } else {
            None
        };

        self.publish().await;

        let elapsed = start.elapsed();
        self.metrics.record_cycle(
            sample.active_links,
            sample.sleeping_links,
            sample.energy_w,
            elapsed.as_secs_f64(),
        );
        self.logger.log_cycle_summary(
            cycle,
            sample.energy_w,
            sample.active_links,
            sample.sleeping_links,
            stale,
        );
        debug!(cycle, elapsed_ms = elapsed.as_millis() as u64, "Tick complete");

        TickReport {
            sample,
            stale,
            woken: outcome.woken(),
            slept: outcome.slept(),
            exported,
        }
    }

    /// Write the series; a failure keeps the series for the next attempt
    async fn export(&self) -> bool {
        match self.exporter.export(&self.series) {
            Ok(rows) => {
                self.logger.log_export(self.exporter.path(), rows);
                self.health.set_healthy(components::EXPORTER).await;
                true
            }
            Err(e) => {
                self.metrics.inc_export_failures();
                self.logger
                    .log_export_failure(self.exporter.path(), &e.to_string(), self.series.len());
                self.health
                    .set_degraded(components::EXPORTER, e.to_string())
                    .await;
                false
            }
        }
    }

    async fn publish(&self) {
        self.status
            .publish(NetworkStatus::capture(
                &self.graph,
                &self.index,
                &self.series,
                self.cycle,
            ))
            .await;
    }
}

/// Builder for the control loop
pub struct ControlLoopBuilder {
    bootstrap: Option<(TopologyGraph, RedundancyIndex)>,
    forecast: Option<Arc<dyn ForecastSource>>,
    config: LoopConfig,
    health: Option<HealthRegistry>,
    status: Option<StatusBoard>,
    logger: Option<StructuredLogger>,
}

impl ControlLoopBuilder {
    pub fn new() -> Self {
        Self {
            bootstrap: None,
            forecast: None,
            config: LoopConfig::default(),
            health: None,
            status: None,
            logger: None,
        }
    }

    /// Set the acquired topology
    pub fn topology(mut self, graph: TopologyGraph, index: RedundancyIndex) -> Self {
        self.bootstrap = Some((graph, index));
        self
    }

    pub fn forecast_source(mut self, source: Arc<dyn ForecastSource>) -> Self {
        self.forecast = Some(source);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    pub fn core_mesh_policy(mut self, policy: CoreMeshPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    pub fn energy_model(mut self, energy: EnergyModel) -> Self {
        self.config.energy = energy;
        self
    }

    pub fn export_schedule(mut self, schedule: ExportSchedule) -> Self {
        self.config.export_schedule = schedule;
        self
    }

    pub fn export_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.export_path = path.into();
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn status_board(mut self, status: StatusBoard) -> Self {
        self.status = Some(status);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> anyhow::Result<ControlLoop> {
        let (graph, index) = self
            .bootstrap
            .ok_or_else(|| anyhow::anyhow!("Topology is required"))?;
        let forecast = self
            .forecast
            .ok_or_else(|| anyhow::anyhow!("Forecast source is required"))?;

        if self.config.interval.is_zero() {
            anyhow::bail!("Cycle interval must be positive");
        }

        Ok(ControlLoop {
            graph,
            index,
            forecast,
            controller: StateController::new(self.config.thresholds, self.config.policy),
            exporter: CsvExporter::new(self.config.export_path.clone()),
            config: self.config,
            series: MetricsSeries::new(),
            cycle: 0,
            health: self.health.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            metrics: ControllerMetrics::new(),
            logger: self
                .logger
                .unwrap_or_else(|| StructuredLogger::new("energy-manager")),
        })
    }
}

impl Default for ControlLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControllerError;
    use crate::fixtures;
    use crate::models::{Forecast, LinkId, PowerState, TopologySnapshot};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serves queued forecasts; `None` entries and an empty queue fail
    struct ScriptedForecasts {
        script: Mutex<VecDeque<Option<Forecast>>>,
    }

    impl ScriptedForecasts {
        fn new(script: Vec<Option<Forecast>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
            })
        }
    }

    #[async_trait]
    impl ForecastSource for ScriptedForecasts {
        async fn fetch(&self) -> Result<Forecast> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .flatten()
                .ok_or_else(|| ControllerError::ForecastUnavailable("scripted outage".into()))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    /// Fails a fixed number of times before serving the snapshot
    struct FlakyTopology {
        failures: u32,
        calls: AtomicU32,
        snapshot: TopologySnapshot,
    }

    #[async_trait]
    impl TopologySource for FlakyTopology {
        async fn fetch(&self) -> Result<TopologySnapshot> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(ControllerError::TopologyUnavailable("not ready".into()))
            } else {
                Ok(self.snapshot.clone())
            }
        }

        fn describe(&self) -> String {
            "flaky".to_string()
        }
    }

    fn fast_retry(max_attempts: Option<u32>) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_millis(1),
            max_attempts,
        }
    }

    fn dual_homed_loop(script: Vec<Option<Forecast>>, dir: &TempDir) -> ControlLoop {
        let (graph, index) = fixtures::dual_homed();
        ControlLoopBuilder::new()
            .topology(graph, index)
            .forecast_source(ScriptedForecasts::new(script))
            .export_path(dir.path().join("energy_metrics.csv"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_loop_config_default() {
        let config = LoopConfig::default();
        assert_eq!(config.interval, Duration::from_secs(10));
        assert_eq!(config.export_schedule.every(), 6);
        assert_eq!(config.export_path, PathBuf::from("energy_metrics.csv"));
        assert_eq!(RetryPolicy::default().delay, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_requires_topology_and_forecast() {
        let (graph, index) = fixtures::dual_homed();
        assert!(ControlLoopBuilder::new()
            .forecast_source(ScriptedForecasts::new(vec![]))
            .build()
            .is_err());
        assert!(ControlLoopBuilder::new()
            .topology(graph, index)
            .build()
            .is_err());
    }

    #[tokio::test]
    async fn test_acquire_topology_retries_until_success() {
        let source = FlakyTopology {
            failures: 2,
            calls: AtomicU32::new(0),
            snapshot: fixtures::backhaul_snapshot(),
        };

        let bootstrap = acquire_topology(&source, fast_retry(None)).await.unwrap();
        assert_eq!(bootstrap.attempts, 3);
        assert_eq!(bootstrap.graph.len(), 39);
        assert!(!bootstrap.index.is_empty());
    }

    #[tokio::test]
    async fn test_acquire_topology_gives_up_after_max_attempts() {
        let source = FlakyTopology {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
            snapshot: TopologySnapshot::default(),
        };

        let result = acquire_topology(&source, fast_retry(Some(3))).await;
        assert!(matches!(result, Err(ControllerError::TopologyUnavailable(_))));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_acquire_topology_retries_malformed_snapshot() {
        let source = FlakyTopology {
            failures: 0,
            calls: AtomicU32::new(0),
            snapshot: TopologySnapshot::default(),
        };

        assert!(acquire_topology(&source, fast_retry(Some(2))).await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_tick_applies_forecast_and_records_energy() {
        let dir = TempDir::new().unwrap();
        let mut control = dual_homed_loop(
            vec![Some(Forecast::from_pairs([("link_1", 0.05), ("link_2", 0.05)]))],
            &dir,
        );

        let report = control.tick().await;

        assert!(!report.stale);
        assert_eq!(report.slept, 1);
        assert_eq!(report.sample.cycle, 1);
        assert_eq!(report.sample.active_links, 1);
        assert_eq!(report.sample.energy_w, 110);
        assert_eq!(report.exported, None);
        assert_eq!(control.series().len(), 1);
    }

    #[tokio::test]
    async fn test_forecast_outage_runs_on_stale_utilization() {
        let dir = TempDir::new().unwrap();
        let mut control = dual_homed_loop(
            vec![
                Some(Forecast::from_pairs([("link_1", 0.5), ("link_2", 0.5)])),
                None,
            ],
            &dir,
        );

        control.tick().await;
        let report = control.tick().await;

        assert!(report.stale);
        assert_eq!(report.sample.active_links, 2);
        assert_eq!(control.cycle(), 2);
        assert_eq!(
            control.graph().link(&LinkId::from("link_1")).map(|l| l.utilization),
            Some(0.5)
        );
    }

    #[tokio::test]
    async fn test_periodic_export_every_six_cycles() {
        let dir = TempDir::new().unwrap();
        let mut control = dual_homed_loop(vec![], &dir);

        for _ in 0..5 {
            assert_eq!(control.tick().await.exported, None);
        }
        assert_eq!(control.tick().await.exported, Some(true));

        let content = std::fs::read_to_string(dir.path().join("energy_metrics.csv")).unwrap();
        assert_eq!(content.lines().count(), 7);
    }

    #[tokio::test]
    async fn test_export_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let (graph, index) = fixtures::dual_homed();
        let mut control = ControlLoopBuilder::new()
            .topology(graph, index)
            .forecast_source(ScriptedForecasts::new(vec![]))
            .export_schedule(ExportSchedule::new(1).unwrap())
            .export_path(dir.path().join("missing").join("energy_metrics.csv"))
            .build()
            .unwrap();

        assert_eq!(control.tick().await.exported, Some(false));
        assert_eq!(control.tick().await.exported, Some(false));
        assert_eq!(control.series().len(), 2);
    }

    #[tokio::test]
    async fn test_run_exports_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("energy_metrics.csv");
        let (graph, index) = fixtures::dual_homed();
        let health = HealthRegistry::new();
        let status = StatusBoard::new();

        let control = ControlLoopBuilder::new()
            .topology(graph, index)
            .forecast_source(ScriptedForecasts::new(vec![Some(Forecast::from_pairs([
                ("link_1", 0.01),
                ("link_2", 0.01),
            ]))]))
            .interval(Duration::from_millis(5))
            .export_path(&path)
            .health(health.clone())
            .status_board(status.clone())
            .build()
            .unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(control.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(40)).await;
        shutdown_tx.send(()).unwrap();
        let series = handle.await.unwrap();

        assert!(!series.is_empty());
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), series.len() + 1);

        let published = status.snapshot().await;
        assert_eq!(published.energy.recorded, series.len());
        assert_eq!(
            published
                .links
                .iter()
                .filter(|l| l.state == PowerState::Sleeping)
                .count(),
            1
        );

        let reported = health.health().await.components;
        assert!(reported.contains_key(components::EXPORTER));
    }
}
