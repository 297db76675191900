//! Backhaul energy manager
//!
//! Acquires the network topology once, then every cycle pulls a traffic
//! forecast and decides which links may sleep without partitioning the
//! backhaul.

use anyhow::{Context, Result};
use manager_lib::{
    api,
    controller::{acquire_topology, ControlLoopBuilder},
    health::{components, HealthRegistry},
    observability::{ControllerMetrics, StructuredLogger},
    sources::{
        FileTopologySource, ForecastSource, HttpForecastSource, HttpTopologySource,
        ReplayForecastSource, TopologySource,
    },
    status::StatusBoard,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod shutdown;

const MANAGER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::ManagerConfig::load()?;
    info!(
        instance = %config.instance,
        cycle_interval_secs = config.cycle_interval_secs,
        export_path = %config.export_path.display(),
        "Manager configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    let metrics = ControllerMetrics::new();
    let status = StatusBoard::new();

    let logger = StructuredLogger::new(&config.instance);
    logger.log_startup(MANAGER_VERSION, config.core_mesh_policy);

    // Serve health and metrics while the topology is still being acquired
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        status.clone(),
    ));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let mut signals = shutdown::ShutdownSignals::install()?;

    let topology_source = topology_source(&config)?;
    let forecast_source = forecast_source(&config)?;

    let bootstrap = tokio::select! {
        result = acquire_topology(topology_source.as_ref(), config.retry_policy()) => {
            match result {
                Ok(bootstrap) => bootstrap,
                Err(e) => {
                    health_registry
                        .set_unhealthy(components::TOPOLOGY, e.to_string())
                        .await;
                    logger.log_shutdown("topology never became available");
                    return Err(e).context("Topology acquisition gave up");
                }
            }
        }
        reason = signals.recv() => {
            logger.log_shutdown(&format!("{} before topology was acquired", reason?));
            return Ok(());
        }
    };

    logger.log_topology_acquired(
        &topology_source.describe(),
        bootstrap.graph.len(),
        bootstrap.index.len(),
        bootstrap.attempts,
    );
    health_registry.set_healthy(components::TOPOLOGY).await;

    let control = ControlLoopBuilder::new()
        .topology(bootstrap.graph, bootstrap.index)
        .forecast_source(forecast_source)
        .config(config.loop_config()?)
        .health(health_registry.clone())
        .status_board(status)
        .logger(logger.clone())
        .build()?;

    health_registry.set_ready(true).await;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let loop_handle = tokio::spawn(control.run(shutdown_rx));

    let reason = signals.recv().await?;
    logger.log_shutdown(reason);

    if shutdown_tx.send(()).is_err() {
        warn!("Control loop already stopped");
    }

    match loop_handle.await {
        Ok(series) => info!(
            cycles = series.len(),
            total_energy_w = series.total_energy_w(),
            "Control loop stopped"
        ),
        Err(e) => error!(error = %e, "Control loop task failed"),
    }

    api_handle.abort();
    Ok(())
}

fn topology_source(config: &config::ManagerConfig) -> Result<Box<dyn TopologySource>> {
    Ok(match &config.topology_file {
        Some(path) => Box::new(FileTopologySource::new(path)),
        None => Box::new(HttpTopologySource::new(
            &config.topology_url,
            config.request_timeout(),
        )?),
    })
}

fn forecast_source(config: &config::ManagerConfig) -> Result<Arc<dyn ForecastSource>> {
    Ok(match &config.forecast_replay_file {
        Some(path) => Arc::new(ReplayForecastSource::from_path(path)?),
        None => Arc::new(HttpForecastSource::new(
            &config.forecast_url,
            config.request_timeout(),
        )?),
    })
}
