//! HTTP API for health checks, Prometheus metrics and network status

use crate::health::{ComponentStatus, HealthRegistry};
use crate::models::PowerState;
use crate::observability::ControllerMetrics;
use crate::status::{EnergyStatus, LinkStatus, StatusBoard};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: ControllerMetrics,
    pub status: StatusBoard,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, metrics: ControllerMetrics, status: StatusBoard) -> Self {
        Self {
            health_registry,
            metrics,
            status,
        }
    }
}

/// Health check response - 200 while operational, 503 when unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check - 503 until the topology has been acquired
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct LinksQuery {
    pub state: Option<PowerState>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LinksResponse {
    pub total: usize,
    pub active: usize,
    pub sleeping: usize,
    pub links: Vec<LinkStatus>,
}

/// Per-link status, optionally filtered by `?state=active|sleeping`
async fn links(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LinksQuery>,
) -> Json<LinksResponse> {
    let snapshot = state.status.snapshot().await;

    let active = snapshot
        .links
        .iter()
        .filter(|l| l.state == PowerState::Active)
        .count();
    let total = snapshot.links.len();

    let links = snapshot
        .links
        .into_iter()
        .filter(|l| query.state.map_or(true, |s| l.state == s))
        .collect();

    Json(LinksResponse {
        total,
        active,
        sleeping: total - active,
        links,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct EnergyQuery {
    /// Limit the recent samples returned
    pub last: Option<usize>,
}

async fn energy(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EnergyQuery>,
) -> Json<EnergyStatus> {
    let mut energy = state.status.snapshot().await.energy;

    if let Some(last) = query.last {
        let skip = energy.recent.len().saturating_sub(last);
        energy.recent.drain(..skip);
    }

    Json(energy)
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/links", get(links))
        .route("/api/v1/energy", get(energy))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
