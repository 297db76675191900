//! Library for the backhaul energy manager
//!
//! This crate provides the core functionality for:
//! - Building the topology graph and its redundancy index
//! - Ingesting utilization forecasts
//! - Deciding which links may sleep without partitioning the network
//! - Energy accounting and export
//! - Health checks, metrics and the status API

pub mod api;
pub mod controller;
pub mod energy;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod sources;
pub mod status;
pub mod topology;

#[cfg(test)]
mod fixtures;

pub use controller::{ControlLoop, ControlLoopBuilder, CoreMeshPolicy, StateController, Thresholds};
pub use error::{ControllerError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ControllerMetrics, StructuredLogger};
pub use topology::{RedundancyIndex, TopologyGraph};
