//! Error taxonomy for the link power-state controller

use std::path::PathBuf;
use thiserror::Error;

/// Conditions raised by the controller and its external collaborators.
///
/// None of these terminate the control loop once it is running. Topology
/// failures are retried during bootstrap, forecast failures fall back to
/// stale utilization, and export failures keep the series in memory.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Discovery unreachable, empty, or malformed
    #[error("topology unavailable: {0}")]
    TopologyUnavailable(String),

    /// Forecast service unreachable or returned a non-success status
    #[error("forecast unavailable: {0}")]
    ForecastUnavailable(String),

    /// A forecast referenced a link that is not part of the topology
    #[error("unknown link reference: {0}")]
    UnknownLinkReference(String),

    /// Writing the metrics series to persistent storage failed
    #[error("metrics export to {path:?} failed: {reason}")]
    ExportFailure { path: PathBuf, reason: String },

    /// A configuration value was rejected at startup
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ControllerError>;
