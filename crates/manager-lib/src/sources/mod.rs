//! External collaborators: topology discovery and traffic forecasts
//!
//! The controller only consumes snapshots. Discovery is read once at
//! startup; forecasts are pulled every cycle.

mod file;
mod http;
mod replay;


pub use file::FileTopologySource;
pub use http::{HttpForecastSource, HttpTopologySource, DEFAULT_REQUEST_TIMEOUT};
pub use replay::ReplayForecastSource;

use crate::error::Result;
use crate::models::{Forecast, TopologySnapshot};

pub use async_trait::async_trait;

/// Supplies the topology snapshot
#[async_trait]
pub trait TopologySource: Send + Sync {
    /// Fetch the current discovery snapshot
    async fn fetch(&self) -> Result<TopologySnapshot>;

    /// Human-readable origin for logs
    fn describe(&self) -> String;
}

/// Supplies per-link utilization forecasts
#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// Fetch the forecast for the upcoming cycle
    async fn fetch(&self) -> Result<Forecast>;

    fn describe(&self) -> String;
}
