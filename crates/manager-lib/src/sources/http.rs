//! HTTP clients for the discovery and forecast services

use super::{async_trait, ForecastSource, TopologySource};
use crate::error::{ControllerError, Result};
use crate::models::{Forecast, TopologySnapshot};
use anyhow::Context;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Bound on each external call so a slow service only delays a cycle
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

fn build_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}

/// GET `url` and decode a JSON body, mapping every failure through `fail`
async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    fail: fn(String) -> ControllerError,
) -> Result<T> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| fail(format!("request to {} failed: {}", url, e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(fail(format!("{} returned {}: {}", url, status, body.trim())));
    }

    response
        .json()
        .await
        .map_err(|e| fail(format!("invalid payload from {}: {}", url, e)))
}

/// Topology discovery over HTTP
pub struct HttpTopologySource {
    client: Client,
    url: String,
}

impl HttpTopologySource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TopologySource for HttpTopologySource {
    async fn fetch(&self) -> Result<TopologySnapshot> {
        let snapshot: TopologySnapshot =
            get_json(&self.client, &self.url, ControllerError::TopologyUnavailable).await?;

        debug!(url = %self.url, links = snapshot.topology.len(), "Fetched topology snapshot");
        Ok(snapshot)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Forecast polling over HTTP
pub struct HttpForecastSource {
    client: Client,
    url: String,
}

impl HttpForecastSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ForecastSource for HttpForecastSource {
    async fn fetch(&self) -> Result<Forecast> {
        let forecast: Forecast =
            get_json(&self.client, &self.url, ControllerError::ForecastUnavailable).await?;

        debug!(
            url = %self.url,
            predictions = forecast.predictions.len(),
            timestamp = ?forecast.timestamp,
            "Fetched forecast"
        );
        Ok(forecast)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
