//! API client for the energy manager status API

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the energy manager
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// GET `path` and decode the JSON body
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_allowing(path, false).await
    }

    /// Like [`get`](Self::get), but also decodes 503 bodies. Health
    /// endpoints report details with that status.
    pub async fn get_status<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_allowing(path, true).await
    }

    async fn get_allowing<T: DeserializeOwned>(&self, path: &str, unavailable_ok: bool) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let accepted = status.is_success()
            || (unavailable_ok && status == reqwest::StatusCode::SERVICE_UNAVAILABLE);
        if !accepted {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: i64,
    pub port: u32,
    pub hw_addr: String,
}

impl Endpoint {
    /// `h{n}` for hosts, `s{n}` for switches
    pub fn label(&self) -> String {
        if self.node < 0 {
            format!("h{}:{}", -self.node, self.port)
        } else {
            format!("s{}:{}", self.node, self.port)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkStatus {
    pub id: String,
    pub endpoints: (Endpoint, Endpoint),
    pub kind: String,
    pub capacity_gbps: u32,
    pub state: String,
    pub utilization: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksResponse {
    pub total: usize,
    pub active: usize,
    pub sleeping: usize,
    pub links: Vec<LinkStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSample {
    pub cycle: u64,
    pub energy_w: u64,
    pub active_links: usize,
    pub sleeping_links: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyStatus {
    pub cycle: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<MetricsSample>,
    pub total_energy_w: u64,
    pub recorded: usize,
    pub recent: Vec<MetricsSample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINKS_BODY: &str = r#"{
        "total": 2, "active": 1, "sleeping": 1,
        "links": [
            {"id": "link_1", "kind": "access", "capacity_gbps": 5, "state": "sleeping",
             "utilization": 0.05, "group": "access:h1",
             "endpoints": [{"node": 4, "port": 1, "hw_addr": "00:00:00:00:04:01"},
                           {"node": -1, "port": 1, "hw_addr": "00:00:00:00:00:01"}]},
            {"id": "link_2", "kind": "access", "capacity_gbps": 5, "state": "active",
             "utilization": 0.05, "group": "access:h1",
             "endpoints": [{"node": 5, "port": 1, "hw_addr": "00:00:00:00:05:01"},
                           {"node": -1, "port": 1, "hw_addr": "00:00:00:00:00:01"}]}
        ]
    }"#;

    #[tokio::test]
    async fn test_get_links() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/links")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(LINKS_BODY)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let links: LinksResponse = client.get("api/v1/links").await.unwrap();

        mock.assert_async().await;
        assert_eq!(links.total, 2);
        assert_eq!(links.links[0].state, "sleeping");
        assert_eq!(links.links[0].endpoints.0.label(), "s4:1");
        assert_eq!(links.links[0].endpoints.1.label(), "h1:1");
    }

    #[tokio::test]
    async fn test_get_rejects_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/energy")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .get::<EnergyStatus>("api/v1/energy")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_get_status_decodes_unavailable_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/readyz")
            .with_status(503)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ready": false, "reason": "Topology not yet acquired"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let readiness: ReadinessResponse = client.get_status("readyz").await.unwrap();

        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Topology not yet acquired"));
        assert!(client.get::<ReadinessResponse>("readyz").await.is_err());
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
