//! Core data models for the backhaul energy manager

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Stable link identifier as issued by topology discovery (e.g. `link_17`)
///
/// Identifiers order naturally: a trailing number is compared numerically,
/// so `link_2` sorts before `link_10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(String);

impl LinkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn natural_key(&self) -> (&str, Option<u64>) {
        let digits = self
            .0
            .bytes()
            .rev()
            .take_while(|b| b.is_ascii_digit())
            .count();
        let (prefix, number) = self.0.split_at(self.0.len() - digits);
        (prefix, number.parse().ok())
    }
}

impl Ord for LinkId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.natural_key()
            .cmp(&other.natural_key())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for LinkId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LinkId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Node identifier as a datapath id. Negative values denote hosts keyed by
/// `-hostIndex`, positive values denote switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl NodeId {
    pub fn is_host(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_host() {
            write!(f, "h{}", -self.0)
        } else {
            write!(f, "s{}", self.0)
        }
    }
}

/// Position of a node in the backhaul hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Core,
    Aggregation,
    Host,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Core => write!(f, "core"),
            Tier::Aggregation => write!(f, "aggregation"),
            Tier::Host => write!(f, "host"),
        }
    }
}

/// A switch or host in the topology. Immutable after topology build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub tier: Tier,
}

/// One side of a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: NodeId,
    pub port: u32,
    pub hw_addr: String,
}

/// Power state of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    Active,
    Sleeping,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Active => write!(f, "active"),
            PowerState::Sleeping => write!(f, "sleeping"),
        }
    }
}

/// Structural category of a link, derived from the tiers it joins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Host to aggregation switch
    Access,
    /// Aggregation switch to core switch
    Uplink,
    /// Core switch to core switch
    CoreMesh,
    /// Any other tier pair; never put to sleep
    Unclassified,
}

impl LinkKind {
    pub fn from_tiers(a: Tier, b: Tier) -> Self {
        match (a, b) {
            (Tier::Host, Tier::Aggregation) | (Tier::Aggregation, Tier::Host) => LinkKind::Access,
            (Tier::Aggregation, Tier::Core) | (Tier::Core, Tier::Aggregation) => LinkKind::Uplink,
            (Tier::Core, Tier::Core) => LinkKind::CoreMesh,
            _ => LinkKind::Unclassified,
        }
    }

    /// Informational bandwidth class in Gbps
    pub fn capacity_gbps(&self) -> u32 {
        match self {
            LinkKind::Access => 5,
            LinkKind::Uplink => 20,
            LinkKind::CoreMesh => 50,
            LinkKind::Unclassified => 0,
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Access => write!(f, "access"),
            LinkKind::Uplink => write!(f, "uplink"),
            LinkKind::CoreMesh => write!(f, "core_mesh"),
            LinkKind::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// An edge of the topology graph with its mutable power state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub endpoints: (Endpoint, Endpoint),
    pub kind: LinkKind,
    pub capacity_gbps: u32,
    pub state: PowerState,
    /// Last known utilization ratio in `[0.0, 1.0]`
    pub utilization: f64,
}

impl Link {
    pub fn is_active(&self) -> bool {
        self.state == PowerState::Active
    }

    pub fn nodes(&self) -> (NodeId, NodeId) {
        (self.endpoints.0.node, self.endpoints.1.node)
    }
}

/// Observable record of a power-state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub link_id: LinkId,
    pub from: PowerState,
    pub to: PowerState,
    pub utilization: f64,
}

/// Raw discovery tuple `[dpidA, portA, hwA, dpidB, portB, hwB]`
pub type RawLink = (i64, u32, String, i64, u32, String);

/// Topology snapshot as served by the discovery service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologySnapshot {
    #[serde(default)]
    pub topology: BTreeMap<String, RawLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_links: Option<usize>,
}

/// One per-link forecast entry
///
/// Fields of the wrong type decode as `None` so that one bad entry does
/// not reject the rest of the forecast.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub link_id: Option<String>,
    #[serde(
        rename = "bandwidth_utilization (ratio)",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub utilization: Option<f64>,
}

impl Prediction {
    pub fn new(link_id: impl Into<String>, utilization: f64) -> Self {
        Self {
            link_id: Some(link_id.into()),
            utilization: Some(utilization),
        }
    }
}

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_predictions<'de, D>(deserializer: D) -> std::result::Result<Vec<Prediction>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .map(|entry| serde_json::from_value(entry).unwrap_or_default())
        .collect())
}

/// Forecast snapshot for the upcoming cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Forecast {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_predictions")]
    pub predictions: Vec<Prediction>,
}

impl Forecast {
    /// Build a forecast from `(link_id, ratio)` pairs
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self {
            timestamp: None,
            predictions: pairs
                .into_iter()
                .map(|(link_id, ratio)| Prediction::new(link_id, ratio))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_id_natural_order() {
        let mut ids: Vec<LinkId> = ["link_10", "link_2", "link_1", "uplink_3"]
            .into_iter()
            .map(LinkId::from)
            .collect();
        ids.sort();

        let ordered: Vec<&str> = ids.iter().map(LinkId::as_str).collect();
        assert_eq!(ordered, vec!["link_1", "link_2", "link_10", "uplink_3"]);
    }

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId(-3).to_string(), "h3");
        assert_eq!(NodeId(7).to_string(), "s7");
        assert!(NodeId(-1).is_host());
    }

    #[test]
    fn test_link_kind_from_tiers() {
        assert_eq!(LinkKind::from_tiers(Tier::Aggregation, Tier::Host), LinkKind::Access);
        assert_eq!(LinkKind::from_tiers(Tier::Core, Tier::Aggregation), LinkKind::Uplink);
        assert_eq!(LinkKind::from_tiers(Tier::Core, Tier::Core), LinkKind::CoreMesh);
        assert_eq!(
            LinkKind::from_tiers(Tier::Aggregation, Tier::Aggregation),
            LinkKind::Unclassified
        );
        assert_eq!(LinkKind::from_tiers(Tier::Host, Tier::Core), LinkKind::Unclassified);
    }

    #[test]
    fn test_forecast_parses_service_payload() {
        let payload = r#"{
            "timestamp": "2024-01-01 03:00:00",
            "predictions": [
                {"link_id": "link_1", "bandwidth_utilization (ratio)": 0.42, "traffic_volume (Mbps)": 12.0},
                {"link_id": "link_2"}
            ]
        }"#;

        let forecast: Forecast = serde_json::from_str(payload).unwrap();
        assert_eq!(forecast.timestamp.as_deref(), Some("2024-01-01 03:00:00"));
        assert_eq!(forecast.predictions.len(), 2);
        assert_eq!(forecast.predictions[0].utilization, Some(0.42));
        assert_eq!(forecast.predictions[1].utilization, None);
    }

    #[test]
    fn test_forecast_tolerates_malformed_entries() {
        let payload = r#"{
            "predictions": [
                {"link_id": "link_1", "bandwidth_utilization (ratio)": 0.42},
                {"link_id": "link_2", "bandwidth_utilization (ratio)": "n/a"},
                {"bandwidth_utilization (ratio)": 0.1},
                {"link_id": 7, "bandwidth_utilization (ratio)": 0.3},
                "garbage"
            ]
        }"#;

        let forecast: Forecast = serde_json::from_str(payload).unwrap();
        assert_eq!(forecast.predictions.len(), 5);
        assert_eq!(forecast.predictions[0].link_id.as_deref(), Some("link_1"));
        assert_eq!(forecast.predictions[0].utilization, Some(0.42));
        assert_eq!(forecast.predictions[1].link_id.as_deref(), Some("link_2"));
        assert_eq!(forecast.predictions[1].utilization, None);
        assert_eq!(forecast.predictions[2].link_id, None);
        assert_eq!(forecast.predictions[3].link_id, None);
        assert_eq!(forecast.predictions[4].link_id, None);
    }

    #[test]
    fn test_topology_snapshot_parses_tuples() {
        let payload = r#"{
            "topology": {"link_1": [4, 1, "00:00:00:00:04:01", -1, 1, "00:00:00:00:00:01"]},
            "total_links": 1
        }"#;

        let snapshot: TopologySnapshot = serde_json::from_str(payload).unwrap();
        let raw = &snapshot.topology["link_1"];
        assert_eq!(raw.0, 4);
        assert_eq!(raw.3, -1);
        assert_eq!(snapshot.total_links, Some(1));
    }
}
