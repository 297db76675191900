//! Topology snapshot read from a local JSON file

use super::{async_trait, TopologySource};
use crate::error::{ControllerError, Result};
use crate::models::TopologySnapshot;
use std::path::PathBuf;

/// Reads the same JSON document the discovery service serves
pub struct FileTopologySource {
    path: PathBuf,
}

impl FileTopologySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TopologySource for FileTopologySource {
    async fn fetch(&self) -> Result<TopologySnapshot> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ControllerError::TopologyUnavailable(format!("failed to read {:?}: {}", self.path, e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            ControllerError::TopologyUnavailable(format!("invalid snapshot in {:?}: {}", self.path, e))
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
