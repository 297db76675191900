//! Forecast replay from a recorded traffic dataset
//!
//! Rows are grouped by timestamp. Each fetch serves the next timestamp's
//! rows and wraps around at the end of the dataset.

use super::{async_trait, ForecastSource};
use crate::error::{ControllerError, Result};
use crate::models::{Forecast, Prediction};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

#[derive(Debug, Deserialize)]
struct DatasetRow {
    timestamp: String,
    link_id: String,
    #[serde(rename = "bandwidth_utilization (ratio)")]
    utilization: f64,
}

pub struct ReplayForecastSource {
    hours: Vec<(String, Vec<Prediction>)>,
    cursor: AtomicUsize,
    origin: String,
}

impl ReplayForecastSource {
    /// Load a dataset with `timestamp`, `link_id` and
    /// `bandwidth_utilization (ratio)` columns; other columns are ignored
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = csv::Reader::from_path(path).map_err(|e| {
            ControllerError::ForecastUnavailable(format!("failed to open {:?}: {}", path, e))
        })?;
        Self::from_reader(reader, path.display().to_string())
    }

    pub fn from_reader<R: std::io::Read>(
        mut reader: csv::Reader<R>,
        origin: impl Into<String>,
    ) -> Result<Self> {
        let origin = origin.into();
        let mut grouped: BTreeMap<String, Vec<Prediction>> = BTreeMap::new();

        for row in reader.deserialize::<DatasetRow>() {
            let row = row.map_err(|e| {
                ControllerError::ForecastUnavailable(format!("invalid row in {}: {}", origin, e))
            })?;
            grouped.entry(row.timestamp).or_default().push(Prediction::new(row.link_id, row.utilization));
        }

        if grouped.is_empty() {
            return Err(ControllerError::ForecastUnavailable(format!(
                "dataset {} contains no rows",
                origin
            )));
        }

        info!(origin = %origin, hours = grouped.len(), "Loaded forecast replay dataset");

        Ok(Self {
            hours: grouped.into_iter().collect(),
            cursor: AtomicUsize::new(0),
            origin,
        })
    }

    /// Number of distinct timestamps in the dataset
    pub fn len(&self) -> usize {
        self.hours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }
}

#[async_trait]
impl ForecastSource for ReplayForecastSource {
    async fn fetch(&self) -> Result<Forecast> {
        let position = self.cursor.fetch_add(1, Ordering::Relaxed) % self.hours.len();
        let (timestamp, predictions) = &self.hours[position];

        Ok(Forecast {
            timestamp: Some(timestamp.clone()),
            predictions: predictions.clone(),
        })
    }

    fn describe(&self) -> String {
        format!("replay:{}", self.origin)
    }
}
