//! Forecast ingestion
//!
//! Applies a forecast snapshot onto link utilization. Links missing from
//! the forecast keep their previous value.

use crate::models::Forecast;
use crate::topology::TopologyGraph;
use tracing::debug;

/// Outcome of applying one forecast
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Links whose utilization was overwritten
    pub updated: usize,
    /// Forecast entries naming links outside the topology
    pub unknown: Vec<String>,
    /// Entries without a usable ratio
    pub skipped: usize,
}

/// Overwrite utilization for every known link named in `forecast`
pub fn apply_forecast(graph: &mut TopologyGraph, forecast: &Forecast) -> IngestReport {
    let mut report = IngestReport::default();

    for prediction in &forecast.predictions {
        let (link_id, ratio) = match (&prediction.link_id, prediction.utilization) {
            (Some(link_id), Some(r)) if r.is_finite() => (link_id, r.clamp(0.0, 1.0)),
            _ => {
                report.skipped += 1;
                continue;
            }
        };

        if let Err(e) = graph.set_utilization(link_id, ratio) {
            debug!(error = %e, "Dropping forecast for unknown link");
            report.unknown.push(link_id.clone());
            continue;
        }
        report.updated += 1;
    }

    debug!(
        updated = report.updated,
        unknown = report.unknown.len(),
        skipped = report.skipped,
        timestamp = ?forecast.timestamp,
        "Applied forecast"
    );

    report
}
