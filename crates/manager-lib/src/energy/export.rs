//! Tabular export of the metrics series

use super::MetricsSeries;
use crate::error::{ControllerError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Column header of the exported file
pub const EXPORT_HEADER: [&str; 3] = ["Hour", "Energy_W", "Active_Links"];

/// Writes the full series as CSV, replacing the previous export
#[derive(Debug, Clone)]
pub struct CsvExporter {
    path: PathBuf,
}

impl CsvExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize every sample to the export file
    ///
    /// Rows are written to a sibling temporary file which is then renamed
    /// over the target, so readers never observe a partial export.
    pub fn export(&self, series: &MetricsSeries) -> Result<usize> {
        let staging = self.staging_path();

        self.write_rows(&staging, series).map_err(|reason| {
            let _ = std::fs::remove_file(&staging);
            self.failure(reason)
        })?;

        std::fs::rename(&staging, &self.path).map_err(|e| self.failure(e.to_string()))?;

        debug!(path = ?self.path, rows = series.len(), "Wrote metrics export");
        Ok(series.len())
    }

    fn write_rows(&self, path: &Path, series: &MetricsSeries) -> std::result::Result<(), String> {
        let file = File::create(path).map_err(|e| format!("failed to create file: {}", e))?;
        let mut writer = csv::Writer::from_writer(file);

        writer
            .write_record(EXPORT_HEADER)
            .map_err(|e| format!("failed to write header: {}", e))?;

        for sample in series.samples() {
            writer
                .write_record(&[
                    sample.cycle.to_string(),
                    sample.energy_w.to_string(),
                    sample.active_links.to_string(),
                ])
                .map_err(|e| format!("failed to write row: {}", e))?;
        }

        writer
            .flush()
            .map_err(|e| format!("failed to flush writer: {}", e))
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn failure(&self, reason: String) -> ControllerError {
        ControllerError::ExportFailure {
            path: self.path.clone(),
            reason,
        }
    }
}

/// Periodic export trigger: every `every` recorded samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSchedule {
    every: u64,
}

impl Default for ExportSchedule {
    fn default() -> Self {
        Self { every: 6 }
    }
}

impl ExportSchedule {
    pub fn new(every: u64) -> Result<Self> {
        if every == 0 {
            return Err(ControllerError::InvalidConfig(
                "export period must be at least one cycle".to_string(),
            ));
        }
        Ok(Self { every })
    }

    pub fn every(&self) -> u64 {
        self.every
    }

    /// Whether a series holding `recorded` samples is due for export
    pub fn is_due(&self, recorded: usize) -> bool {
        recorded > 0 && recorded as u64 % self.every == 0
    }
}
