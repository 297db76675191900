//! Link power-state control
//!
//! This module provides:
//! - Forecast ingestion onto link utilization
//! - Sleep safety evaluation against the redundancy index
//! - The per-cycle state controller
//! - The fixed-period control loop driving all of the above

mod ingest;
mod r#loop;
mod safety;
mod state;


pub use ingest::{apply_forecast, IngestReport};
pub use r#loop::{
    acquire_topology, Bootstrap, ControlLoop, ControlLoopBuilder, LoopConfig, RetryPolicy,
    TickReport,
};
pub use safety::{CoreMeshPolicy, Refusal, SafetyEvaluator, SleepVerdict};
pub use state::{CycleOutcome, StateController, Thresholds, DEFAULT_SLEEP_THRESHOLD};
