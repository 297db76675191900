//! Manager configuration

use anyhow::{Context, Result};
use manager_lib::controller::{CoreMeshPolicy, LoopConfig, RetryPolicy, Thresholds};
use manager_lib::energy::{EnergyModel, ExportSchedule};
use manager_lib::sources::DEFAULT_REQUEST_TIMEOUT;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming an optional configuration file
pub const CONFIG_FILE_ENV: &str = "BHE_CONFIG_FILE";

/// Manager configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    /// Instance name used in structured logs
    #[serde(default = "default_instance")]
    pub instance: String,

    /// API server port for health, metrics and status
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Topology discovery endpoint
    #[serde(default = "default_topology_url")]
    pub topology_url: String,

    /// Read the topology snapshot from a file instead of HTTP
    #[serde(default)]
    pub topology_file: Option<PathBuf>,

    /// Forecast endpoint
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,

    /// Replay a recorded forecast dataset instead of polling HTTP
    #[serde(default)]
    pub forecast_replay_file: Option<PathBuf>,

    /// One simulated hour in seconds
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,

    #[serde(default = "default_sleep_threshold")]
    pub sleep_threshold: f64,

    /// Defaults to `sleep_threshold`
    #[serde(default)]
    pub wake_threshold: Option<f64>,

    #[serde(default = "default_export_every")]
    pub export_every_cycles: u64,

    #[serde(default = "default_export_path")]
    pub export_path: PathBuf,

    #[serde(default = "default_cost_active")]
    pub cost_active_w: u64,

    #[serde(default = "default_cost_sleeping")]
    pub cost_sleeping_w: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_topology_retry")]
    pub topology_retry_secs: u64,

    /// Unset retries forever
    #[serde(default)]
    pub topology_max_attempts: Option<u32>,

    #[serde(default)]
    pub core_mesh_policy: CoreMeshPolicy,
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "energy-manager".to_string())
}

fn default_api_port() -> u16 {
    9100
}

fn default_topology_url() -> String {
    "http://localhost:8080/topology".to_string()
}

fn default_forecast_url() -> String {
    "http://localhost:5000/predictions/next_hour".to_string()
}

fn default_cycle_interval() -> u64 {
    10
}

fn default_sleep_threshold() -> f64 {
    manager_lib::controller::DEFAULT_SLEEP_THRESHOLD
}

fn default_export_every() -> u64 {
    6
}

fn default_export_path() -> PathBuf {
    PathBuf::from("energy_metrics.csv")
}

fn default_cost_active() -> u64 {
    EnergyModel::default().cost_active_w
}

fn default_cost_sleeping() -> u64 {
    EnergyModel::default().cost_sleeping_w
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_millis() as u64
}

fn default_topology_retry() -> u64 {
    5
}

/// `BHE_*` environment layer
fn environment() -> config::Environment {
    config::Environment::with_prefix("BHE").try_parsing(true)
}

impl ManagerConfig {
    /// Load configuration from an optional file and `BHE_*` environment
    /// variables, environment taking precedence
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&path).required(true));
        }

        Self::from_builder(builder.add_source(environment()))
    }

    fn from_builder(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let config: Self = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the controller cannot run with
    pub fn validate(&self) -> Result<()> {
        self.thresholds()?;
        ExportSchedule::new(self.export_every_cycles)?;

        if self.cycle_interval_secs == 0 {
            anyhow::bail!("cycle_interval_secs must be at least 1");
        }
        if self.request_timeout_ms == 0 {
            anyhow::bail!("request_timeout_ms must be positive");
        }
        if self.topology_max_attempts == Some(0) {
            anyhow::bail!("topology_max_attempts must be at least 1 when set");
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Result<Thresholds> {
        let wake = self.wake_threshold.unwrap_or(self.sleep_threshold);
        Ok(Thresholds::new(self.sleep_threshold, wake)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_secs(self.topology_retry_secs),
            max_attempts: self.topology_max_attempts,
        }
    }

    pub fn loop_config(&self) -> Result<LoopConfig> {
        Ok(LoopConfig {
            interval: Duration::from_secs(self.cycle_interval_secs),
            thresholds: self.thresholds()?,
            policy: self.core_mesh_policy,
            energy: EnergyModel {
                cost_active_w: self.cost_active_w,
                cost_sleeping_w: self.cost_sleeping_w,
            },
            export_schedule: ExportSchedule::new(self.export_every_cycles)?,
            export_path: self.export_path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn from_toml(toml: &str) -> Result<ManagerConfig> {
        ManagerConfig::from_builder(
            config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
        )
    }

    #[test]
    fn test_defaults() {
        let config = from_toml("").unwrap();

        assert_eq!(config.api_port, 9100);
        assert_eq!(config.topology_url, "http://localhost:8080/topology");
        assert_eq!(config.cycle_interval_secs, 10);
        assert_eq!(config.export_every_cycles, 6);
        assert_eq!(config.request_timeout(), Duration::from_secs(2));
        assert_eq!(config.core_mesh_policy, CoreMeshPolicy::Verify);
        assert_eq!(config.retry_policy(), RetryPolicy::default());

        let thresholds = config.thresholds().unwrap();
        assert_eq!(thresholds.sleep, 0.10);
        assert_eq!(thresholds.wake, 0.10);
    }

    #[test]
    fn test_overrides() {
        let config = from_toml(
            r#"
            sleep_threshold = 0.05
            wake_threshold = 0.2
            core_mesh_policy = "assume_redundant"
            topology_max_attempts = 3
            forecast_replay_file = "dataset.csv"
            "#,
        )
        .unwrap();

        let loop_config = config.loop_config().unwrap();
        assert_eq!(loop_config.thresholds.wake, 0.2);
        assert_eq!(loop_config.policy, CoreMeshPolicy::AssumeRedundant);
        assert_eq!(config.retry_policy().max_attempts, Some(3));
        assert_eq!(config.forecast_replay_file, Some(PathBuf::from("dataset.csv")));
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(from_toml("sleep_threshold = 1.5").is_err());
        assert!(from_toml("sleep_threshold = 0.3\nwake_threshold = 0.1").is_err());
        assert!(from_toml("export_every_cycles = 0").is_err());
        assert!(from_toml("cycle_interval_secs = 0").is_err());
        assert!(from_toml("core_mesh_policy = \"sometimes\"").is_err());
    }

    #[test]
    fn test_environment_overrides_file() {
        let env: config::Map<String, String> = [
            ("BHE_API_PORT", "9300"),
            ("BHE_WAKE_THRESHOLD", "0.25"),
            ("BHE_CORE_MESH_POLICY", "assume_redundant"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = ManagerConfig::from_builder(
            config::Config::builder()
                .add_source(File::from_str(
                    "api_port = 9200\nsleep_threshold = 0.05\nexport_every_cycles = 3",
                    FileFormat::Toml,
                ))
                .add_source(environment().source(Some(env))),
        )
        .unwrap();

        assert_eq!(config.api_port, 9300);
        assert_eq!(config.export_every_cycles, 3);
        assert_eq!(config.core_mesh_policy, CoreMeshPolicy::AssumeRedundant);

        let thresholds = config.thresholds().unwrap();
        assert_eq!(thresholds.sleep, 0.05);
        assert_eq!(thresholds.wake, 0.25);
    }

    #[test]
    fn test_environment_values_are_validated() {
        let env: config::Map<String, String> = [("BHE_SLEEP_THRESHOLD".to_string(), "2.0".to_string())]
            .into_iter()
            .collect();

        let result = ManagerConfig::from_builder(
            config::Config::builder().add_source(environment().source(Some(env))),
        );

        assert!(result.is_err());
    }
}
