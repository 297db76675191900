//! Manager health commands

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::client::{ApiClient, HealthResponse, ReadinessResponse};
use crate::output::{color_status, print_json, print_table, OutputFormat};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Serialize)]
struct HealthReport<'a> {
    health: &'a HealthResponse,
    readiness: &'a ReadinessResponse,
}

/// Show component health and readiness
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: HealthResponse = client.get_status("healthz").await?;
    let readiness: ReadinessResponse = client.get_status("readyz").await?;

    match format {
        OutputFormat::Json => print_json(&HealthReport {
            health: &health,
            readiness: &readiness,
        })?,
        OutputFormat::Table => {
            let ready = if readiness.ready { "ready" } else { "not ready" };
            println!(
                "{} {}   {} {}",
                "Status:".bold(),
                color_status(&health.status),
                "Readiness:".bold(),
                color_status(ready)
            );
            if let Some(reason) = &readiness.reason {
                println!("{}", reason.dimmed());
            }
            println!();

            let rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| ComponentRow {
                    name: name.clone(),
                    status: color_status(&component.status),
                    message: component.message.clone().unwrap_or_default(),
                })
                .collect();
            print_table(&rows);
        }
    }

    Ok(())
}
