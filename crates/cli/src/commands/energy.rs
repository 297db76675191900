//! Energy accounting commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, EnergyStatus, MetricsSample};
use crate::output::{format_watts, print_json, print_table, print_warning, OutputFormat};

#[derive(Tabled)]
struct SampleRow {
    #[tabled(rename = "Hour")]
    cycle: u64,
    #[tabled(rename = "Energy")]
    energy: String,
    #[tabled(rename = "Active")]
    active: usize,
    #[tabled(rename = "Sleeping")]
    sleeping: usize,
}

impl From<&MetricsSample> for SampleRow {
    fn from(sample: &MetricsSample) -> Self {
        Self {
            cycle: sample.cycle,
            energy: format_watts(sample.energy_w),
            active: sample.active_links,
            sleeping: sample.sleeping_links,
        }
    }
}

/// Show the latest energy sample and recent history
pub async fn show_energy(client: &ApiClient, last: usize, format: OutputFormat) -> Result<()> {
    let status: EnergyStatus = client
        .get(&format!("api/v1/energy?last={}", last))
        .await?;

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => {
            println!("{}", "Energy".bold());
            println!("{}", "=".repeat(50));

            let latest = match &status.latest {
                Some(latest) => latest,
                None => {
                    print_warning("No cycles recorded yet");
                    return Ok(());
                }
            };

            println!("Cycle:                  {}", status.cycle);
            println!(
                "Current:                {}",
                format_watts(latest.energy_w).cyan()
            );
            println!(
                "Links:                  {} active, {} sleeping",
                latest.active_links.to_string().green(),
                latest.sleeping_links.to_string().blue()
            );
            println!(
                "Total ({} cycles):     {}",
                status.recorded,
                format_watts(status.total_energy_w)
            );
            println!();

            let rows: Vec<SampleRow> = status.recent.iter().map(SampleRow::from).collect();
            print_table(&rows);
        }
    }

    Ok(())
}
