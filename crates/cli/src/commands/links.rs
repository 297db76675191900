//! Link state commands

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, LinkStatus, LinksResponse};
use crate::output::{color_status, format_utilization, print_json, print_table, OutputFormat};

/// Power state filter
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StateFilter {
    Active,
    Sleeping,
}

impl StateFilter {
    fn as_query(&self) -> &'static str {
        match self {
            StateFilter::Active => "active",
            StateFilter::Sleeping => "sleeping",
        }
    }
}

#[derive(Tabled)]
struct LinkRow {
    #[tabled(rename = "Link")]
    id: String,
    #[tabled(rename = "Endpoints")]
    endpoints: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Capacity")]
    capacity: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Utilization")]
    utilization: String,
    #[tabled(rename = "Group")]
    group: String,
}

impl From<&LinkStatus> for LinkRow {
    fn from(link: &LinkStatus) -> Self {
        Self {
            id: link.id.clone(),
            endpoints: format!(
                "{} ↔ {}",
                link.endpoints.0.label(),
                link.endpoints.1.label()
            ),
            kind: link.kind.clone(),
            capacity: format!("{} Gbps", link.capacity_gbps),
            state: color_status(&link.state),
            utilization: format_utilization(link.utilization),
            group: link.group.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Show per-link power state
pub async fn show_links(
    client: &ApiClient,
    state: Option<StateFilter>,
    format: OutputFormat,
) -> Result<()> {
    let path = match state {
        Some(filter) => format!("api/v1/links?state={}", filter.as_query()),
        None => "api/v1/links".to_string(),
    };

    let response: LinksResponse = client.get(&path).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            let rows: Vec<LinkRow> = response.links.iter().map(LinkRow::from).collect();
            print_table(&rows);
            println!();
            println!(
                "{} {} total, {} active, {} sleeping",
                "Links:".bold(),
                response.total,
                response.active.to_string().green(),
                response.sleeping.to_string().blue()
            );
        }
    }

    Ok(())
}
