//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a rounded table
pub fn print_table<T: Tabled>(rows: &[T]) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    println!("{}", Table::new(rows).with(Style::rounded()));
}

/// Print any response as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Format a utilization ratio as a percentage
pub fn format_utilization(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Format abstract watts with a kilo suffix above 10 000
pub fn format_watts(watts: u64) -> String {
    if watts >= 10_000 {
        format!("{:.1} kW", watts as f64 / 1000.0)
    } else {
        format!("{} W", watts)
    }
}

/// Color link and component states
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "active" | "healthy" | "ready" => status.green().to_string(),
        "sleeping" => status.blue().to_string(),
        "degraded" => status.yellow().to_string(),
        "unhealthy" | "not ready" => status.red().to_string(),
        _ => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_utilization() {
        assert_eq!(format_utilization(0.05), "5.0%");
        assert_eq!(format_utilization(1.0), "100.0%");
    }

    #[test]
    fn test_format_watts() {
        assert_eq!(format_watts(3090), "3090 W");
        assert_eq!(format_watts(18540), "18.5 kW");
    }
}
