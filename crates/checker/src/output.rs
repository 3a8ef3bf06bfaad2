//! Output formatting utilities

use check_lib::{Metric, State};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for checker commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => print_json(&items),
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    if let Ok(json) = serde_json::to_string_pretty(value) {
        println!("{}", json);
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Color a state name
pub fn color_state(state: State) -> String {
    let name = state.to_string();
    match state {
        State::Ok => name.green().to_string(),
        State::Warn => name.yellow().to_string(),
        State::Crit => name.red().bold().to_string(),
        State::Unknown => name.magenta().to_string(),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Metric in performance data notation: `name=value;warn;crit;min;max`
pub fn format_metric(metric: &Metric) -> String {
    let (warn, crit) = metric
        .levels
        .map(|(warn, crit)| (format_number(warn), format_number(crit)))
        .unwrap_or_default();
    let (min, max) = metric
        .boundaries
        .map(|(min, max)| (format_number(min), format_number(max)))
        .unwrap_or_default();
    let perfdata = format!(
        "{}={};{};{};{};{}",
        metric.name,
        format_number(metric.value),
        warn,
        crit,
        min,
        max
    );
    perfdata.trim_end_matches(';').to_string()
}
