//! Checker - one-shot discovery and check runner
//!
//! Reads the output of a monitoring agent for one host, parses its
//! sections and either discovers services or checks them. Counter state
//! is kept in a value store file between invocations; `check` exits with
//! the code of the worst service state.

mod config;
mod output;

use anyhow::{Context, Result};
use check_lib::agent_output::parse_agent_output;
use check_lib::{
    worst_state, BaselinePredictor, Engine, EngineMetrics, FileValueStore, Registry, Service,
    ServiceOutcome, ServiceReport, State,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use output::{color_state, format_metric, print_info, print_json, print_success, print_table, print_warning, OutputFormat};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tabled::Tabled;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Check engine command line
#[derive(Parser)]
#[command(name = "checker")]
#[command(author, version, about = "Discover and check services from agent output", long_about = None)]
pub struct Cli {
    /// Configuration file (json, toml or yaml)
    #[arg(long, short, env = "CHECKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Host name, overrides the configuration
    #[arg(long)]
    pub host: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: OutputFormat,

    /// Log as JSON lines on stderr
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show which agent sections are parsed, absent or superseded
    Sections {
        /// Agent output file, `-` for stdin
        input: PathBuf,
    },

    /// Discover services
    Discover {
        /// Agent output file, `-` for stdin
        input: PathBuf,

        /// Also write the services as JSON to this file
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Check services
    Check {
        /// Agent output file, `-` for stdin
        input: PathBuf,

        /// Services written by `discover --output`; discovered on the fly if omitted
        #[arg(long)]
        services: Option<PathBuf>,

        /// Value store file, overrides the configuration
        #[arg(long)]
        state_file: Option<PathBuf>,

        /// Evaluation time in seconds since the epoch (default: now)
        #[arg(long)]
        now: Option<f64>,

        /// Only check services whose check name or description matches
        #[arg(long)]
        service: Option<String>,

        /// Print engine metrics in Prometheus text format afterwards
        #[arg(long)]
        dump_metrics: bool,
    },
}

/// Row for sections table
#[derive(Tabled, Serialize)]
struct SectionRow {
    #[tabled(rename = "Section")]
    section: String,
    #[tabled(rename = "Parsed as")]
    parsed_as: String,
    #[tabled(rename = "Rows")]
    rows: usize,
    #[tabled(rename = "Status")]
    status: String,
}

/// Row for services table
#[derive(Tabled, Serialize)]
struct ServiceRow {
    #[tabled(rename = "Check")]
    check: String,
    #[tabled(rename = "Item")]
    item: String,
    #[tabled(rename = "Service")]
    description: String,
    #[tabled(rename = "Parameters")]
    parameters: String,
}

/// Row for check results table
#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Summary")]
    summary: String,
    #[tabled(rename = "Metrics")]
    metrics: String,
}

/// One service in JSON check output
#[derive(Serialize)]
struct ReportJson<'a> {
    service: &'a Service,
    state: Option<State>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<&'a ServiceOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read agent output from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read agent output from {}", path.display()))
}

fn current_time() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

fn show_sections(registry: &Registry, engine: &Engine<'_>, input: &Path, format: OutputFormat) -> Result<()> {
    let raw = parse_agent_output(&read_input(input)?);
    let parsed = engine.parse_sections(&raw);
    let effective: BTreeSet<&str> = registry
        .effective_sections(raw.keys().map(String::as_str))
        .into_iter()
        .map(|plugin| plugin.name)
        .collect();

    let rows: Vec<SectionRow> = raw
        .iter()
        .map(|(name, table)| {
            let (parsed_as, status) = match registry.section(name) {
                None => (String::new(), "unregistered"),
                Some(plugin) if !effective.contains(plugin.name) => {
                    (plugin.parsed_section_name.to_string(), "superseded")
                }
                Some(plugin) if parsed.get(plugin.parsed_section_name).is_some() => {
                    (plugin.parsed_section_name.to_string(), "parsed")
                }
                Some(plugin) => (plugin.parsed_section_name.to_string(), "absent"),
            };
            SectionRow {
                section: name.clone(),
                parsed_as,
                rows: table.len(),
                status: status.to_string(),
            }
        })
        .collect();

    print_table(&rows, format);
    Ok(())
}

fn discover(engine: &Engine<'_>, input: &Path, output: Option<&Path>, format: OutputFormat) -> Result<()> {
    let parsed = engine.parse_sections(&parse_agent_output(&read_input(input)?));
    let services = engine.discover(&parsed)?;

    match format {
        OutputFormat::Json => print_json(&services),
        OutputFormat::Table => {
            let rows: Vec<ServiceRow> = services
                .iter()
                .map(|service| ServiceRow {
                    check: service.check_name.clone(),
                    item: service.item.clone().unwrap_or_default(),
                    description: service.description.clone(),
                    parameters: service.parameters.to_string(),
                })
                .collect();
            print_table(&rows, format);
            println!("\nTotal: {} services", services.len());
        }
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&services).context("Failed to serialize services")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write services to {}", path.display()))?;
        if matches!(format, OutputFormat::Table) {
            print_success(&format!("Wrote {} services to {}", services.len(), path.display()));
        }
    }
    Ok(())
}

fn load_services(path: &Path) -> Result<Vec<Service>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read services from {}", path.display()))?;
    serde_json::from_str(&content).context("Failed to parse services file")
}

fn print_reports(reports: &[ServiceReport], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let entries: Vec<ReportJson<'_>> = reports
                .iter()
                .map(|report| match &report.outcome {
                    Ok(outcome) => ReportJson {
                        service: &report.service,
                        state: outcome.state(),
                        outcome: Some(outcome),
                        error: None,
                    },
                    Err(e) => ReportJson {
                        service: &report.service,
                        state: Some(State::Unknown),
                        outcome: None,
                        error: Some(e.to_string()),
                    },
                })
                .collect();
            print_json(&entries);
        }
        OutputFormat::Table => {
            if reports.is_empty() {
                print_warning("No services to check");
                return;
            }
            let rows: Vec<ResultRow> = reports
                .iter()
                .map(|report| {
                    let (state, summary, metrics) = match &report.outcome {
                        Ok(ServiceOutcome::Checked { state, summary, metrics, .. }) => (
                            color_state(*state),
                            summary.clone(),
                            metrics.iter().map(format_metric).collect::<Vec<_>>().join(" "),
                        ),
                        Ok(outcome @ ServiceOutcome::NoData) => {
                            (color_state(State::Unknown), outcome.summary().to_string(), String::new())
                        }
                        Ok(ServiceOutcome::Pending { reason }) => {
                            ("PENDING".dimmed().to_string(), reason.clone(), String::new())
                        }
                        Err(e) => (color_state(State::Unknown), format!("Check failed: {}", e), String::new()),
                    };
                    ResultRow {
                        state,
                        service: report.service.description.clone(),
                        summary,
                        metrics,
                    }
                })
                .collect();
            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn check(
    engine: &Engine<'_>,
    input: &Path,
    services_file: Option<&Path>,
    state_file: &Path,
    now: f64,
    filter: Option<&str>,
    dump_metrics: bool,
    format: OutputFormat,
) -> Result<State> {
    let parsed = engine.parse_sections(&parse_agent_output(&read_input(input)?));
    let mut services = match services_file {
        Some(path) => load_services(path)?,
        None => engine.discover(&parsed)?,
    };
    if let Some(filter) = filter {
        services.retain(|s| s.check_name == filter || s.description == filter);
    }
    debug!(services = services.len(), now, "Checking services");

    let mut store = FileValueStore::open(state_file)?;
    let reports = engine.check_all(&parsed, &services, &mut store, now);
    store.flush()?;

    print_reports(&reports, format);
    if dump_metrics {
        println!("{}", EngineMetrics::new().render());
    }

    let pending = reports
        .iter()
        .filter(|r| matches!(r.outcome, Ok(ServiceOutcome::Pending { .. })))
        .count();
    if pending > 0 && matches!(format, OutputFormat::Table) {
        print_info(&format!("{} services need another run to compute rates", pending));
    }

    Ok(worst_state(&reports))
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = config::CheckerConfig::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.host_name = host;
    }
    info!(host = %config.host_name, "Checker configured");

    let registry = Registry::builtin().context("Failed to build plugin registry")?;
    let mut engine = Engine::new(&registry, config.host_name.as_str())
        .with_rules(config.rules.clone())
        .with_discovery_rules(config.discovery_rules.clone());
    if !config.baselines.is_empty() {
        let predictor = BaselinePredictor::new(config.baselines.clone().into_iter().collect());
        engine = engine.with_predictor(Arc::new(predictor));
    }

    match cli.command {
        Commands::Sections { input } => {
            show_sections(&registry, &engine, &input, cli.format)?;
        }
        Commands::Discover { input, output } => {
            discover(&engine, &input, output.as_deref(), cli.format)?;
        }
        Commands::Check {
            input,
            services,
            state_file,
            now,
            service,
            dump_metrics,
        } => {
            let state_file = state_file.unwrap_or_else(|| config.value_store_path.clone());
            let state = check(
                &engine,
                &input,
                services.as_deref(),
                &state_file,
                now.unwrap_or_else(current_time),
                service.as_deref(),
                dump_metrics,
                cli.format,
            )?;
            return Ok(ExitCode::from(state.code() as u8));
        }
    }

    Ok(ExitCode::SUCCESS)
}
