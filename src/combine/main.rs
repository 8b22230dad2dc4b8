//! Dataset merger.
//!
//! Combines per-provider geocoded tables into one deduplicated CSV and the
//! map JSON.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use coverage_harvest::config::Config;
use coverage_harvest::merge::{write_map_json, DatasetMerger, ProviderTable};

#[derive(Parser, Debug)]
#[command(name = "combine")]
#[command(about = "Merge provider coverage tables")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Provider table as PROVIDER=PATH; repeat for each provider
    #[arg(short, long = "input", value_parser = parse_input, required = true)]
    inputs: Vec<(String, PathBuf)>,

    /// Combined CSV output
    #[arg(long, default_value = "combined_data.csv")]
    output: PathBuf,

    /// Map JSON output
    #[arg(long, default_value = "map_data.json")]
    map: PathBuf,

    /// Override the configured provider priority (comma separated)
    #[arg(long, value_delimiter = ',')]
    priority: Option<Vec<String>>,
}

fn parse_input(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((provider, path)) if !provider.is_empty() && !path.is_empty() => {
            Ok((provider.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected PROVIDER=PATH, got '{}'", raw)),
    }
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(priority) = args.priority {
        config.merge.provider_priority = priority;
    }

    let mut tables = Vec::new();
    for (provider, path) in &args.inputs {
        if !path.exists() {
            warn!("Skipping {}: {} not found", provider, path.display());
            continue;
        }
        tables.push(ProviderTable::read_csv(path, provider)?);
    }
    if tables.is_empty() {
        bail!("No input tables could be loaded");
    }

    let merger = DatasetMerger::from_config(&config.merge);
    let (combined, report) = merger.merge(tables);

    combined.write_csv(&args.output)?;
    let points = write_map_json(&combined, &args.map)?;

    info!(
        "Combined {} input rows into {} locations ({} map points)",
        report.input_rows, report.output_rows, points
    );
    Ok(())
}
