//! Provider address harvesting.
//!
//! `collect` downloads the Beeline street and house tables; `geocode` turns a
//! provider's addresses into coordinates with resumable checkpoints.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use coverage_harvest::batch::{BatchProcessor, CsvProgressStore, Interrupt};
use coverage_harvest::config::{Config, API_KEY_ENV};
use coverage_harvest::geocoding::http_client;
use coverage_harvest::models::AddressRecord;
use coverage_harvest::pacing::{Clock, SystemClock};
use coverage_harvest::providers::beeline::{self, collect_all_houses, prepare_records};
use coverage_harvest::providers::{
    load_prepared, read_table, write_table, AddressFormatter, BeelineApi, BeelineHouse,
    BeelineSource, BeelineStreet,
};

#[derive(Parser, Debug)]
#[command(name = "harvest")]
#[command(about = "Collect and geocode provider addresses")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the Beeline street and house tables
    Collect {
        /// Directory for the raw tables
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Geocode one provider's addresses
    Geocode {
        /// Provider tag written into every record
        #[arg(long, default_value = beeline::PROVIDER)]
        provider: String,

        /// Prepared address table (street_id,street_name,house,sub_house,is_available)
        #[arg(long, conflicts_with_all = ["streets", "houses"])]
        input: Option<PathBuf>,

        /// Raw Beeline streets table
        #[arg(long, requires = "houses")]
        streets: Option<PathBuf>,

        /// Raw Beeline houses table
        #[arg(long, requires = "streets")]
        houses: Option<PathBuf>,

        /// Final output table
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
            )?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Collect { output_dir } => collect(&config, &output_dir).await,
        Command::Geocode {
            provider,
            input,
            streets,
            houses,
            output,
        } => {
            let records = match (input, streets, houses) {
                (Some(input), _, _) => {
                    load_prepared(&input, &provider, &AddressFormatter::from_config(&config.beeline))?
                }
                (None, Some(streets), Some(houses)) => {
                    let streets: Vec<BeelineStreet> = read_table(&streets)?;
                    let houses: Vec<BeelineHouse> = read_table(&houses)?;
                    let mut records = prepare_records(
                        &houses,
                        &streets,
                        &AddressFormatter::from_config(&config.beeline),
                    );
                    for record in &mut records {
                        record.provider = provider.clone();
                    }
                    records
                }
                _ => bail!("geocode needs --input or both --streets and --houses"),
            };
            geocode(&config, records, output).await
        }
    }
}

async fn collect(config: &Config, output_dir: &Path) -> Result<()> {
    let api = BeelineApi::new(&config.beeline).context("Failed to build Beeline client")?;
    let city = config.beeline.city_id;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    info!("Fetching streets for city {}...", city);
    let streets = api.fetch_streets().await.context("Failed to fetch streets")?;
    info!("Found {} streets", streets.len());
    write_table(&output_dir.join(format!("beeline_streets_city_{}.csv", city)), &streets)?;

    let pb = progress_bar(streets.len() as u64)?;
    let houses = collect_all_houses(
        &api,
        &streets,
        &SystemClock,
        config.beeline.street_delay(),
        &pb,
    )
    .await;
    pb.finish();
    write_table(&output_dir.join(format!("beeline_houses_city_{}.csv", city)), &houses)?;

    Ok(())
}

async fn geocode(config: &Config, records: Vec<AddressRecord>, output: PathBuf) -> Result<()> {
    if !config.geocoding.has_api_key() {
        bail!(
            "No geocoding API key configured; set [geocoding].api_key or {}",
            API_KEY_ENV
        );
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let client = http_client(&config.geocoding, clock)?;
    let store = CsvProgressStore::new(
        &config.batch.checkpoint_dir,
        &config.batch.checkpoint_prefix,
        output,
    )?;

    let interrupt = Interrupt::new();
    interrupt.listen_for_ctrl_c();

    info!("Geocoding {} addresses...", records.len());
    let processor = BatchProcessor::new(
        &client,
        store,
        config.batch.batch_size,
        config.geocoding.min_interval(),
    )
    .with_interrupt(interrupt)
    .with_progress(progress_bar(records.len() as u64)?);

    let outcome = processor.run(&records).await?;
    if outcome.completed {
        info!(
            "Done: {} of {} addresses geocoded",
            outcome.geocoded(),
            outcome.records.len()
        );
    } else {
        info!(
            "Stopped after {} of {} addresses; rerun to resume",
            outcome.records.len(),
            records.len()
        );
    }
    Ok(())
}
