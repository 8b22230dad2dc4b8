//! Telecom location crawler.
//!
//! Walks region → district → town → street, optionally geocodes every node,
//! and writes the flat, hierarchical and tree exports.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use coverage_harvest::config::Config;
use coverage_harvest::geocoding::http_client;
use coverage_harvest::hierarchy::{
    attach_coordinates, export, CrawlDelays, HierarchyCrawler, TelecomApi,
};
use coverage_harvest::models::NodeType;
use coverage_harvest::pacing::{Clock, SystemClock};

#[derive(Parser, Debug)]
#[command(name = "crawl")]
#[command(about = "Crawl the telecom location hierarchy")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the exports
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Base name of the exported files
    #[arg(long, default_value = "telecom_locations")]
    name: String,

    /// Resolve coordinates for every node (needs an API key)
    #[arg(long)]
    geocode: bool,

    /// Skip the courtesy delays between subtrees
    #[arg(long)]
    no_delay: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    info!("Telecom hierarchy crawl");
    info!("Source: {}", config.telecom.base_url);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let delays = if args.no_delay {
        CrawlDelays::none()
    } else {
        CrawlDelays::from_config(&config.telecom)
    };
    let source = TelecomApi::new(&config.telecom).context("Failed to build telecom client")?;
    let crawler = HierarchyCrawler::new(source, clock.clone(), delays);

    let started = Utc::now();
    let mut report = crawler.crawl().await;

    info!(
        "Crawled {} nodes in {}s: {} regions, {} districts, {} towns, {} streets",
        report.nodes.len(),
        (Utc::now() - started).num_seconds(),
        report.count(NodeType::Region),
        report.count(NodeType::District),
        report.count(NodeType::Town),
        report.count(NodeType::Street),
    );
    for gap in &report.gaps {
        warn!(
            "Missing {} listing under {:?}: {}",
            gap.level, gap.parent_id, gap.reason
        );
    }

    if args.geocode {
        if !config.geocoding.has_api_key() {
            anyhow::bail!("--geocode needs an API key in the config or the environment");
        }
        let client = http_client(&config.geocoding, clock.clone())?;
        let pb = ProgressBar::new(report.nodes.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
                )?
                .progress_chars("#>-"),
        );
        attach_coordinates(
            &mut report.nodes,
            &client,
            config.geocoding.min_interval(),
            &pb,
        )
        .await;
        pb.finish();
    }

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;
    let out = |suffix: &str| args.output_dir.join(format!("{}{}", args.name, suffix));

    export::write_nodes_csv(&report.nodes, &out(".csv"))?;
    export::write_nodes_json(&report.nodes, &out(".json"))?;
    export::write_hierarchy_csv(&report.nodes, &out("_hierarchy.csv"))?;
    export::write_tree(&report.nodes, &out("_tree.txt"))?;

    if report.gaps.is_empty() {
        info!("Crawl complete");
    } else {
        warn!("Crawl complete with {} missing subtrees", report.gaps.len());
    }
    Ok(())
}
