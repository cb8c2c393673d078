//! Anime theme scraper.
//!
//! Runs the ingestion cycle forever, or once with `--once`.

use anyhow::{Context, Result};
use clap::Parser;
use shared::{Catalog, Config, Database, DiskSpaceGuard, StoragePaths};
use std::path::PathBuf;
use theme_scraper::api::{JikanClient, RedditWiki};
use theme_scraper::{Downloader, Extractor, FfmpegTranscoder, Pipeline, Processor, Reconciler};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Initialize logging
    let mut log_config = shared::LogConfig::from_config(&config, "theme-scraper");
    if args.verbose {
        log_config.default_level = tracing::Level::DEBUG;
    }
    shared::logging::init(log_config)?;

    info!("Theme scraper starting");
    info!(config_file = %args.config.display(), "Loaded configuration");

    // Initialize storage
    let paths = StoragePaths::from_config(&config);
    paths
        .create_dirs()
        .context("Failed to create data directories")?;

    // Initialize catalog
    let db_path = config.database_path();
    info!(db_path = %db_path.display(), "Opening database");
    let database = Database::open(&db_path).context("Failed to open database")?;
    let catalog = Catalog::new(database);

    let stats = catalog.stats()?;
    info!(anime = stats.anime, themes = stats.themes, "Catalog loaded");

    let reconciler = Reconciler::new(catalog.clone(), paths.clone(), &config.media.base_url);

    let extractor = Extractor::new(
        catalog.clone(),
        Box::new(RedditWiki::from_config(&config.wiki)?),
        Box::new(JikanClient::from_config(&config.jikan)?),
        &config.wiki.index_page,
        &config.media.base_url,
        config.jikan_cooldown(),
    );

    let processor = Processor::new(
        catalog,
        paths.clone(),
        DiskSpaceGuard::new(paths.themes_dir(), config.min_free_bytes(), config.disk_pause()),
        Downloader::from_config(&config.media)?,
        Box::new(FfmpegTranscoder::new(&config.media.audio_bitrate)),
        config.transcode_timeout(),
    );

    let mut pipeline = Pipeline::new(reconciler, extractor, processor);

    loop {
        pipeline.run_cycle().await?;

        if args.once {
            break;
        }

        let interval = config.cycle_interval();
        info!(wait_secs = interval.as_secs(), "Waiting for next cycle");
        tokio::time::sleep(interval).await;
    }

    info!("Theme scraper finished");
    Ok(())
}
