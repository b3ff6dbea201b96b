//! # inagle CLI Application
//!
//! This module implements the command-line interface for the harvest and
//! ingest pipeline.
//!
//! ## Key Components
//!
//! - CLI argument parsing with clap
//! - Subcommands for the two record kinds:
//!   - `players`: list index, detail harvest, player upload
//!   - `special-moves`: category listings, special-move upload
//!   - `all`: both, players first
//!
//! Secrets and the endpoint base come from the environment (or a `.env`
//! file); every other setting has a flag.

mod telemetry;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use inagle::extract::SelectorLocator;
use inagle::harvest::snapshot::{PlayerSnapshot, SpecialMoveSnapshot, write_snapshot};
use inagle::harvest::{
    self, DEFAULT_BASE_URL, HarvestConfig, MoveNumbering, PlayerRecord, SpecialMoveRecord,
};
use inagle::http::HttpFetcher;
use inagle::ingest::{
    self, BatchProgress, BatchUploader, ConflictKey, Endpoint, HttpIngestTransport, IngestConfig,
    IngestConfigBuilder, PlayerSchema, UploadSummary,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, instrument};
use url::Url;

#[derive(Parser)]
#[command(author, version, about = "Harvest the character catalog and upsert it into the datastore", long_about = None)]
struct Cli {
    /// Also write logs to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Harvest players and upload them
    Players(PlayersArgs),

    /// Harvest special moves and upload them
    SpecialMoves(SpecialMovesArgs),

    /// Harvest and upload players, then special moves
    All(AllArgs),
}

#[derive(Args, Debug, Clone)]
struct HarvestArgs {
    /// Catalog root URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base: String,

    /// Rows per detail page
    #[arg(long, default_value = "200")]
    per_page: u32,

    /// Maximum pages per pagination loop
    #[arg(short = 'p', long, default_value = "999")]
    max_pages: u32,

    /// Consecutive empty pages before a loop stops
    #[arg(long, default_value = "5")]
    empty_stop: u32,

    /// Minimum milliseconds between page requests (0 disables pacing)
    #[arg(short, long, default_value = "0")]
    rate: u64,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Retries for transient fetch failures
    #[arg(long, default_value = "3")]
    retries: u32,
}

#[derive(Args, Debug, Clone)]
struct UploadArgs {
    /// Records per upload request (default: UPSERT_BATCH_SIZE or 200)
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Milliseconds to wait between upload requests
    #[arg(long, default_value = "500")]
    batch_delay: u64,

    /// Harvest and report without uploading
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct PlayersArgs {
    #[command(flatten)]
    harvest: HarvestArgs,

    #[command(flatten)]
    upload: UploadArgs,

    /// Player row layout sent to the endpoint (keyed|canonical)
    #[arg(long, default_value = "keyed")]
    player_schema: PlayerSchema,

    /// CSS selector of the catalog table on list pages
    #[arg(long)]
    table_selector: Option<String>,

    /// Write the harvested players to this JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SpecialMovesArgs {
    #[command(flatten)]
    harvest: HarvestArgs,

    #[command(flatten)]
    upload: UploadArgs,

    /// Number only emitted moves, without gaps
    #[arg(long)]
    renumber_moves: bool,

    /// Write the harvested special moves to this JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct AllArgs {
    #[command(flatten)]
    harvest: HarvestArgs,

    #[command(flatten)]
    upload: UploadArgs,

    /// Player row layout sent to the endpoint (keyed|canonical)
    #[arg(long, default_value = "keyed")]
    player_schema: PlayerSchema,

    /// CSS selector of the catalog table on list pages
    #[arg(long)]
    table_selector: Option<String>,

    /// Number only emitted moves, without gaps
    #[arg(long)]
    renumber_moves: bool,

    /// Write players.json and special_moves.json to this directory
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = telemetry::init_tracing_subscriber(cli.log_dir.as_deref())?;

    let summaries = match cli.command {
        Commands::Players(args) => {
            let ingest = ingest_config(&args.upload, &args.harvest)?;
            let config = harvest_config(&args.harvest, false)?;
            vec![
                players_command(
                    &config,
                    &ingest,
                    args.player_schema,
                    args.table_selector.as_deref(),
                    args.output.as_deref(),
                )
                .await?,
            ]
        }
        Commands::SpecialMoves(args) => {
            let ingest = ingest_config(&args.upload, &args.harvest)?;
            let config = harvest_config(&args.harvest, args.renumber_moves)?;
            vec![special_moves_command(&config, &ingest, args.output.as_deref()).await?]
        }
        Commands::All(args) => {
            let ingest = ingest_config(&args.upload, &args.harvest)?;
            let config = harvest_config(&args.harvest, args.renumber_moves)?;
            let players_output = args.output.as_ref().map(|dir| dir.join("players.json"));
            let moves_output = args.output.as_ref().map(|dir| dir.join("special_moves.json"));
            vec![
                players_command(
                    &config,
                    &ingest,
                    args.player_schema,
                    args.table_selector.as_deref(),
                    players_output.as_deref(),
                )
                .await?,
                special_moves_command(&config, &ingest, moves_output.as_deref()).await?,
            ]
        }
    };

    let failed = summaries
        .iter()
        .flatten()
        .any(UploadSummary::is_total_failure);
    if failed {
        eprintln!("Every upload batch failed; nothing was written");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn harvest_config(args: &HarvestArgs, renumber_moves: bool) -> anyhow::Result<HarvestConfig> {
    let numbering = if renumber_moves {
        MoveNumbering::EmittedOnly
    } else {
        MoveNumbering::CountAll
    };
    let config = HarvestConfig::builder()
        .base_url(Url::parse(&args.base)?)
        .per_page(args.per_page)
        .max_pages(args.max_pages)
        .empty_stop(args.empty_stop)
        .rate_limit_ms(args.rate)
        .request_timeout(Duration::from_secs(args.timeout))
        .max_retries(args.retries)
        .move_numbering(numbering)
        .build()?;
    Ok(config)
}

fn ingest_config(upload: &UploadArgs, harvest: &HarvestArgs) -> anyhow::Result<IngestConfig> {
    let mut builder = IngestConfigBuilder::from_env()
        .batch_delay(Duration::from_millis(upload.batch_delay))
        .request_timeout(Duration::from_secs(harvest.timeout))
        .dry_run(upload.dry_run);
    if let Some(batch_size) = upload.batch_size {
        builder = builder.batch_size(batch_size);
    }
    Ok(builder.build()?)
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(message);
    spinner
}

#[instrument(skip(config, ingest))]
async fn players_command(
    config: &HarvestConfig,
    ingest: &IngestConfig,
    schema: PlayerSchema,
    table_selector: Option<&str>,
    output: Option<&Path>,
) -> anyhow::Result<Option<UploadSummary>> {
    let fetcher = HttpFetcher::new(config)?;

    let progress = spinner("Building list index...");
    let index = match table_selector {
        Some(selector) => {
            let locator = SelectorLocator::parse(selector)?;
            harvest::build_index_with(&fetcher, config, &locator).await?
        }
        None => harvest::build_index(&fetcher, config).await?,
    };
    progress.set_message("Harvesting detail pages...");
    let outcome = harvest::harvest_players(&fetcher, config, &index).await?;
    progress.finish_and_clear();

    println!(
        "Indexed {} list entries; harvested {} players ({} unresolved, {} skipped)",
        index.len(),
        outcome.players.len(),
        outcome.unresolved.len(),
        outcome.skipped.total()
    );
    for row in &outcome.unresolved {
        println!(
            "  unresolved: page {} {} (key: {})",
            row.page,
            row.name,
            row.join_key.as_deref().unwrap_or("-")
        );
    }

    if let Some(path) = output {
        save_players(path, &outcome.players).await?;
    }
    if ingest.dry_run {
        println!("Dry run: skipping upload of {} players", outcome.players.len());
        return Ok(None);
    }

    let payloads = ingest::player_payloads(&outcome.players, schema);
    let summary = upload_with_progress(ingest, Endpoint::Players, payloads).await?;
    Ok(Some(summary))
}

#[instrument(skip(config, ingest))]
async fn special_moves_command(
    config: &HarvestConfig,
    ingest: &IngestConfig,
    output: Option<&Path>,
) -> anyhow::Result<Option<UploadSummary>> {
    let fetcher = HttpFetcher::new(config)?;

    let progress = spinner("Harvesting special moves...");
    let moves = harvest::harvest_special_moves(&fetcher, config).await?;
    progress.finish_and_clear();

    println!("Harvested {} special moves", moves.len());

    if let Some(path) = output {
        save_special_moves(path, &moves).await?;
    }
    if ingest.dry_run {
        println!("Dry run: skipping upload of {} special moves", moves.len());
        return Ok(None);
    }

    let payloads = ingest::special_move_payloads(&moves);
    let summary = upload_with_progress(ingest, Endpoint::SpecialMoves, payloads).await?;
    Ok(Some(summary))
}

async fn save_players(path: &Path, players: &[PlayerRecord]) -> anyhow::Result<()> {
    write_snapshot(path, &PlayerSnapshot::new(players.to_vec())).await?;
    println!("Saved {} players to {}", players.len(), path.display());
    Ok(())
}

async fn save_special_moves(path: &Path, moves: &[SpecialMoveRecord]) -> anyhow::Result<()> {
    write_snapshot(path, &SpecialMoveSnapshot::new(moves.to_vec())).await?;
    println!("Saved {} special moves to {}", moves.len(), path.display());
    Ok(())
}

async fn upload_with_progress<P: Serialize + ConflictKey + Sync>(
    ingest: &IngestConfig,
    endpoint: Endpoint,
    payloads: Vec<P>,
) -> anyhow::Result<UploadSummary> {
    let uploader = BatchUploader::new(HttpIngestTransport::new(ingest)?, ingest);

    // Create a channel for progress updates
    let (progress_sender, mut progress_receiver) = mpsc::channel::<BatchProgress>(100);

    let progress_bar = ProgressBar::new(payloads.len().div_ceil(ingest.batch_size) as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} batches {msg}")
            .unwrap()
            .progress_chars("##-"),
    );
    progress_bar.set_message(format!("Uploading to {}...", endpoint.path()));

    let progress_handle = tokio::spawn({
        let progress_bar = progress_bar.clone();
        async move {
            let mut failed = 0;
            while let Some(update) = progress_receiver.recv().await {
                progress_bar.set_length(update.total_batches as u64);
                progress_bar.inc(1);
                if !update.succeeded {
                    failed += 1;
                }
                progress_bar.set_message(format!("{} failed", failed));
            }
            progress_bar.finish();
        }
    });

    let summary = uploader
        .upload(endpoint, payloads, Some(progress_sender))
        .await;

    // The progress task ends once the sender is dropped
    let _ = progress_handle.await;

    info!("{} summary: {:?}", endpoint.path(), summary);
    println!(
        "{}: {} records in {} batches, {} upserted, {} invalid, {} failed batches, {} duplicates dropped",
        endpoint.path(),
        summary.total_records,
        summary.total_batches,
        summary.total_upserted,
        summary.total_invalid,
        summary.failed_batches,
        summary.duplicates
    );
    Ok(summary)
}
