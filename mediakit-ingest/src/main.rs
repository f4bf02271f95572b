//! mediakit-ingest - media asset ingest worker
//!
//! Scans the given files and directories, runs the standard processor chain
//! over every supported file, stores proxies under `<output>/proxies` and
//! appends indexed documents to `<output>/index.jsonl`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use mediakit_common::config::{load_toml_config, RootFolderResolver};
use mediakit_common::events::{EventBus, IngestEvent};
use mediakit_ingest::config::IngestConfig;
use mediakit_ingest::storage::{FsObjectStore, JsonLinesIndex};
use mediakit_ingest::workflow::{standard_pipeline, DirectoryScanner, Worker};
use mediakit_ingest::ModelResources;

const MODULE_NAME: &str = "ingest";

#[derive(Debug, Parser)]
#[command(name = "mediakit-ingest", version, about = "Ingest and enrich media assets")]
struct Cli {
    /// Configuration file (default: <config_dir>/mediakit/ingest.toml)
    #[arg(long, env = "MEDIAKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Model-resource root (classifier weights, cascades, palettes)
    #[arg(long)]
    model_root: Option<PathBuf>,

    /// Output directory for proxies and the search index
    #[arg(long)]
    output: Option<PathBuf>,

    /// Documents processed in parallel
    #[arg(long)]
    concurrency: Option<usize>,

    /// Files or directories to ingest
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolver = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(cli.model_root.clone())
        .with_config_path(cli.config.clone());
    let config_path = resolver.config_path();

    let toml_config = match &config_path {
        Some(path) => load_toml_config(path).context("Failed to load configuration")?,
        None => Default::default(),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &toml_config.logging.level;
        EnvFilter::new(format!("mediakit_ingest={level},mediakit_common={level}"))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting mediakit-ingest {}", env!("CARGO_PKG_VERSION"));

    let mut config = match &config_path {
        Some(path) => IngestConfig::load(path).context("Invalid [ingest] configuration")?,
        None => IngestConfig::default(),
    };
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency.max(1);
    }

    let resources = ModelResources::new(resolver.resolve());
    let output = config.output_dir_or(cli.output.clone());
    std::fs::create_dir_all(&output)
        .with_context(|| format!("Failed to create output directory {}", output.display()))?;

    let store = Arc::new(FsObjectStore::new(
        output.join("proxies"),
        config.proxy_base_uri.clone(),
    ));
    let index = Arc::new(
        JsonLinesIndex::open(output.join("index.jsonl")).context("Failed to open search index")?,
    );

    let events = EventBus::new(256);
    let mut rx = events.subscribe();
    let event_log = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(IngestEvent::DocumentFailed {
                    path,
                    processor,
                    message,
                    ..
                }) => warn!(path = %path, processor = %processor, "{}", message),
                Ok(event) => debug!(?event, "Ingest event"),
                Err(RecvError::Lagged(missed)) => debug!(missed, "Event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // No classifier backend is built into the binary
    let pipeline = standard_pipeline(&config, store, None)
        .context("Failed to assemble processor chain")?
        .with_events(events)
        .build(&resources)
        .context("Processor initialization failed")?;

    let worker = Worker::new(Arc::new(pipeline), index, config.concurrency);
    let scanner = DirectoryScanner::new(cli.inputs);
    let summary = worker.run(&scanner).await.context("Input scan failed")?;

    // Dropping the worker drops the last EventBus sender and ends the log task
    drop(worker);
    let _ = event_log.await;

    info!(
        tried = summary.tried,
        completed = summary.completed,
        skipped = summary.skipped,
        errors = summary.errors,
        warnings = summary.warnings,
        output = %output.display(),
        "Ingest finished"
    );
    Ok(())
}
