//! Search cluster indexer
//!
//! Reads block commit events from an NDJSON file, one block per line, and
//! indexes them into Elasticsearch / OpenSearch.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use es_indexer::core::types::{OutportBlock, RoundInfo};
use es_indexer::core::TemplatesAndPoliciesReader;
use es_indexer::templates::{BuiltinTemplatesReader, FileTemplatesReader};
use es_indexer::{ArgsElasticProcessor, ElasticClient, ElasticProcessor, InMemoryAccounts, IndexerConfig, StatusMetrics};

#[derive(Parser)]
#[command(name = "es-indexer")]
#[command(about = "Index chain blocks into Elasticsearch / OpenSearch")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "indexer.toml")]
    config: String,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,

    /// Dry run mode (validate config and exit)
    #[arg(long)]
    dry_run: bool,

    /// Create policies, templates, indices and aliases, then exit
    #[arg(long)]
    init_only: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// NDJSON file with one block per line
    #[arg(long)]
    blocks: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_missing = !Path::new(&cli.config).exists();
    let mut config = if config_missing {
        IndexerConfig::from_env()?
    } else {
        IndexerConfig::from_file(&cli.config)?
    };

    // Override log level if provided
    if let Some(log_level) = cli.log_level {
        config.monitoring.log_level = log_level;
    }

    if cli.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    init_logging(&config);
    if config_missing {
        warn!("Config file not found, using defaults: {}", cli.config);
    }

    info!("Starting indexer");
    info!("Cluster: {}", config.elastic.url);
    info!("Enabled indices: {}", config.indexer.enabled_indices.join(","));

    config.validate()?;
    info!("Configuration validated successfully");

    if cli.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    let metrics = Arc::new(StatusMetrics::new()?);
    let accounts = Arc::new(InMemoryAccounts::new());
    let templates: Arc<dyn TemplatesAndPoliciesReader> = match &config.indexer.templates_path {
        Some(path) => Arc::new(FileTemplatesReader::new(path)),
        None => Arc::new(BuiltinTemplatesReader::new(config.indexer.use_kibana)),
    };

    let processor = ElasticProcessor::new(ArgsElasticProcessor {
        client: Some(Arc::new(ElasticClient::new(&config.elastic, metrics.clone()))),
        accounts: Some(accounts.clone()),
        templates: Some(templates),
        enabled_indices: config.indexer.enabled_indices.clone(),
        denomination: config.indexer.denomination,
        bulk_request_max_size: config.elastic.bulk_request_max_size,
        use_kibana: config.indexer.use_kibana,
        with_scroll_on_tokens: config.indexer.with_scroll_on_tokens,
    })?;

    let init = tokio::task::spawn_blocking(move || processor.init().map(|_| processor)).await?;
    let processor = init.context("cannot initialize the indices")?;
    info!("Indices initialized");

    if cli.init_only {
        return Ok(());
    }

    let Some(blocks) = cli.blocks else {
        warn!("No blocks file provided, nothing to index");
        return Ok(());
    };

    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = stop.clone();
    let worker = tokio::task::spawn_blocking(move || index_blocks(&blocks, &processor, &accounts, &worker_stop));

    info!("Indexer started successfully. Press Ctrl+C to shutdown.");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
            stop.store(true, Ordering::SeqCst);
        }
        result = worker => {
            match result {
                Ok(Ok(count)) => info!("Indexed {} blocks", count),
                Ok(Err(e)) => error!("Indexing failed: {:#}", e),
                Err(e) => error!("Indexing task error: {}", e),
            }
        }
    }

    for (topic, values) in metrics.get_metrics() {
        debug!(
            "{}: {} requests, {} errors, {} bytes, {} ms",
            topic, values.operations_count, values.errors_count, values.total_data, values.total_time_ms
        );
    }

    info!("Shutting down indexer");
    Ok(())
}

/// Index every block of the file until the end or until `stop` is raised
fn index_blocks(path: &Path, processor: &ElasticProcessor, accounts: &InMemoryAccounts, stop: &AtomicBool) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;

    let mut count = 0;
    for (number, line) in BufReader::new(file).lines().enumerate() {
        if stop.load(Ordering::SeqCst) {
            break;
        }

        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let outport: OutportBlock =
            serde_json::from_str(&line).with_context(|| format!("invalid block on line {}", number + 1))?;

        accounts.replace(&outport.accounts)?;
        processor.save_header(&outport)?;
        processor.save_miniblocks(&outport)?;
        processor.save_transactions(&outport)?;
        processor.save_rounds_info(&[round_info(&outport)])?;

        debug!("indexed block {} of shard {}", outport.header.nonce, outport.header.shard_id);
        count += 1;
    }

    Ok(count)
}

fn round_info(outport: &OutportBlock) -> RoundInfo {
    let header = &outport.header;
    RoundInfo {
        round: header.round,
        signers_indexes: outport.signers_indexes.clone(),
        block_was_proposed: true,
        shard_id: header.shard_id,
        epoch: header.epoch,
        timestamp: header.timestamp,
    }
}

fn init_logging(config: &IndexerConfig) {
    let log_level = config.monitoring.log_level.parse().unwrap_or(tracing::Level::INFO);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("es_indexer={},ureq=warn", log_level).into());

    if config.monitoring.structured_logging {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
