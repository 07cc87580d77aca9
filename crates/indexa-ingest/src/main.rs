//! Indexa Ingest - Transfer event ingestion daemon

use anyhow::Result;
use clap::Parser;
use indexa_common::logging::{init_logging, LogConfig, LogLevel};
use indexa_ingest::{IndexerConfig, IndexerOrchestrator, PgEventStore, WsTransport};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "indexa-ingest")]
#[command(author, version, about = "ERC-20 transfer event ingester")]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env()?;
    if std::env::var("LOG_FILE_PREFIX").is_err() {
        log_config.log_file_prefix = "indexa-ingest".to_string();
    }
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    init_logging(&log_config)?;

    info!("Starting Indexa ingester");

    let config = IndexerConfig::load()?;
    info!(url = %config.upstream.ws_url, "Configuration loaded");

    let store = PgEventStore::connect(&config.database).await?;
    info!("Database connection pool established");

    // One token for the whole process: the signal listener trips it, the
    // orchestrator tears everything down and returns.
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let orchestrator = IndexerOrchestrator::new(config, store);
    orchestrator.run(WsTransport::new(), shutdown).await?;

    info!("Ingester shut down gracefully");

    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
