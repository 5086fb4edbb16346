//! Library API server binary.
//!
//! # Usage
//!
//! ```bash
//! # With config file
//! library-api --config config.yaml
//!
//! # With environment variables only
//! LIBRARY_SERVER__PORT=9090 library-api
//! ```

use std::net::SocketAddr;

use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use library_api::http::{create_router_with_options, RouterOptions};
use library_api::observability::{init_logging, init_metrics, LoggingConfig};
use library_server::{Library, ServerConfig};
use library_storage::MemoryDataStore;

/// Library catalog API with live author and book events.
#[derive(Parser, Debug)]
#[command(name = "library-api")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match args.config {
        Some(path) => ServerConfig::load(&path)?,
        None => ServerConfig::from_env()?,
    };

    init_logging(LoggingConfig::from(&config.logging));
    info!(version = env!("CARGO_PKG_VERSION"), "starting library API");

    let metrics_state = if config.metrics.enabled {
        let state = init_metrics()?;
        info!("metrics enabled at /metrics");
        Some(state)
    } else {
        None
    };

    let library = match config.storage.backend.as_str() {
        "memory" => {
            info!("using in-memory storage backend");
            Library::new(MemoryDataStore::new_shared(), &config)
        }
        other => {
            error!(backend = other, "unknown storage backend");
            anyhow::bail!("unknown storage backend: {other}");
        }
    };

    let router = create_router_with_options(library, RouterOptions::from_config(&config, metrics_state));
    let addr: SocketAddr = config.bind_address().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Completes on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
