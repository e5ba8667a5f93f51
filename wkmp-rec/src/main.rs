//! Recommendation Service (wkmp-rec) - Main entry point
//!
//! Starts the model supervisor, the recommendation dispatcher and the retrain
//! ticker, then serves the HTTP API until Ctrl+C / SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wkmp_common::config::resolve_root_folder;
use wkmp_common::db::init_database;
use wkmp_rec::api::{self, AppState};
use wkmp_rec::config::RecConfig;
use wkmp_rec::diagnostics::DiagnosticsHub;
use wkmp_rec::engine::FactorizationEngine;
use wkmp_rec::gateway::{MemoryGateway, SqliteGateway};
use wkmp_rec::{RecContext, RecService};

/// Command-line arguments for wkmp-rec
#[derive(Parser, Debug)]
#[command(name = "wkmp-rec")]
#[command(about = "Recommendation microservice for WKMP")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "WKMP_REC_PORT")]
    port: Option<u16>,

    /// Root folder for the database and persisted models
    #[arg(short, long, env = "WKMP_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Bootstrap TOML file
    #[arg(short, long, env = "WKMP_REC_CONFIG")]
    config: Option<PathBuf>,

    /// Keep training data in memory instead of SQLite
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let config_path = RecConfig::locate(args.config.as_deref());
    let config =
        RecConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing
    let default_filter = format!("wkmp_rec={},tower_http=debug", config.logging.level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &config_path {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No configuration file found, using defaults"),
    }

    let root_folder = resolve_root_folder(
        args.root_folder.as_deref(),
        "WKMP_ROOT_FOLDER",
        config.root_folder.as_deref(),
    );
    let port = args.port.unwrap_or(config.port);

    info!("Starting WKMP Recommendation Service on port {}", port);
    info!("Root folder: {}", root_folder.display());

    let model_dir = config.model_dir(&root_folder);
    std::fs::create_dir_all(&model_dir)
        .with_context(|| format!("Failed to create model directory {}", model_dir.display()))?;
    let engine = Arc::new(FactorizationEngine::new(model_dir, config.training.clone()));
    let diagnostics = Arc::new(DiagnosticsHub::default());

    let ctx = if args.in_memory {
        info!("Using in-memory training data store");
        RecContext::in_memory(Arc::new(MemoryGateway::new()), engine, diagnostics)
    } else {
        let db_path = config.database_path(&root_folder);
        let pool = init_database(&db_path)
            .await
            .context("Failed to initialize database")?;
        info!("Database: {}", db_path.display());
        RecContext::sqlite(SqliteGateway::new(pool), engine, diagnostics)
    };

    let service = RecService::start(ctx, Some(config.retrain_interval()));

    let app = api::create_router(AppState::new(&service, config.default_count));

    // Create socket address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    service.shutdown();
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
