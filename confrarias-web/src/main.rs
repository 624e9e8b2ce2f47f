//! confrarias-web - directory of Portuguese gastronomic confrarias
//!
//! Serves the public catalog, community submissions and the manager and
//! admin back offices over one HTTP listener.

use anyhow::{Context, Result};
use clap::Parser;
use confrarias_common::blob::LocalBlobStore;
use confrarias_common::config::{AppConfig, CliOverrides};
use confrarias_common::db::init_database;
use confrarias_common::identity::SqliteIdentity;
use confrarias_web::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments; each one overrides its environment variable and
/// the TOML config
#[derive(Parser, Debug)]
#[command(name = "confrarias-web")]
#[command(about = "Directory of Portuguese gastronomic confrarias")]
#[command(version)]
struct Args {
    /// Path to config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder holding the database and uploaded images
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:5780
    #[arg(short, long)]
    bind_addr: Option<String>,

    /// Email of the single administrator account
    #[arg(long)]
    admin_email: Option<String>,

    /// Base URL prefixed to stored image paths
    #[arg(long)]
    public_base_url: Option<String>,

    /// Tracing filter, e.g. "info" or "confrarias_web=debug"
    #[arg(long)]
    log_level: Option<String>,
}

impl From<Args> for CliOverrides {
    fn from(args: Args) -> Self {
        CliOverrides {
            config_path: args.config,
            root_folder: args.root_folder,
            bind_addr: args.bind_addr,
            admin_email: args.admin_email,
            public_base_url: args.public_base_url,
            log_level: args.log_level,
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliOverrides::from(Args::parse());
    let config = AppConfig::resolve(&cli).context("Failed to resolve configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any database work
    info!(
        "Starting confrarias-web v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Root folder: {}", config.root_folder.display());
    info!("Administrator: {}", config.admin_email);

    let db_path = config.database_path();
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    info!("✓ Database ready: {}", db_path.display());

    let storage_root = config.storage_path();
    tokio::fs::create_dir_all(&storage_root)
        .await
        .with_context(|| format!("Failed to create storage folder {}", storage_root.display()))?;

    let identity = Arc::new(SqliteIdentity::new(pool.clone()));
    let blobs = Arc::new(LocalBlobStore::new(storage_root.clone(), &config.public_base_url));
    let state = AppState::new(pool, &config.admin_email, identity, blobs, storage_root);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("confrarias-web listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("confrarias-web stopped");
    Ok(())
}
