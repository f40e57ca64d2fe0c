//! cdss-at (Audit Trail) - append-only audit event sink
//!
//! Every other CDSS service forwards its audit events here. Records are
//! hash-chained so tampering is detectable through GET /audit/verify.

use anyhow::{Context, Result};
use cdss_common::config::{load_toml_config, RootFolderInitializer, RootFolderResolver, AUDIT_PORT};
use cdss_common::db::init_database;
use cdss_common::shutdown::shutdown_signal;
use cdss_at::{build_router, db::AuditStore, AppState};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cdss-at
#[derive(Parser, Debug)]
#[command(name = "cdss-at")]
#[command(about = "Audit trail sink for CDSS")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = AUDIT_PORT, env = "CDSS_AT_PORT")]
    port: u16,

    /// Root folder holding the service databases
    #[arg(short, long, env = "CDSS_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "CDSS_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cdss_at=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting CDSS Audit Trail (cdss-at) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let toml_config = load_toml_config(args.config.as_deref()).context("Failed to load configuration")?;

    let root_folder = RootFolderResolver::new("cdss-at")
        .with_cli_arg(args.root_folder)
        .with_toml(&toml_config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let db_path = initializer.database_path("audit.db");
    let pool = init_database(&db_path)
        .await
        .context("Failed to open audit database")?;
    let store = AuditStore::new(pool)
        .await
        .context("Failed to create audit tables")?;

    let app = build_router(AppState::new(store));

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("cdss-at listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}
