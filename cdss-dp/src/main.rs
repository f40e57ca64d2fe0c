//! cdss-dp (Data Processing) - preprocessing pipeline service
//!
//! Normalizes raw payloads by strategy tag and keeps the resulting artifacts
//! for the analysis service to read back.

use anyhow::{Context, Result};
use cdss_common::audit::{AuditForwarder, AuditSubject, DeliveryMode};
use cdss_common::config::{
    load_toml_config, RootFolderInitializer, RootFolderResolver, DATA_PROCESSING_PORT,
};
use cdss_common::db::init_database;
use cdss_common::shutdown::shutdown_signal;
use cdss_dp::pipeline::{Pipeline, UnclaimedPolicy};
use cdss_dp::{build_router, db::ArtifactStore, AppState, DataService};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cdss-dp
#[derive(Parser, Debug)]
#[command(name = "cdss-dp")]
#[command(about = "Preprocessing pipeline for CDSS")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = DATA_PROCESSING_PORT, env = "CDSS_DP_PORT")]
    port: u16,

    /// Root folder holding the service databases
    #[arg(short, long, env = "CDSS_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "CDSS_CONFIG")]
    config: Option<PathBuf>,

    /// Reject strategy tags no normalizer owns instead of passing them through
    #[arg(long, env = "CDSS_DP_STRICT")]
    strict_strategies: bool,

    /// Audit sink base URL
    #[arg(long, env = "CDSS_AUDIT_URL")]
    audit_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cdss_dp=info,cdss_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting CDSS Data Processing (cdss-dp) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let toml_config = load_toml_config(args.config.as_deref()).context("Failed to load configuration")?;

    let root_folder = RootFolderResolver::new("cdss-dp")
        .with_cli_arg(args.root_folder)
        .with_toml(&toml_config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let pool = init_database(&initializer.database_path("data_processing.db"))
        .await
        .context("Failed to open data processing database")?;
    let store = ArtifactStore::new(pool)
        .await
        .context("Failed to create artifact tables")?;

    let policy = UnclaimedPolicy::from_strict_flag(args.strict_strategies || toml_config.pipeline.strict);
    let pipeline = Pipeline::standard(policy).context("Failed to assemble preprocessing pipeline")?;
    info!("Pipeline order: {:?}, unclaimed tags: {:?}", pipeline.order(), policy);

    let audit_url = args.audit_url.unwrap_or(toml_config.endpoints.audit.clone());
    let audit = AuditSubject::new(DeliveryMode::from_inline_flag(toml_config.audit.inline));
    audit.attach(Arc::new(
        AuditForwarder::new(&audit_url, toml_config.upstream.timeout_ms)
            .context("Failed to create audit forwarder")?,
    ));
    info!("Audit events forwarded to {}", audit_url);

    let state = AppState::new(DataService::new(pipeline, store, audit))
        .with_body_limit(toml_config.limits.body_limit_bytes);
    info!("Request body limit: {} bytes", state.body_limit);
    let app = build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("cdss-dp listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}
