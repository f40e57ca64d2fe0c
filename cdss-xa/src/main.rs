//! cdss-xa (Explainable AI) - analysis dispatcher service
//!
//! Reads artifacts from cdss-dp, runs the strategy for their tag against the
//! configured model hub and generator, and stores the reports.

use anyhow::{Context, Result};
use cdss_common::audit::{AuditForwarder, AuditSubject, DeliveryMode};
use cdss_common::config::{
    load_toml_config, RootFolderInitializer, RootFolderResolver, EXPLAINABLE_AI_PORT,
};
use cdss_common::db::init_database;
use cdss_common::shutdown::shutdown_signal;
use cdss_xa::artifacts::HttpArtifactSource;
use cdss_xa::models::{
    GenerativeClient, Generator, ImageModel, ModelHubClient, TabularModel, TextClassifier,
};
use cdss_xa::strategy::{ModelAdapters, StrategyRegistry};
use cdss_xa::{build_router, db::ReportStore, AnalysisService, AppState};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cdss-xa
#[derive(Parser, Debug)]
#[command(name = "cdss-xa")]
#[command(about = "Analysis dispatcher and report store for CDSS")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = EXPLAINABLE_AI_PORT, env = "CDSS_XA_PORT")]
    port: u16,

    /// Root folder holding the service databases
    #[arg(short, long, env = "CDSS_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "CDSS_CONFIG")]
    config: Option<PathBuf>,

    /// Preprocessing service base URL
    #[arg(long, env = "CDSS_DATA_PROCESSING_URL")]
    data_processing_url: Option<String>,

    /// Model hub base URL (tabular, image and text models)
    #[arg(long, env = "CDSS_MODEL_HUB_URL")]
    model_hub_url: Option<String>,

    /// Generative service base URL
    #[arg(long, env = "CDSS_GENERATOR_URL")]
    generator_url: Option<String>,

    /// Audit sink base URL
    #[arg(long, env = "CDSS_AUDIT_URL")]
    audit_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cdss_xa=info,cdss_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting CDSS Explainable AI (cdss-xa) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let toml_config = load_toml_config(args.config.as_deref()).context("Failed to load configuration")?;
    let timeout_ms = toml_config.upstream.timeout_ms;

    let root_folder = RootFolderResolver::new("cdss-xa")
        .with_cli_arg(args.root_folder)
        .with_toml(&toml_config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let pool = init_database(&initializer.database_path("explainable_ai.db"))
        .await
        .context("Failed to open explainable AI database")?;
    let reports = ReportStore::new(pool)
        .await
        .context("Failed to create report tables")?;

    let mut adapters = ModelAdapters::default();
    match args.model_hub_url.or(toml_config.models.hub_url.clone()) {
        Some(url) => {
            let hub = Arc::new(ModelHubClient::new(&url, timeout_ms).context("Failed to create model hub client")?);
            adapters.tabular = Some(hub.clone() as Arc<dyn TabularModel>);
            adapters.image = Some(hub.clone() as Arc<dyn ImageModel>);
            adapters.text = Some(hub as Arc<dyn TextClassifier>);
            info!("Model hub at {}", url);
        }
        None => warn!("No model hub configured; numeric, image and text strategies are unavailable"),
    }
    match args.generator_url.or(toml_config.models.generator_url.clone()) {
        Some(url) => {
            let generator =
                GenerativeClient::new(&url, timeout_ms).context("Failed to create generator client")?;
            adapters.generator = Some(Arc::new(generator) as Arc<dyn Generator>);
            info!("Generator at {}", url);
        }
        None => warn!("No generator configured; text and signal explanations will be degraded"),
    }
    let registry = StrategyRegistry::standard(adapters);
    info!("Strategies: {:?}", registry.tags());

    let data_processing_url = args
        .data_processing_url
        .unwrap_or(toml_config.endpoints.data_processing.clone());
    let artifacts = HttpArtifactSource::new(&data_processing_url, timeout_ms)
        .context("Failed to create preprocessing client")?;

    let audit_url = args.audit_url.unwrap_or(toml_config.endpoints.audit.clone());
    let audit = AuditSubject::new(DeliveryMode::from_inline_flag(toml_config.audit.inline));
    audit.attach(Arc::new(
        AuditForwarder::new(&audit_url, timeout_ms).context("Failed to create audit forwarder")?,
    ));
    info!("Audit events forwarded to {}", audit_url);

    let service = AnalysisService::new(registry, Arc::new(artifacts), reports, audit);
    let app = build_router(AppState::new(service));

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("cdss-xa listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}
