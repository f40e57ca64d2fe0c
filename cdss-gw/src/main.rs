//! cdss-gw (Gateway) - entry point for CDSS callers
//!
//! Stateless: forwards account operations to cdss-au and runs the
//! preprocess → analyse sequence against cdss-dp and cdss-xa.

use anyhow::{Context, Result};
use cdss_common::config::{load_toml_config, GATEWAY_PORT};
use cdss_common::shutdown::shutdown_signal;
use cdss_gw::clients::{HttpAnalyzer, HttpPreprocessor, HttpTokenAuthority};
use cdss_gw::{build_router, AppState, Gateway};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cdss-gw
#[derive(Parser, Debug)]
#[command(name = "cdss-gw")]
#[command(about = "Gateway for CDSS")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = GATEWAY_PORT, env = "CDSS_GW_PORT")]
    port: u16,

    /// TOML configuration file
    #[arg(short, long, env = "CDSS_CONFIG")]
    config: Option<PathBuf>,

    /// Token authority base URL
    #[arg(long, env = "CDSS_AUTHENTICATION_URL")]
    authentication_url: Option<String>,

    /// Preprocessing service base URL
    #[arg(long, env = "CDSS_DATA_PROCESSING_URL")]
    data_processing_url: Option<String>,

    /// Analysis service base URL
    #[arg(long, env = "CDSS_EXPLAINABLE_AI_URL")]
    explainable_ai_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cdss_gw=info,cdss_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting CDSS Gateway (cdss-gw) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let toml_config = load_toml_config(args.config.as_deref()).context("Failed to load configuration")?;
    let timeout_ms = toml_config.upstream.timeout_ms;
    let body_limit = toml_config.limits.body_limit_bytes;
    let endpoints = toml_config.endpoints;

    let authentication_url = args.authentication_url.unwrap_or(endpoints.authentication);
    let data_processing_url = args.data_processing_url.unwrap_or(endpoints.data_processing);
    let explainable_ai_url = args.explainable_ai_url.unwrap_or(endpoints.explainable_ai);
    info!(
        "Upstreams: authentication={} data_processing={} explainable_ai={} (timeout {} ms)",
        authentication_url, data_processing_url, explainable_ai_url, timeout_ms
    );

    let gateway = Gateway::new(
        Arc::new(
            HttpTokenAuthority::new(&authentication_url, timeout_ms)
                .context("Failed to create token authority client")?,
        ),
        Arc::new(
            HttpPreprocessor::new(&data_processing_url, timeout_ms)
                .context("Failed to create preprocessing client")?,
        ),
        Arc::new(
            HttpAnalyzer::new(&explainable_ai_url, timeout_ms)
                .context("Failed to create analysis client")?,
        ),
    );
    info!("Request body limit: {} bytes", body_limit);
    let app = build_router(AppState::new(gateway).with_body_limit(body_limit));

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("cdss-gw listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}
