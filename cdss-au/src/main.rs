//! cdss-au (Authentication) - credential and token authority
//!
//! Registers accounts, verifies passwords and issues HS256 bearer tokens.
//! The gateway validates every caller token here.

use anyhow::{Context, Result};
use cdss_au::{build_router, db::AccountStore, token::TokenSigner, AppState, AuthService, TOKEN_SECRET_KEY};
use cdss_common::audit::{AuditForwarder, AuditSubject, DeliveryMode};
use cdss_common::config::{
    load_toml_config, RootFolderInitializer, RootFolderResolver, AUTHENTICATION_PORT,
};
use cdss_common::db::{init_database, load_or_init_secret};
use cdss_common::shutdown::shutdown_signal;
use cdss_common::time::SystemClock;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cdss-au
#[derive(Parser, Debug)]
#[command(name = "cdss-au")]
#[command(about = "Credential and token authority for CDSS")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = AUTHENTICATION_PORT, env = "CDSS_AU_PORT")]
    port: u16,

    /// Root folder holding the service databases
    #[arg(short, long, env = "CDSS_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "CDSS_CONFIG")]
    config: Option<PathBuf>,

    /// HS256 signing secret (generated and stored on first start if unset)
    #[arg(long, env = "CDSS_TOKEN_SECRET", hide_env_values = true)]
    token_secret: Option<String>,

    /// Token lifetime in minutes
    #[arg(long, env = "CDSS_TOKEN_TTL_MINUTES")]
    token_ttl_minutes: Option<i64>,

    /// Audit sink base URL
    #[arg(long, env = "CDSS_AUDIT_URL")]
    audit_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cdss_au=info,cdss_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting CDSS Authentication (cdss-au) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let toml_config = load_toml_config(args.config.as_deref()).context("Failed to load configuration")?;

    let root_folder = RootFolderResolver::new("cdss-au")
        .with_cli_arg(args.root_folder)
        .with_toml(&toml_config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let pool = init_database(&initializer.database_path("authentication.db"))
        .await
        .context("Failed to open authentication database")?;

    let secret = match args.token_secret.or(toml_config.auth.token_secret.clone()) {
        Some(secret) if !secret.is_empty() => secret,
        _ => {
            info!("No token secret configured, using stored secret");
            load_or_init_secret(&pool, TOKEN_SECRET_KEY).await?
        }
    };

    let mut ttl_minutes = args.token_ttl_minutes.unwrap_or(toml_config.auth.token_ttl_minutes);
    if ttl_minutes <= 0 {
        warn!("Token TTL {} is not positive, using 60 minutes", ttl_minutes);
        ttl_minutes = 60;
    }
    let signer = TokenSigner::new(&secret, chrono::Duration::minutes(ttl_minutes), Arc::new(SystemClock));

    let accounts = AccountStore::new(pool)
        .await
        .context("Failed to create account tables")?;

    let audit_url = args.audit_url.unwrap_or(toml_config.endpoints.audit.clone());
    let audit = AuditSubject::new(DeliveryMode::from_inline_flag(toml_config.audit.inline));
    audit.attach(Arc::new(
        AuditForwarder::new(&audit_url, toml_config.upstream.timeout_ms)
            .context("Failed to create audit forwarder")?,
    ));
    info!("Audit events forwarded to {}", audit_url);

    let app = build_router(AppState::new(AuthService::new(accounts, signer, audit)));

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("cdss-au listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}
