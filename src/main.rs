//! membership-service - Member registration, login and token-protected CRUD
//!
//! This is the main entry point for the membership-service application.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::info;

use membership_service::auth::{AuthManager, RateLimitConfig, TokenIssuer};
use membership_service::config::Config;
use membership_service::database::SqliteDatabase;
use membership_service::membership::MembershipService;
use membership_service::server::{AppState, Server};
use membership_service::telemetry::init_tracing;

/// Interval between sweeps of stale login throttle entries
const THROTTLE_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// membership-service - Member registration, login and token-protected CRUD
#[derive(Parser, Debug)]
#[command(name = "membership-service")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "MEMBERSHIP_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load and validate configuration
    let config = load_config(&args)?;

    // Initialize tracing/logging
    init_tracing(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting membership-service"
    );

    // Initialize database
    let database = SqliteDatabase::new(&config.database.path).await?;
    let database = Arc::new(database);
    info!(path = %config.database.path, "Database initialized");

    // Initialize token issuer
    let secret = config
        .auth
        .jwt_secret
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("auth.jwt_secret is not set"))?;
    let tokens = Arc::new(TokenIssuer::new(
        secret.expose().as_bytes(),
        config.auth.token_ttl(),
    )?);
    info!(
        ttl_secs = config.auth.token_ttl_secs,
        "Token issuer initialized"
    );

    // Initialize services
    let membership = Arc::new(MembershipService::new(
        Arc::clone(&database),
        Arc::clone(&tokens),
        RateLimitConfig::from(&config.auth.rate_limit),
    ));
    let auth_manager = Arc::new(AuthManager::new(Arc::clone(&database), tokens));

    spawn_throttle_cleanup(Arc::clone(&membership));

    // Create application state
    let state = AppState {
        membership,
        auth_manager,
        database,
    };

    // Create and start the HTTP server
    let server = Server::new(config.server.clone(), state);

    info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting HTTP server"
    );

    server.run(shutdown_signal()).await?;

    info!("membership-service shutdown complete");
    Ok(())
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let config = match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path)
        }
        None => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from environment variables");
            Config::from_env()
        }
    }
    .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid config: {}", e))?;

    Ok(config)
}

/// Periodically drop throttle entries whose block and window have lapsed
fn spawn_throttle_cleanup(membership: Arc<MembershipService<SqliteDatabase>>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(THROTTLE_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            membership.throttle().cleanup();
        }
    });
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
