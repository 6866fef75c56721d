//! # School Auth Main Entry Point
//!
//! Loads configuration, prepares the database, starts the expired-session
//! sweeper and serves the HTTP API until a shutdown signal arrives.

use std::sync::Arc;

use migration::{Migrator, MigratorTrait};
use school_auth::{
    auth::{AuthService, session::SessionSweeper},
    config::ConfigLoader,
    db,
    server::{AppState, run_server},
    telemetry,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from layered env files and variables
    let config_loader = ConfigLoader::new();
    let config = config_loader.load()?;

    telemetry::init_tracing(&config)?;

    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    let db = db::init_pool(&config).await?;
    Migrator::up(&db, None).await?;

    let auth = AuthService::new(&config, db.clone())?;
    let auth = Arc::new(auth);

    let shutdown = CancellationToken::new();
    let sweeper = SessionSweeper::new(auth.sessions(), config.session_sweep_interval())
        .spawn(shutdown.clone());

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        signal_token.cancel();
    });

    let state = AppState {
        config: Arc::new(config),
        db,
        auth,
    };

    let served = run_server(state, shutdown.clone()).await;
    shutdown.cancel();
    if let Err(err) = sweeper.await {
        tracing::warn!(error = %err, "Session sweeper task ended abnormally");
    }
    served
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
