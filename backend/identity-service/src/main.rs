/// Identity Service Main Entry Point
///
/// Connects storage, applies migrations and runs the revocation maintenance
/// loop until shutdown. Transports embed [`identity_service::AuthenticationFlow`]
/// through the library crate.
use anyhow::{Context, Result};
use identity_service::{config::Settings, telemetry};
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

const PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();
    info!("Starting Identity Service");

    let settings = Settings::from_env().context("Failed to load configuration")?;
    info!(
        threshold = settings.lockout.threshold,
        window_secs = settings.lockout.window_secs,
        duration_secs = settings.lockout.duration_secs,
        "Configuration loaded successfully"
    );

    let flow = identity_service::connect(&settings).await?;
    let sessions = flow.sessions().clone();

    let mut interval = tokio::time::interval(PURGE_INTERVAL);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = sessions.purge_expired().await {
                    warn!(error = %e, "Revocation purge failed");
                }
            }
            _ = &mut shutdown => break,
        }
    }

    info!("Identity Service stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Shutting down gracefully...");
}
