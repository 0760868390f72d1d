// Outfit Vote - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use outfit_vote::api::{router, AppState};
use outfit_vote::{AdminCredential, Config, VotingService};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!(version = outfit_vote::VERSION, "Starting vote server");

    let config = Config::load()?;
    let service = VotingService::from_config(&config)?;

    // Create counters up front so the first poll does not race the first vote
    let snapshot = service.stats()?;
    info!(
        entries = snapshot.per_entry.len(),
        total_votes = snapshot.total_votes,
        "Stats ready"
    );

    let state = AppState {
        service: Arc::new(service),
        admin: config
            .admin_token
            .as_deref()
            .map(|token| Arc::new(AdminCredential::new(token))),
    };

    let app = router(state);

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {address}"))?;
    info!("Server running on http://{address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
