// Copilot Proxy - authenticating relay for the Excel AI add-in
//
// The add-in cannot reach the model provider directly: traffic has to leave
// through an authenticated corporate forward proxy, and the provider key must
// stay on the server. This service sits in between.
//
// Architecture:
// - Proxy server (axum): checks the service token, relays /api/chat
// - Tunnel: one CONNECT tunnel through the forward proxy per request
// - Relay (hyper + rustls): HTTPS to the provider inside the tunnel, streamed back
// - Metrics (prometheus): one outcome per request, exposed on /metrics

mod cli;
mod config;
mod logging;
mod metrics;
mod proxy;
mod startup;
mod util;

use std::sync::Arc;

use anyhow::{Context, Result};
use config::Config;
use metrics::Metrics;

#[tokio::main]
async fn main() -> Result<()> {
    // Handle CLI commands first (config --show)
    // If a command was handled, exit early
    if cli::handle_cli() {
        return Ok(());
    }

    let config = Config::from_env().context("Invalid configuration")?;

    // The guard must be kept alive for the duration of the program to ensure logs flush
    let _file_guard = logging::init(&config.logging);

    let metrics = Arc::new(Metrics::new().context("Failed to create metrics registry")?);

    // Create shutdown channel for graceful proxy shutdown
    // This is a oneshot channel - it can only send one signal
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    startup::print_startup(&config);
    startup::log_startup(&config);

    let proxy_config = config.clone();
    let mut proxy_handle = tokio::spawn(async move {
        proxy::start_proxy(proxy_config, metrics, shutdown_rx).await
    });

    // Run until Ctrl+C, or until the server stops on its own (e.g. bind failure)
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
        }
        result = &mut proxy_handle => {
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    tracing::error!("Proxy server failed: {:#}", e);
                    Err(e)
                }
                Err(e) => Err(e).context("Proxy task panicked"),
            };
        }
    }

    tracing::info!("Shutting down...");

    // Signal the proxy to shut down gracefully
    // If the send fails, the proxy has already shut down (which is fine)
    let _ = shutdown_tx.send(());

    match proxy_handle.await {
        Ok(Err(e)) => tracing::error!("Proxy server error during shutdown: {:#}", e),
        Err(e) => tracing::error!("Proxy task failed: {}", e),
        Ok(Ok(())) => {}
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
