//! Proxy server setup and initialization

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::metrics::Metrics;

use super::handlers;
use super::state::ProxyState;

/// CORS for the Excel add-in, which is served from its own origin
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build the router: chat relay, metrics exposition and a liveness probe
///
/// `/metrics` and `/health` take no token; expose them to the scrape
/// network only.
pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/api/chat", post(handlers::chat))
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the proxy server
pub async fn start_proxy(
    config: Config,
    metrics: Arc<Metrics>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<()> {
    let bind_addr = config.bind_addr;
    let state = ProxyState::from_config(&config, metrics)?;
    let app = router(state);

    tracing::info!("Starting proxy on {}", bind_addr);

    // Bind and serve
    let listener = TcpListener::bind(bind_addr)
        .await
        .context("Failed to bind to address")?;

    tracing::info!("Proxy listening on {}", bind_addr);

    // Stop accepting on shutdown, let in-flight requests finish
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_rx.await.ok();
        })
        .await
        .context("Server error")?;

    tracing::info!("Proxy server shut down gracefully");
    Ok(())
}
