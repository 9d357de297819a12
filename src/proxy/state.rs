//! Proxy server state

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::{Config, Timeouts, UpstreamConfig};
use crate::metrics::Metrics;

use super::auth::AuthGate;
use super::relay::UpstreamRelay;
use super::tunnel::TunnelEstablisher;

/// Shared state for the proxy server
///
/// Everything in here is read-only after startup except the metrics registry,
/// whose collectors are safe to update from concurrent requests.
#[derive(Clone)]
pub struct ProxyState {
    /// Service token check
    pub auth: Arc<AuthGate>,
    /// Opens one CONNECT tunnel per request
    pub tunnel: Arc<TunnelEstablisher>,
    /// Speaks HTTP(S) to the upstream API over a tunnel
    pub relay: Arc<UpstreamRelay>,
    /// Model and token cap for payloads
    pub upstream: Arc<UpstreamConfig>,
    pub timeouts: Timeouts,
    pub metrics: Arc<Metrics>,
}

impl ProxyState {
    pub fn from_config(config: &Config, metrics: Arc<Metrics>) -> Result<Self> {
        let tunnel = TunnelEstablisher::new(
            &config.forward_proxy,
            config.upstream.authority(),
            config.timeouts.proxy_connect,
        );
        let relay = UpstreamRelay::new(&config.upstream, config.timeouts.upstream_idle)
            .context("Failed to set up upstream client")?;

        Ok(Self {
            auth: Arc::new(AuthGate::new(&config.service_token)),
            tunnel: Arc::new(tunnel),
            relay: Arc::new(relay),
            upstream: Arc::new(config.upstream.clone()),
            timeouts: config.timeouts,
            metrics,
        })
    }
}
