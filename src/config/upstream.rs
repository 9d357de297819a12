//! Upstream API, forward proxy and timeout settings
//!
//! The upstream endpoint is fixed per process: clients cannot pick the host,
//! path, model or token cap. Everything here is read-only after startup.

use anyhow::Result;
use std::time::Duration;

use super::{flag, parsed, seconds, string, Lookup};

// ─────────────────────────────────────────────────────────────────────────────
// Upstream API
// ─────────────────────────────────────────────────────────────────────────────

/// Target chat-completions API, reached through the tunnel
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Host named in CONNECT, SNI and the Host header
    pub host: String,
    /// Port named in CONNECT
    pub port: u16,
    /// Request path for chat completions
    pub path: String,
    /// Model identifier injected into every payload
    pub model: String,
    /// Token cap injected into every payload
    pub max_tokens: u32,
    /// Bearer credential for the upstream API
    pub api_key: String,
    /// Negotiate TLS inside the tunnel (plain HTTP when false)
    pub tls: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: "api.studio.nebius.ai".to_string(),
            port: 443,
            path: "/v1/chat/completions".to_string(),
            model: "Qwen/Qwen3-Coder-480B-A35B-Instruct".to_string(),
            max_tokens: 2000,
            api_key: String::new(),
            tls: true,
        }
    }
}

impl UpstreamConfig {
    pub(crate) fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            host: string(lookup, "UPSTREAM_API_HOST", &defaults.host),
            port: parsed(lookup, "UPSTREAM_API_PORT", defaults.port)?,
            path: string(lookup, "UPSTREAM_API_PATH", &defaults.path),
            model: string(lookup, "UPSTREAM_MODEL", &defaults.model),
            max_tokens: parsed(lookup, "UPSTREAM_MAX_TOKENS", defaults.max_tokens)?,
            api_key: string(lookup, "NEBIUS_API_KEY", &defaults.api_key),
            tls: flag(lookup, "UPSTREAM_TLS", defaults.tls)?,
        })
    }

    /// `host:port` as named in the CONNECT request line
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Forward proxy
// ─────────────────────────────────────────────────────────────────────────────

/// Corporate forward proxy credentials
#[derive(Debug, Clone)]
pub struct ForwardProxyConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
}

impl Default for ForwardProxyConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            user: String::new(),
            pass: String::new(),
        }
    }
}

impl ForwardProxyConfig {
    pub(crate) fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            host: string(lookup, "UPSTREAM_PROXY_HOST", &defaults.host),
            port: parsed(lookup, "UPSTREAM_PROXY_PORT", defaults.port)?,
            user: string(lookup, "UPSTREAM_PROXY_USER", &defaults.user),
            pass: string(lookup, "UPSTREAM_PROXY_PASS", &defaults.pass),
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Timeouts
// ─────────────────────────────────────────────────────────────────────────────

/// Bounds on the suspension points of one request
///
/// `None` means unbounded, which is what a value of 0 in the environment
/// selects.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// TCP connect to the forward proxy plus the CONNECT handshake
    pub proxy_connect: Option<Duration>,
    /// Wait for upstream response headers, and each gap between body chunks
    pub upstream_idle: Option<Duration>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            proxy_connect: Some(Duration::from_secs(30)),
            upstream_idle: Some(Duration::from_secs(300)),
        }
    }
}

impl Timeouts {
    pub(crate) fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        Ok(Self {
            proxy_connect: seconds(lookup, "PROXY_CONNECT_TIMEOUT_SECS", 30)?,
            upstream_idle: seconds(lookup, "UPSTREAM_IDLE_TIMEOUT_SECS", 300)?,
        })
    }
}
