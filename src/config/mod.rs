//! Configuration for the proxy server
//!
//! Configuration comes from environment variables only, with built-in
//! defaults for everything. It is read once at startup into an immutable
//! [`Config`] that is handed to the proxy; nothing re-reads the environment
//! after that.
//!
//! Empty variables count as unset, so `PORT=` falls back to the default.

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod observability;
mod upstream;

#[cfg(test)]
mod tests;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (maintain public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use observability::{LogRotation, LoggingConfig};
pub use upstream::{ForwardProxyConfig, Timeouts, UpstreamConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared service token used when `SERVICE_TOKEN` is not set
pub const DEFAULT_SERVICE_TOKEN: &str = "my-super-secret-token";

// ─────────────────────────────────────────────────────────────────────────────
// Application Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the proxy server to
    pub bind_addr: SocketAddr,

    /// Shared token clients present as `Authorization: Bearer <token>`
    pub service_token: String,

    /// Target chat-completions API
    pub upstream: UpstreamConfig,

    /// Corporate forward proxy the tunnel is opened through
    pub forward_proxy: ForwardProxyConfig,

    /// Optional bounds on tunnel setup and upstream reads
    pub timeouts: Timeouts,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            service_token: DEFAULT_SERVICE_TOKEN.to_string(),
            upstream: UpstreamConfig::default(),
            forward_proxy: ForwardProxyConfig::default(),
            timeouts: Timeouts::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Loading
// ─────────────────────────────────────────────────────────────────────────────

/// Source of configuration values, keyed by environment variable name
pub(crate) type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source
    ///
    /// Tests feed a map here instead of mutating the process environment.
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let defaults = Self::default();

        let host = string(lookup, "BIND_HOST", &defaults.bind_addr.ip().to_string());
        let port: u16 = parsed(lookup, "PORT", defaults.bind_addr.port())?;
        let ip: IpAddr = host
            .parse()
            .with_context(|| format!("Invalid BIND_HOST: {host}"))?;
        let bind_addr = SocketAddr::new(ip, port);

        let service_token = string(lookup, "SERVICE_TOKEN", &defaults.service_token);

        Ok(Self {
            bind_addr,
            service_token,
            upstream: UpstreamConfig::from_lookup(lookup)?,
            forward_proxy: ForwardProxyConfig::from_lookup(lookup)?,
            timeouts: Timeouts::from_lookup(lookup)?,
            logging: LoggingConfig::from_lookup(lookup)?,
        })
    }

    /// True when the service token was left at its published default
    pub fn uses_default_service_token(&self) -> bool {
        self.service_token == DEFAULT_SERVICE_TOKEN
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Raw value, with empty strings treated as unset
fn raw(lookup: Lookup<'_>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.is_empty())
}

pub(crate) fn string(lookup: Lookup<'_>, key: &str, default: &str) -> String {
    raw(lookup, key).unwrap_or_else(|| default.to_string())
}

pub(crate) fn parsed<T>(lookup: Lookup<'_>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match raw(lookup, key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid value for {key} ({value:?}): {e}")),
        None => Ok(default),
    }
}

pub(crate) fn flag(lookup: Lookup<'_>, key: &str, default: bool) -> Result<bool> {
    let Some(value) = raw(lookup, key) else {
        return Ok(default);
    };
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("Invalid value for {key} ({value:?}): expected true/false")),
    }
}

/// Seconds as a duration, where zero disables the bound
pub(crate) fn seconds(lookup: Lookup<'_>, key: &str, default: u64) -> Result<Option<Duration>> {
    let secs: u64 = parsed(lookup, key, default)?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

/// Short SHA-256 fingerprint of a secret, safe to print and log
///
/// Never log the actual credential. An empty secret prints as `<unset>`.
pub fn fingerprint(secret: &str) -> String {
    if secret.is_empty() {
        return "<unset>".to_string();
    }
    let hash = Sha256::digest(secret.as_bytes());
    format!("sha256:{}", &format!("{:x}", hash)[..12])
}
