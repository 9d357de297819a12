//! Configuration tests
//!
//! Every test feeds a map through `Config::from_lookup` so nothing here
//! touches the real process environment.

use super::*;
use std::collections::HashMap;

fn load(vars: &[(&str, &str)]) -> Result<Config> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(&|key| map.get(key).cloned())
}

#[test]
fn test_defaults_when_environment_is_empty() {
    let config = load(&[]).unwrap();

    assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
    assert_eq!(config.service_token, DEFAULT_SERVICE_TOKEN);
    assert!(config.uses_default_service_token());

    assert_eq!(config.upstream.authority(), "api.studio.nebius.ai:443");
    assert_eq!(config.upstream.path, "/v1/chat/completions");
    assert_eq!(config.upstream.model, "Qwen/Qwen3-Coder-480B-A35B-Instruct");
    assert_eq!(config.upstream.max_tokens, 2000);
    assert!(config.upstream.tls);

    assert_eq!(config.forward_proxy.address(), "127.0.0.1:8000");
    assert_eq!(config.timeouts.proxy_connect, Some(Duration::from_secs(30)));
    assert_eq!(config.timeouts.upstream_idle, Some(Duration::from_secs(300)));
    assert_eq!(config.logging.level, "info");
    assert!(!config.logging.file_enabled);
}

#[test]
fn test_environment_overrides() {
    let config = load(&[
        ("PORT", "9090"),
        ("BIND_HOST", "127.0.0.1"),
        ("SERVICE_TOKEN", "s3cret"),
        ("NEBIUS_API_KEY", "nb-key"),
        ("UPSTREAM_PROXY_HOST", "proxy.corp"),
        ("UPSTREAM_PROXY_PORT", "3128"),
        ("UPSTREAM_PROXY_USER", "alice"),
        ("UPSTREAM_PROXY_PASS", "wonderland"),
        ("UPSTREAM_TLS", "false"),
        ("LOG_FILE_ROTATION", "hourly"),
    ])
    .unwrap();

    assert_eq!(config.bind_addr, "127.0.0.1:9090".parse().unwrap());
    assert_eq!(config.service_token, "s3cret");
    assert!(!config.uses_default_service_token());
    assert_eq!(config.upstream.api_key, "nb-key");
    assert!(!config.upstream.tls);
    assert_eq!(config.forward_proxy.address(), "proxy.corp:3128");
    assert_eq!(config.forward_proxy.user, "alice");
    assert_eq!(config.forward_proxy.pass, "wonderland");
    assert_eq!(config.logging.file_rotation, LogRotation::Hourly);
}

#[test]
fn test_ipv6_bind_host() {
    let config = load(&[("BIND_HOST", "::"), ("PORT", "9090")]).unwrap();
    assert_eq!(config.bind_addr, "[::]:9090".parse().unwrap());

    let config = load(&[("BIND_HOST", "::1")]).unwrap();
    assert!(config.bind_addr.is_ipv6());
    assert_eq!(config.bind_addr.port(), 8080);

    let err = load(&[("BIND_HOST", "localhost")]).unwrap_err();
    assert!(err.to_string().contains("BIND_HOST"), "{err}");
}

#[test]
fn test_empty_values_fall_back_to_defaults() {
    let config = load(&[("PORT", ""), ("SERVICE_TOKEN", "")]).unwrap();
    assert_eq!(config.bind_addr.port(), 8080);
    assert_eq!(config.service_token, DEFAULT_SERVICE_TOKEN);
}

#[test]
fn test_zero_timeout_disables_bound() {
    let config = load(&[
        ("PROXY_CONNECT_TIMEOUT_SECS", "0"),
        ("UPSTREAM_IDLE_TIMEOUT_SECS", "5"),
    ])
    .unwrap();
    assert_eq!(config.timeouts.proxy_connect, None);
    assert_eq!(config.timeouts.upstream_idle, Some(Duration::from_secs(5)));
}

#[test]
fn test_invalid_port_names_the_variable() {
    let err = load(&[("UPSTREAM_PROXY_PORT", "eighty")]).unwrap_err();
    assert!(err.to_string().contains("UPSTREAM_PROXY_PORT"), "{err}");
}

#[test]
fn test_invalid_flag_is_rejected() {
    let err = load(&[("UPSTREAM_TLS", "maybe")]).unwrap_err();
    assert!(err.to_string().contains("UPSTREAM_TLS"), "{err}");
}

#[test]
fn test_unknown_rotation_defaults_to_daily() {
    assert_eq!(LogRotation::parse("weekly"), LogRotation::Daily);
    assert_eq!(LogRotation::parse("NEVER"), LogRotation::Never);
}

#[test]
fn test_fingerprint_hides_secret() {
    let fp = fingerprint("my-super-secret-token");
    assert!(fp.starts_with("sha256:"));
    assert_eq!(fp.len(), "sha256:".len() + 12);
    assert!(!fp.contains("secret"));
    assert_eq!(fp, fingerprint("my-super-secret-token"));
    assert_eq!(fingerprint(""), "<unset>");
}
