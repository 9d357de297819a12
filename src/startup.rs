// Startup module - displays banner and routing summary
//
// Shows where the proxy listens, which upstream it relays to, which forward
// proxy the tunnel goes through, and any configuration worth a warning.

use std::time::Duration;

use crate::config::{fingerprint, Config, VERSION};

/// ANSI color codes for terminal output
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const MAGENTA: &str = "\x1b[35m";
}

/// Configuration problems that do not stop startup
fn warnings(config: &Config) -> Vec<&'static str> {
    let mut warnings = Vec::new();
    if config.uses_default_service_token() {
        warnings.push("SERVICE_TOKEN is the built-in default; set a private token");
    }
    if config.upstream.api_key.is_empty() {
        warnings.push("NEBIUS_API_KEY is not set; upstream will reject requests");
    }
    if !config.upstream.tls {
        warnings.push("UPSTREAM_TLS is off; upstream traffic is plain HTTP");
    }
    warnings
}

fn describe_timeout(timeout: Option<Duration>) -> String {
    match timeout {
        Some(d) => format!("{}s", d.as_secs()),
        None => "unbounded".to_string(),
    }
}

/// Print the startup banner
pub fn print_startup(config: &Config) {
    use colors::*;

    // Banner
    println!();
    println!("  {BOLD}{CYAN}Copilot Proxy{RESET} {DIM}v{VERSION}{RESET}");
    println!("  {DIM}Authenticating relay for the Excel AI add-in{RESET}");
    println!();

    println!(
        "    {GREEN}✓{RESET} {:<14} {DIM}{}{}{RESET}",
        "upstream",
        config.upstream.authority(),
        config.upstream.path
    );
    println!(
        "    {GREEN}✓{RESET} {:<14} {DIM}{}{RESET}",
        "model", config.upstream.model
    );
    println!(
        "    {GREEN}✓{RESET} {:<14} {DIM}{} (user {:?}){RESET}",
        "forward proxy",
        config.forward_proxy.address(),
        config.forward_proxy.user
    );
    println!(
        "    {GREEN}✓{RESET} {:<14} {DIM}connect {}, idle {}{RESET}",
        "timeouts",
        describe_timeout(config.timeouts.proxy_connect),
        describe_timeout(config.timeouts.upstream_idle)
    );
    println!();

    for warning in warnings(config) {
        println!("  {YELLOW}!{RESET} {YELLOW}{warning}{RESET}");
    }

    println!(
        "  {MAGENTA}▸{RESET} Proxy listening on {BOLD}{}{RESET}",
        config.bind_addr
    );
    println!();
}

/// Mirror the startup summary into the log
pub fn log_startup(config: &Config) {
    tracing::info!("Copilot Proxy v{}", VERSION);
    tracing::info!(
        upstream = %config.upstream.authority(),
        path = %config.upstream.path,
        model = %config.upstream.model,
        tls = config.upstream.tls,
        "Upstream configured"
    );
    tracing::info!(
        proxy = %config.forward_proxy.address(),
        user = %config.forward_proxy.user,
        pass = %fingerprint(&config.forward_proxy.pass),
        "Forward proxy configured"
    );
    tracing::info!(
        service_token = %fingerprint(&config.service_token),
        connect_timeout = %describe_timeout(config.timeouts.proxy_connect),
        idle_timeout = %describe_timeout(config.timeouts.upstream_idle),
        "Request limits configured"
    );

    for warning in warnings(config) {
        tracing::warn!("{}", warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_warnings() {
        let warnings = warnings(&Config::default());
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("SERVICE_TOKEN"));
        assert!(warnings[1].contains("NEBIUS_API_KEY"));
    }

    #[test]
    fn test_clean_config_has_no_warnings() {
        let mut config = Config::default();
        config.service_token = "private".to_string();
        config.upstream.api_key = "sk-test".to_string();
        assert!(warnings(&config).is_empty());
    }

    #[test]
    fn test_describe_timeout() {
        assert_eq!(describe_timeout(Some(Duration::from_secs(30))), "30s");
        assert_eq!(describe_timeout(None), "unbounded");
    }
}
