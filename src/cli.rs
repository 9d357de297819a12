// CLI module - command-line argument parsing and handlers
//
// Running without a subcommand starts the proxy. The only subcommand is
// read-only:
// - config --show: Display effective configuration

use crate::config::{fingerprint, Config, VERSION};
use clap::{Parser, Subcommand};
use std::fmt::Write;

/// Copilot Proxy - authenticating relay for the Excel AI add-in
#[derive(Parser)]
#[command(name = "copilot-proxy")]
#[command(version = VERSION)]
#[command(
    about = "Authenticating, tunneling relay for the Excel AI add-in",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,
    },
}

/// Handle CLI commands. Returns true if a command was handled (exit after).
pub fn handle_cli() -> bool {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config { show }) => {
            if show {
                handle_config_show();
            } else {
                // No flag provided, show help
                println!("Usage: copilot-proxy config --show");
                println!();
                println!("Options:");
                println!("  --show    Display effective configuration");
            }
            true
        }
        None => false, // No subcommand, run normal proxy
    }
}

fn handle_config_show() {
    match Config::from_env() {
        Ok(config) => print!("{}", render_config(&config)),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Effective configuration as `key = value` lines, secrets fingerprinted
fn render_config(config: &Config) -> String {
    let mut out = String::new();
    let secs = |d: Option<std::time::Duration>| match d {
        Some(d) => d.as_secs().to_string(),
        None => "0 (disabled)".to_string(),
    };

    // Writing to a String cannot fail
    let _ = writeln!(out, "# Effective configuration (env > defaults)");
    let _ = writeln!(out);
    let _ = writeln!(out, "bind_addr = {:?}", config.bind_addr.to_string());
    let _ = writeln!(out, "service_token = {}", fingerprint(&config.service_token));
    if config.uses_default_service_token() {
        let _ = writeln!(out, "# WARNING: service token is the built-in default");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[upstream]");
    let _ = writeln!(out, "host = {:?}", config.upstream.host);
    let _ = writeln!(out, "port = {}", config.upstream.port);
    let _ = writeln!(out, "path = {:?}", config.upstream.path);
    let _ = writeln!(out, "model = {:?}", config.upstream.model);
    let _ = writeln!(out, "max_tokens = {}", config.upstream.max_tokens);
    let _ = writeln!(out, "tls = {}", config.upstream.tls);
    let _ = writeln!(out, "api_key = {}", fingerprint(&config.upstream.api_key));
    let _ = writeln!(out);
    let _ = writeln!(out, "[forward_proxy]");
    let _ = writeln!(out, "address = {:?}", config.forward_proxy.address());
    let _ = writeln!(out, "user = {:?}", config.forward_proxy.user);
    let _ = writeln!(out, "pass = {}", fingerprint(&config.forward_proxy.pass));
    let _ = writeln!(out);
    let _ = writeln!(out, "[timeouts]");
    let _ = writeln!(out, "proxy_connect_secs = {}", secs(config.timeouts.proxy_connect));
    let _ = writeln!(out, "upstream_idle_secs = {}", secs(config.timeouts.upstream_idle));
    let _ = writeln!(out);
    let _ = writeln!(out, "[logging]");
    let _ = writeln!(out, "level = {:?}", config.logging.level);
    let _ = writeln!(out, "file_enabled = {}", config.logging.file_enabled);
    let _ = writeln!(out, "file_dir = {:?}", config.logging.file_dir.display().to_string());
    let _ = writeln!(out, "file_rotation = {:?}", config.logging.file_rotation.as_str());
    let _ = writeln!(out, "file_prefix = {:?}", config.logging.file_prefix);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_config_show() {
        let cli = Cli::try_parse_from(["copilot-proxy", "config", "--show"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Config { show: true })));

        let cli = Cli::try_parse_from(["copilot-proxy"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_render_hides_secrets() {
        let mut config = Config::default();
        config.service_token = "super-secret-service-token".to_string();
        config.upstream.api_key = "sk-live-abcdef".to_string();
        config.forward_proxy.pass = "hunter2".to_string();
        config.timeouts.upstream_idle = None;

        let out = render_config(&config);
        assert!(!out.contains("super-secret-service-token"));
        assert!(!out.contains("sk-live-abcdef"));
        assert!(!out.contains("hunter2"));
        assert!(out.contains(&fingerprint("hunter2")));
        assert!(out.contains("upstream_idle_secs = 0 (disabled)"));
        assert!(out.contains("proxy_connect_secs = 30"));
        assert!(!out.contains("WARNING"));
    }

    #[test]
    fn test_render_warns_on_default_token() {
        let out = render_config(&Config::default());
        assert!(out.contains("# WARNING: service token is the built-in default"));
        assert!(out.contains("api_key = <unset>"));
    }
}
