//! Main entry point for the Route Rewrite Proxy

use clap::{Parser, Subcommand};
use route_rewrite_proxy::{
    cli::{CertCommand, RoutesCommand, ServerArgs},
    init_logger_with_config, log_error, log_info,
    runtime::run_with_runtime,
    ProxyConfig,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "route-rewrite-proxy")]
#[command(about = "An intercepting HTTP/HTTPS forward proxy that redirects configured endpoints")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the YAML config file (default: ./config.yml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy server (default)
    #[command(name = "serve")]
    Serve(ServerArgs),

    /// Certificate authority management
    #[command(name = "cert")]
    #[command(subcommand)]
    Cert(CertCommand),

    /// Inspect the configured route table
    #[command(name = "routes")]
    #[command(subcommand)]
    Routes(RoutesCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if needs_config(&cli.command) {
        match ProxyConfig::load_config(cli.config.as_deref()) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        ProxyConfig::default()
    };

    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        cli.log_level.clone().unwrap_or_else(|| config.log_level.clone())
    };
    let _log_guard = init_logger_with_config(&log_level, &config.logging);

    let runtime_config = config.runtime.clone();
    run_with_runtime(&runtime_config, async_main(cli, config))
}

/// Certificate commands work from their own flags, never from the config file
fn needs_config(command: &Option<Commands>) -> bool {
    !matches!(command, Some(Commands::Cert(_)))
}

async fn async_main(cli: Cli, config: ProxyConfig) -> anyhow::Result<()> {
    let result = match cli.command {
        Some(Commands::Cert(cert_cmd)) => {
            log_info!("🔧 Certificate Management");
            cert_cmd.execute().await
        }
        Some(Commands::Routes(routes_cmd)) => routes_cmd.execute(&config).await,
        Some(Commands::Serve(args)) => start(args, config).await,
        None => {
            log_info!("💡 Use --help to see available commands");
            start(ServerArgs::default(), config).await
        }
    };

    if let Err(e) = &result {
        log_error!("{:#}", e);
    }
    result
}

async fn start(args: ServerArgs, config: ProxyConfig) -> anyhow::Result<()> {
    log_info!("🚀 Starting Route Rewrite Proxy");
    log_info!("📋 Version: {}", env!("CARGO_PKG_VERSION"));
    args.start_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cert_commands_skip_config_loading() {
        let cli = parse(&["route-rewrite-proxy", "--config", "missing.yml", "cert", "generate-ca"]);
        assert!(!needs_config(&cli.command));
        let cli = parse(&["route-rewrite-proxy", "cert", "issue", "api.example.com"]);
        assert!(!needs_config(&cli.command));
    }

    #[test]
    fn test_serve_and_routes_load_config() {
        assert!(needs_config(&parse(&["route-rewrite-proxy"]).command));
        assert!(needs_config(&parse(&["route-rewrite-proxy", "serve"]).command));
        assert!(needs_config(&parse(&["route-rewrite-proxy", "routes", "check"]).command));
    }
}
