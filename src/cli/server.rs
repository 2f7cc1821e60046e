//! Server management CLI commands

use crate::config::settings::ProxyConfig;
use crate::proxy::{AddonChain, ProxyServer};
use crate::router::Router;
use anyhow::{Context, Result};
use clap::Args;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Default, Args)]
pub struct ServerArgs {
    /// HTTP proxy listening address (overrides the config file)
    #[arg(long)]
    pub listen_addr: Option<SocketAddr>,

    /// Relay CONNECT tunnels without decrypting them
    #[arg(long, default_value = "false")]
    pub no_interception: bool,

    /// Skip upstream certificate verification (insecure)
    #[arg(long, default_value = "false")]
    pub skip_upstream_verify: bool,

    /// Request timeout in seconds (overrides the config file)
    #[arg(long)]
    pub request_timeout: Option<u64>,
}

impl ServerArgs {
    /// Layer CLI flags over the loaded configuration
    pub fn apply_to(&self, config: &mut ProxyConfig) {
        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if let Some(timeout) = self.request_timeout {
            config.request_timeout = timeout;
        }
        if self.no_interception {
            config.tls.interception_enabled = false;
        }
        if self.skip_upstream_verify {
            config.tls.skip_upstream_cert_verify = true;
        }
        debug!("ProxyConfig after CLI overrides: listen {}", config.listen_addr);
    }

    /// Start the proxy server with the router installed
    pub async fn start_server(&self, mut config: ProxyConfig) -> Result<()> {
        self.apply_to(&mut config);
        config.validate().context("Invalid configuration")?;

        let table = Arc::new(config.route_table()?);

        info!("📋 Server Configuration:");
        info!("   HTTP proxy: {}", config.listen_addr);
        info!(
            "   Interception: {}",
            if config.tls.interception_enabled { "enabled" } else { "disabled" }
        );
        if config.tls.interception_enabled {
            info!("   Root CA: {}", config.tls.ca_cert_path);
        }
        info!("   Request timeout: {}s", config.request_timeout);
        info!("   Max body size: {} bytes", config.max_body_size);
        info!("   Routes: {}", table.len());
        for rule in table.rules() {
            info!(
                "     {} : {}{} -> {}:{}{}",
                rule.name, rule.match_host, rule.match_path, rule.target_host, rule.target_port, rule.target_path
            );
        }

        let addons = AddonChain::new().with(Arc::new(Router::with_tracing(table)));
        let server = ProxyServer::new(&config, addons)?;
        server.start().await?;
        Ok(())
    }
}
