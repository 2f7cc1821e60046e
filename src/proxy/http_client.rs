//! HTTP Client Management
//!
//! One pooled hyper client serves every upstream request, plain HTTP and
//! HTTPS alike, so connections to rewritten targets are reused across
//! requests.

use crate::config::settings::{HttpClientConfig, TlsConfig};
use crate::error::Result;
use crate::tls::create_client_config;
use hyper::client::HttpConnector;
use hyper::{Body, Client};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use std::time::Duration;
use tracing::info;

pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Shared upstream client with connection pooling
pub struct HttpClient {
    client: UpstreamClient,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create the client from the `http_client` and `tls` config sections
    pub fn from_config(config: &HttpClientConfig, tls: &TlsConfig) -> Result<Self> {
        info!("🚀 Initializing HTTP client with connection pooling");
        info!("   Max idle connections per host: {}", config.max_idle_per_host);
        info!("   Idle timeout: {}s", config.idle_timeout_secs);
        info!("   Connect timeout: {}s", config.connect_timeout_secs);

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false);
        http_connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        http_connector.set_nodelay(true);
        if config.tcp_keepalive {
            http_connector.set_keepalive(Some(Duration::from_secs(30)));
        }

        let https_connector = HttpsConnectorBuilder::new()
            .with_tls_config(create_client_config(tls)?)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build(https_connector);

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn client(&self) -> &UpstreamClient {
        &self.client
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}
