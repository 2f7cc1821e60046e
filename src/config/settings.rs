//! Proxy server configuration settings

use crate::error::{Error, Result};
use crate::router::{RouteRule, RouteTable};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tracing::{debug, info};

/// Config file read when no explicit path is given
pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

/// Main configuration for the proxy server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Server listening address
    pub listen_addr: SocketAddr,

    /// Log level configuration
    pub log_level: String,

    /// Upstream request timeout in seconds
    pub request_timeout: u64,

    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// TLS configuration for HTTPS interception
    pub tls: TlsConfig,

    /// Upstream HTTP client configuration
    pub http_client: HttpClientConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Runtime configuration
    pub runtime: RuntimeConfig,

    /// Redirection rules, matched in order
    pub routes: Vec<RouteRule>,
}

/// TLS configuration for HTTPS interception
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Decrypt CONNECT tunnels; when false they are relayed blind
    pub interception_enabled: bool,

    /// Path to CA certificate for signing domain certificates
    pub ca_cert_path: String,

    /// Path to CA private key for signing domain certificates
    pub ca_key_path: String,

    /// Generate and save a CA if the files above don't exist
    pub auto_generate_ca: bool,

    /// Organization name for a generated CA
    pub ca_organization: String,

    /// Common name for a generated CA
    pub ca_common_name: String,

    /// Validity of a generated CA in days
    pub ca_validity_days: u32,

    /// Validity of issued domain certificates in days
    pub leaf_validity_days: u32,

    /// How long issued domain certificates stay cached
    pub cert_cache_ttl_secs: u64,

    /// Maximum number of cached domain certificates
    pub cert_cache_max_entries: usize,

    /// Skip upstream certificate verification (for testing)
    pub skip_upstream_cert_verify: bool,

    /// Extra root CA trusted for upstream connections
    pub root_ca_cert_path: Option<String>,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Maximum idle connections per host
    pub max_idle_per_host: usize,

    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Enable TCP keepalive
    pub tcp_keepalive: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write logs to a daily rolling file
    pub enable_file_logging: bool,

    /// Directory for log files
    pub log_dir: String,

    /// Log file name prefix
    pub file_prefix: String,
}

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Runtime mode: "single_threaded" or "multi_threaded"
    pub mode: String,

    /// Number of worker threads for multi-threaded mode (None = auto-detect CPU cores)
    pub worker_threads: Option<usize>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_level: "info".to_string(),
            request_timeout: 30,
            max_body_size: 10 * 1024 * 1024, // 10MB
            tls: TlsConfig::default(),
            http_client: HttpClientConfig::default(),
            logging: LoggingConfig::default(),
            runtime: RuntimeConfig::default(),
            routes: Vec::new(),
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            interception_enabled: true,
            ca_cert_path: "ca-certs/rootCA.crt".to_string(),
            ca_key_path: "ca-certs/rootCA.key".to_string(),
            auto_generate_ca: true,
            ca_organization: "Route Rewrite Proxy".to_string(),
            ca_common_name: "Route Rewrite Proxy CA".to_string(),
            ca_validity_days: 3650,
            leaf_validity_days: 30,
            cert_cache_ttl_secs: 24 * 60 * 60,
            cert_cache_max_entries: 1000,
            skip_upstream_cert_verify: false, // Verify upstream certs by default
            root_ca_cert_path: None,
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 50,
            idle_timeout_secs: 90,
            connect_timeout_secs: 10,
            tcp_keepalive: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_file_logging: false,
            log_dir: "logs".to_string(),
            file_prefix: "proxy.log".to_string(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: "multi_threaded".to_string(),
            worker_threads: None, // Auto-detect CPU cores
        }
    }
}

impl ProxyConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config = Self::from_yaml_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file {}: {}", path.display(), e)))?;

        debug!("Loaded {} routes from {}", config.routes.len(), path.display());
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Load configuration with environment variable overrides, then validate.
    ///
    /// An explicit `path` must exist. Without one, `config.yml` is used if
    /// present and the built-in defaults otherwise.
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_yaml_file(DEFAULT_CONFIG_PATH)?,
            None => {
                info!("No {} found, using built-in defaults", DEFAULT_CONFIG_PATH);
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override settings from environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr_str) = std::env::var("PROXY_LISTEN_ADDR") {
            if let Ok(addr) = addr_str.parse() {
                self.listen_addr = addr;
            }
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.log_level = log_level;
        }

        if let Ok(timeout) = std::env::var("PROXY_REQUEST_TIMEOUT") {
            if let Ok(timeout) = timeout.parse() {
                self.request_timeout = timeout;
            }
        }

        if let Ok(max_size) = std::env::var("PROXY_MAX_BODY_SIZE") {
            if let Ok(max_size) = max_size.parse() {
                self.max_body_size = max_size;
            }
        }

        if let Ok(interception) = std::env::var("TLS_INTERCEPTION_ENABLED") {
            self.tls.interception_enabled = interception.to_lowercase() == "true";
        }

        if let Ok(ca_cert) = std::env::var("TLS_CA_CERT_PATH") {
            self.tls.ca_cert_path = ca_cert;
        }

        if let Ok(ca_key) = std::env::var("TLS_CA_KEY_PATH") {
            self.tls.ca_key_path = ca_key;
        }

        if let Ok(skip) = std::env::var("TLS_SKIP_UPSTREAM_CERT_VERIFY") {
            self.tls.skip_upstream_cert_verify = skip.to_lowercase() == "true";
        }

        if let Ok(enable_file_logging) = std::env::var("PROXY_ENABLE_FILE_LOGGING") {
            self.logging.enable_file_logging = enable_file_logging.to_lowercase() == "true";
        }
    }

    /// Check numeric limits and every route
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout == 0 {
            return Err(Error::Config("request_timeout must be greater than 0".to_string()));
        }
        if self.tls.leaf_validity_days == 0 || self.tls.ca_validity_days == 0 {
            return Err(Error::Config("Certificate validity period must be greater than 0".to_string()));
        }
        if self.tls.cert_cache_max_entries == 0 {
            return Err(Error::Config("cert_cache_max_entries must be greater than 0".to_string()));
        }
        match self.runtime.mode.as_str() {
            "single_threaded" | "multi_threaded" => {}
            other => return Err(Error::Config(format!("Unknown runtime mode '{}'", other))),
        }
        self.route_table().map(|_| ())
    }

    /// Build the immutable route table from `routes`
    pub fn route_table(&self) -> Result<RouteTable> {
        RouteTable::new(self.routes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
listen_addr: "127.0.0.1:9090"
request_timeout: 15
tls:
  interception_enabled: false
routes:
  - name: status
    match_host: API.example.com
    match_path: /v1/status
    target_host: mirror.example.net
    target_port: 443
    target_path: /mirror/status.php
  - name: feed
    match_host: feeds.example.org
    match_path: /acme/notices/main/feed.json
    target_host: mirror.example.net
    target_path: /mirror/feed.json
"#;

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.listen_addr.port(), 8080);
        assert!(config.tls.interception_enabled);
        assert!(config.routes.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = ProxyConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.listen_addr.port(), 9090);
        assert_eq!(config.request_timeout, 15);
        assert!(!config.tls.interception_enabled);
        assert_eq!(config.tls.ca_key_path, "ca-certs/rootCA.key");
        assert_eq!(config.max_body_size, 10 * 1024 * 1024);

        let table = config.route_table().unwrap();
        let names: Vec<_> = table.rules().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["status", "feed"]);
        assert_eq!(table.rules()[0].match_host, "api.example.com");
        assert_eq!(table.rules()[1].target_port, 443);
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = ProxyConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.routes.len(), 2);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = ProxyConfig::load_config(Some(Path::new("/nonexistent/proxy.yml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_route() {
        let yaml = r#"
routes:
  - name: broken
    match_host: api.example.com
    match_path: /a
    target_host: mirror.example.net
    target_port: 0
    target_path: /b
"#;
        let config = ProxyConfig::from_yaml_str(yaml).unwrap();
        assert!(matches!(config.validate(), Err(Error::InvalidRoute { .. })));
    }

    #[test]
    fn test_port_out_of_range_fails_to_parse() {
        let yaml = r#"
routes:
  - name: big
    match_host: api.example.com
    match_path: /a
    target_host: mirror.example.net
    target_port: 70000
    target_path: /b
"#;
        assert!(ProxyConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_runtime_mode() {
        let mut config = ProxyConfig::default();
        config.runtime.mode = "multi_process".to_string();
        assert!(config.validate().is_err());
    }
}
