//! Configuration management

pub mod settings;

pub use settings::{HttpClientConfig, LoggingConfig, ProxyConfig, RuntimeConfig, TlsConfig, DEFAULT_CONFIG_PATH};
