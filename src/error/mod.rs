//! Error handling module for the proxy server

use thiserror::Error;
use tokio::time::error::Elapsed;

/// Custom error type for the proxy server
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("HTTP message error: {0}")]
    HttpBuild(#[from] hyper::http::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid route '{name}': {reason}")]
    InvalidRoute { name: String, reason: String },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Upstream connection error: {0}")]
    Upstream(String),

    #[error("Request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("Timeout error: {0}")]
    Timeout(#[from] Elapsed),
}

/// Result type for the proxy server
pub type Result<T> = std::result::Result<T, Error>;

impl From<rcgen::RcgenError> for Error {
    fn from(err: rcgen::RcgenError) -> Self {
        Error::Certificate(err.to_string())
    }
}

impl From<rustls::Error> for Error {
    fn from(err: rustls::Error) -> Self {
        Error::Tls(err.to_string())
    }
}

impl Error {
    pub(crate) fn invalid_route(name: &str, reason: impl Into<String>) -> Self {
        Error::InvalidRoute {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
