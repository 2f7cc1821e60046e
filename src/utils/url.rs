//! URL utility functions

use crate::models::{InterceptedRequest, Scheme};
use url::Url;

/// Turn an absolute `http(s)://` URL into a bare GET request
pub fn request_from_url(url_str: &str) -> Result<InterceptedRequest, String> {
    let url = Url::parse(url_str).map_err(|e| format!("Invalid URL '{}': {}", url_str, e))?;

    let scheme = match url.scheme() {
        "http" => Scheme::Http,
        "https" => Scheme::Https,
        other => return Err(format!("Unsupported scheme '{}'", other)),
    };

    let host = url.host_str().unwrap_or_default().to_string();
    let port = url.port().unwrap_or_else(|| scheme.default_port());
    let path = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };

    Ok(InterceptedRequest::new("GET", scheme, host, path).with_port(port))
}
