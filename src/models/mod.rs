//! Request and response views handed to addons

mod headers;

pub use headers::Headers;

use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use std::net::{Ipv6Addr, SocketAddr};

/// URL scheme of an intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed request as it travels through the addon chain.
///
/// `path` is the request target including any `?query` suffix. An absent
/// host is represented by the empty string.
#[derive(Debug, Clone, Serialize)]
pub struct InterceptedRequest {
    pub method: String,
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub headers: Headers,
    #[serde(skip)]
    pub body: Bytes,
    pub client_addr: Option<SocketAddr>,
}

impl InterceptedRequest {
    pub fn new(method: impl Into<String>, scheme: Scheme, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            scheme,
            host: host.into(),
            port: scheme.default_port(),
            path: path.into(),
            headers: Headers::new(),
            body: Bytes::new(),
            client_addr: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Path with the query string stripped
    pub fn path_without_query(&self) -> &str {
        split_query(&self.path).0
    }

    /// Text after the first `?`, if any
    pub fn query(&self) -> Option<&str> {
        split_query(&self.path).1
    }

    /// `host` or `host:port` when the port is not the scheme default.
    /// Bare IPv6 hosts are bracketed.
    pub fn authority(&self) -> String {
        let host = if self.host.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };

        if self.port == self.scheme.default_port() {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// Absolute URL the request will be sent to
    pub fn url(&self) -> String {
        let path = if self.path.is_empty() { "/" } else { self.path.as_str() };
        format!("{}://{}{}", self.scheme, self.authority(), path)
    }
}

/// What response hooks get to see of an upstream answer
#[derive(Debug, Clone, Serialize)]
pub struct InterceptedResponse {
    pub status: u16,
    pub headers: Headers,
}

impl InterceptedResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
        }
    }
}

/// Split a request target on the first `?`.
pub fn split_query(path_with_query: &str) -> (&str, Option<&str>) {
    match path_with_query.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path_with_query, None),
    }
}
