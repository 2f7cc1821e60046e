//! Route rules and the ordered table they live in

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// One exact `(host, path)` → `(host, port, path)` redirection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    /// Label used in log lines
    pub name: String,
    pub match_host: String,
    /// Compared against the request path without its query string
    pub match_path: String,
    pub target_host: String,
    #[serde(default = "default_target_port")]
    pub target_port: u16,
    /// Replaces the request path verbatim
    pub target_path: String,
}

fn default_target_port() -> u16 {
    443
}

impl RouteRule {
    pub fn new(
        name: impl Into<String>,
        match_host: impl Into<String>,
        match_path: impl Into<String>,
        target: (&str, u16, &str),
    ) -> Self {
        let (target_host, target_port, target_path) = target;
        Self {
            name: name.into(),
            match_host: match_host.into(),
            match_path: match_path.into(),
            target_host: target_host.to_string(),
            target_port,
            target_path: target_path.to_string(),
        }
    }

    /// Exact, case-insensitive comparison. `host` must already be lower-case.
    pub(crate) fn matches(&self, host: &str, path: &str) -> bool {
        host == self.match_host && path.to_lowercase() == self.match_path.to_lowercase()
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_route("<unnamed>", "name must not be empty"));
        }
        if self.match_host.is_empty() {
            return Err(Error::invalid_route(&self.name, "match_host must not be empty"));
        }
        if self.target_host.is_empty() {
            return Err(Error::invalid_route(&self.name, "target_host must not be empty"));
        }
        if let Err(e) = url::Host::parse(&self.target_host) {
            return Err(Error::invalid_route(
                &self.name,
                format!("target_host '{}' is not a valid host: {}", self.target_host, e),
            ));
        }
        if !self.match_path.starts_with('/') {
            return Err(Error::invalid_route(&self.name, "match_path must start with '/'"));
        }
        if !self.target_path.starts_with('/') {
            return Err(Error::invalid_route(&self.name, "target_path must start with '/'"));
        }
        if self.target_path.contains('?') {
            return Err(Error::invalid_route(&self.name, "target_path must not carry a query string"));
        }
        if self.target_port == 0 {
            return Err(Error::invalid_route(&self.name, "target_port must be between 1 and 65535"));
        }
        Ok(())
    }
}

/// Ordered, immutable set of rules. Lookup is first-match-wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Validate `rules` and freeze them in the given order.
    ///
    /// Match hosts are lower-cased here so lookups only lower-case the
    /// request side. Shadowed duplicates are kept but reported.
    pub fn new(rules: Vec<RouteRule>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(rules.len());

        for mut rule in rules {
            rule.validate()?;
            rule.match_host = rule.match_host.to_lowercase();

            let key = (rule.match_host.clone(), rule.match_path.to_lowercase());
            if !seen.insert(key) {
                warn!(
                    "Route '{}' duplicates an earlier {}{} rule and will never match",
                    rule.name, rule.match_host, rule.match_path
                );
            }
            debug!(
                "Loaded route {}: {}{} -> {}:{}{}",
                rule.name, rule.match_host, rule.match_path, rule.target_host, rule.target_port, rule.target_path
            );
            normalized.push(rule);
        }

        Ok(Self { rules: normalized })
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
