//! Route table inspection commands

use crate::config::settings::ProxyConfig;
use crate::router::{rewrite, RouteTable};
use crate::utils::request_from_url;
use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};

#[derive(Debug, Subcommand)]
pub enum RoutesCommand {
    /// Validate the configured routes and list them
    Check,

    /// Show where a URL would be sent
    Test(TestRouteArgs),
}

#[derive(Debug, Args)]
pub struct TestRouteArgs {
    /// Absolute http(s) URL, e.g. https://api.example.com/v1/status?id=1
    pub url: String,
}

impl RoutesCommand {
    pub async fn execute(&self, config: &ProxyConfig) -> Result<()> {
        let table = config.route_table()?;
        match self {
            RoutesCommand::Check => {
                for line in describe_routes(&table) {
                    println!("{}", line);
                }
                println!("{} route(s) OK", table.len());
            }
            RoutesCommand::Test(args) => println!("{}", test_url(&table, &args.url)?),
        }
        Ok(())
    }
}

pub fn describe_routes(table: &RouteTable) -> Vec<String> {
    table
        .rules()
        .iter()
        .map(|rule| {
            format!(
                "{}: {}{} -> https://{}:{}{}",
                rule.name, rule.match_host, rule.match_path, rule.target_host, rule.target_port, rule.target_path
            )
        })
        .collect()
}

/// One-line verdict for `url`: the matching rule and rewritten URL, or pass-through
pub fn test_url(table: &RouteTable, url: &str) -> Result<String> {
    let request = request_from_url(url).map_err(|e| anyhow!(e))?;

    Ok(match crate::router::find_rule(table, &request.host, &request.path) {
        Some(rule) => {
            let rewritten = rewrite(&request, rule);
            format!("{} -> {} (rule {})", url, rewritten.target_url, rewritten.rule_name)
        }
        None => format!("{} -> pass-through", url),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::RouteRule;

    fn table() -> RouteTable {
        RouteTable::new(vec![RouteRule::new(
            "status",
            "api.example.com",
            "/v1/status",
            ("mirror.example.net", 443, "/mirror/status.php"),
        )])
        .unwrap()
    }

    #[test]
    fn test_url_matching_rule() {
        let line = test_url(&table(), "https://API.example.com/v1/status?id=42").unwrap();
        assert_eq!(
            line,
            "https://API.example.com/v1/status?id=42 -> https://mirror.example.net/mirror/status.php?id=42 (rule status)"
        );
    }

    #[test]
    fn test_url_pass_through() {
        let line = test_url(&table(), "http://api.example.com/v1/other").unwrap();
        assert!(line.ends_with("pass-through"));
        assert!(test_url(&table(), "ftp://api.example.com/").is_err());
    }

    #[test]
    fn test_describe_routes() {
        let lines = describe_routes(&table());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], "status: api.example.com/v1/status -> https://mirror.example.net:443/mirror/status.php");
    }
}
