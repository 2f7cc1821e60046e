//! Console sink for route and response lines

use chrono::Local;
use tracing::info;

/// Receives the one-line route/response summaries.
///
/// Implementations may be called from many requests at once; lines from
/// concurrent requests are allowed to interleave.
pub trait RouteLog: Send + Sync {
    fn log(&self, line: &str);
}

/// Writes each line at INFO level through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRouteLog;

impl RouteLog for TracingRouteLog {
    fn log(&self, line: &str) {
        info!(target: "route", "{}", line);
    }
}

/// Local wall-clock time as `HH:MM:SS`
pub fn clock() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

pub fn route_line(timestamp: &str, rule_name: &str, target_url: &str) -> String {
    format!("[{}] ROUTE {}: -> {}", timestamp, rule_name, target_url)
}

pub fn response_line(timestamp: &str, status: u16, host: &str, path: &str) -> String {
    format!("[{}] RESP {} for {}{}", timestamp, status, host, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_formats() {
        assert_eq!(
            route_line("09:05:01", "status", "https://mirror.example.net/mirror/status.php?id=42"),
            "[09:05:01] ROUTE status: -> https://mirror.example.net/mirror/status.php?id=42"
        );
        assert_eq!(
            response_line("23:59:59", 204, "mirror.example.net", "/mirror/status.php"),
            "[23:59:59] RESP 204 for mirror.example.net/mirror/status.php"
        );
    }

    #[test]
    fn test_clock_shape() {
        let now = clock();
        assert_eq!(now.len(), 8);
        assert_eq!(now.as_bytes()[2], b':');
        assert_eq!(now.as_bytes()[5], b':');
    }
}
