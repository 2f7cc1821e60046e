//! Exact host/path request redirection
//!
//! The router looks the request's host and query-less path up in a
//! [`RouteTable`]. On a hit the request is re-pointed at the rule's target
//! origin: scheme becomes `https`, host/port/path come from the rule and
//! only the original query string survives. Misses are passed through
//! untouched.

mod sink;
mod table;

pub use sink::{clock, response_line, route_line, RouteLog, TracingRouteLog};
pub use table::{RouteRule, RouteTable};

use crate::models::{split_query, InterceptedRequest, InterceptedResponse, Scheme};
use crate::proxy::addon::Addon;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Result of applying a rule to a request
#[derive(Debug, Clone)]
pub struct RewrittenRequest {
    pub rule_name: String,
    /// `https://<target_host><target_path>[?<query>]`
    pub target_url: String,
    pub request: InterceptedRequest,
}

/// Find the first rule matching `host` and the query-less part of `raw_path`.
///
/// `host` is lower-cased before comparison; an absent host should be passed
/// as `""`. Matching is exact: no prefixes, no trailing-slash tolerance.
pub fn find_rule<'a>(table: &'a RouteTable, host: &str, raw_path: &str) -> Option<&'a RouteRule> {
    let host = host.to_lowercase();
    let (path, _) = split_query(raw_path);
    table.rules().iter().find(|rule| rule.matches(&host, path))
}

/// Re-point `request` at `rule`'s target. Pure: the input is not modified.
pub fn rewrite(request: &InterceptedRequest, rule: &RouteRule) -> RewrittenRequest {
    let query = request.query().filter(|q| !q.is_empty());
    let path = match query {
        Some(q) => format!("{}?{}", rule.target_path, q),
        None => rule.target_path.clone(),
    };

    let mut rewritten = request.clone();
    rewritten.scheme = Scheme::Https;
    rewritten.host = rule.target_host.clone();
    rewritten.port = rule.target_port;
    rewritten.path = path;

    let origin = format!("https://{}", rule.target_host);
    rewritten.headers.set("Host", rule.target_host.as_str());
    rewritten.headers.set("Referer", format!("{}/", origin));
    rewritten.headers.set("Origin", origin.as_str());
    // upstream answers uncompressed; the transport recomputes the length
    rewritten.headers.remove("Accept-Encoding");
    rewritten.headers.remove("Content-Length");

    RewrittenRequest {
        rule_name: rule.name.clone(),
        target_url: format!("{}{}", origin, rewritten.path),
        request: rewritten,
    }
}

/// Request hook that applies a [`RouteTable`]
pub struct Router {
    table: Arc<RouteTable>,
    sink: Arc<dyn RouteLog>,
}

impl Router {
    pub fn new(table: Arc<RouteTable>, sink: Arc<dyn RouteLog>) -> Self {
        Self { table, sink }
    }

    /// Router that reports through `tracing`
    pub fn with_tracing(table: Arc<RouteTable>) -> Self {
        Self::new(table, Arc::new(TracingRouteLog))
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn find_rule(&self, host: &str, raw_path: &str) -> Option<&RouteRule> {
        find_rule(&self.table, host, raw_path)
    }

    /// Rewrite `request` in place if a rule matches. Returns whether it did.
    pub fn handle_request(&self, request: &mut InterceptedRequest) -> bool {
        let Some(rule) = self.find_rule(&request.host, &request.path) else {
            debug!("No route for {}{}, passing through", request.host, request.path);
            return false;
        };

        let rewritten = rewrite(request, rule);
        self.sink.log(&route_line(&clock(), &rewritten.rule_name, &rewritten.target_url));
        *request = rewritten.request;
        true
    }

    /// Report the status the upstream answered with
    pub fn handle_response(&self, request: &InterceptedRequest, response: &InterceptedResponse) {
        self.sink
            .log(&response_line(&clock(), response.status, &request.host, &request.path));
    }
}

#[async_trait]
impl Addon for Router {
    fn name(&self) -> &str {
        "router"
    }

    async fn on_request(&self, request: &mut InterceptedRequest) {
        self.handle_request(request);
    }

    async fn on_response(&self, request: &InterceptedRequest, response: &InterceptedResponse) {
        self.handle_response(request, response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Headers;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLog {
        lines: Mutex<Vec<String>>,
    }

    impl RouteLog for RecordingLog {
        fn log(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }
    }

    impl RecordingLog {
        fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    fn sample_table() -> RouteTable {
        RouteTable::new(vec![
            RouteRule::new("status", "api.example.com", "/v1/status", ("mirror.example.net", 443, "/mirror/status.php")),
            RouteRule::new("status-alt", "api.example.com", "/v1/_status", ("mirror.example.net", 443, "/mirror/alt.php")),
            RouteRule::new(
                "feed",
                "feeds.example.org",
                "/acme/notices/main/feed.json",
                ("mirror.example.net", 443, "/mirror/feed.json"),
            ),
        ])
        .unwrap()
    }

    fn router() -> (Router, Arc<RecordingLog>) {
        let log = Arc::new(RecordingLog::default());
        (Router::new(Arc::new(sample_table()), log.clone()), log)
    }

    fn request(host: &str, path: &str) -> InterceptedRequest {
        let headers: Headers = [
            ("Host", host),
            ("Accept-Encoding", "gzip, br"),
            ("Content-Length", "12"),
            ("User-Agent", "curl/8.0"),
        ]
        .into_iter()
        .collect();
        InterceptedRequest::new("POST", Scheme::Http, host, path)
            .with_headers(headers)
            .with_body(bytes::Bytes::from_static(b"hello=world!"))
    }

    /// Strip the `[HH:MM:SS] ` prefix
    fn body(line: &str) -> &str {
        &line[11..]
    }

    #[test]
    fn test_mixed_case_host_is_rewritten() {
        let (router, log) = router();
        let mut req = request("API.EXAMPLE.COM", "/v1/status?id=42");

        assert!(router.handle_request(&mut req));

        assert_eq!(req.scheme, Scheme::Https);
        assert_eq!(req.host, "mirror.example.net");
        assert_eq!(req.port, 443);
        assert_eq!(req.path, "/mirror/status.php?id=42");
        assert_eq!(req.headers.get("host"), Some("mirror.example.net"));
        assert_eq!(req.headers.get("origin"), Some("https://mirror.example.net"));
        assert_eq!(req.headers.get("referer"), Some("https://mirror.example.net/"));
        assert!(!req.headers.contains("accept-encoding"));
        assert!(!req.headers.contains("content-length"));
        assert_eq!(req.headers.get("user-agent"), Some("curl/8.0"));
        assert_eq!(&req.body[..], b"hello=world!");
        assert_eq!(req.method, "POST");

        let lines = log.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with('['));
        assert_eq!(body(&lines[0]), "ROUTE status: -> https://mirror.example.net/mirror/status.php?id=42");
    }

    #[test]
    fn test_no_query_means_no_trailing_question_mark() {
        let (router, log) = router();
        let mut req = request("api.example.com", "/v1/status");
        assert!(router.handle_request(&mut req));
        assert_eq!(req.path, "/mirror/status.php");
        assert_eq!(body(&log.lines()[0]), "ROUTE status: -> https://mirror.example.net/mirror/status.php");
    }

    #[test]
    fn test_empty_query_is_dropped() {
        let (router, _) = router();
        let mut req = request("api.example.com", "/v1/status?");
        assert!(router.handle_request(&mut req));
        assert_eq!(req.path, "/mirror/status.php");
    }

    #[test]
    fn test_second_rule_on_same_host() {
        let (router, _) = router();
        let mut req = request("api.example.com", "/V1/_STATUS?a=b&c=d");
        assert!(router.handle_request(&mut req));
        assert_eq!(req.path, "/mirror/alt.php?a=b&c=d");
    }

    #[test]
    fn test_feed_rule() {
        let (router, log) = router();
        let mut req = request("feeds.example.org", "/acme/notices/main/feed.json");
        assert!(router.handle_request(&mut req));
        assert_eq!(req.path, "/mirror/feed.json");
        assert!(body(&log.lines()[0]).starts_with("ROUTE feed: "));
    }

    #[test]
    fn test_near_misses_pass_through_unchanged() {
        let (router, log) = router();
        let cases = [
            ("api.example.com", "/v1/status/"),
            ("api.example.com", "/v1/status.php"),
            ("api.example.com", "/v1/./status"),
            ("api.example.com", "/v1"),
            ("api.example.com", ""),
            ("www.api.example.com", "/v1/status"),
            ("", "/v1/status"),
            ("feeds.example.org", "/v1/status"),
        ];
        for (host, path) in cases {
            let original = request(host, path);
            let mut req = original.clone();
            assert!(!router.handle_request(&mut req), "{}{} should not match", host, path);
            assert_eq!(req.host, original.host);
            assert_eq!(req.path, original.path);
            assert_eq!(req.scheme, original.scheme);
            assert_eq!(req.port, original.port);
            assert_eq!(req.headers, original.headers);
        }
        assert!(log.lines().is_empty());
    }

    #[test]
    fn test_rewritten_request_does_not_match_again() {
        let (router, _) = router();
        let mut req = request("api.example.com", "/v1/status?id=1");
        assert!(router.handle_request(&mut req));
        assert!(router.find_rule(&req.host, &req.path).is_none());
        assert!(!router.handle_request(&mut req));
    }

    #[test]
    fn test_first_match_wins() {
        let table = RouteTable::new(vec![
            RouteRule::new("first", "api.example.com", "/dup", ("one.example.net", 443, "/one")),
            RouteRule::new("second", "api.example.com", "/DUP", ("two.example.net", 8443, "/two")),
        ])
        .unwrap();
        let rule = find_rule(&table, "api.example.com", "/dup?x=1").unwrap();
        assert_eq!(rule.name, "first");
    }

    #[test]
    fn test_rewrite_is_pure_and_keeps_custom_port() {
        let rule = RouteRule::new("alt", "api.example.com", "/a", ("mirror.example.net", 8443, "/b"));
        let original = request("api.example.com", "/a?q=1");
        let rewritten = rewrite(&original, &rule);

        assert_eq!(original.host, "api.example.com");
        assert!(original.headers.contains("accept-encoding"));

        assert_eq!(rewritten.request.port, 8443);
        assert_eq!(rewritten.request.url(), "https://mirror.example.net:8443/b?q=1");
        // the logged URL and headers never carry the port
        assert_eq!(rewritten.target_url, "https://mirror.example.net/b?q=1");
        assert_eq!(rewritten.request.headers.get("Host"), Some("mirror.example.net"));
    }

    #[test]
    fn test_rewrite_adds_headers_that_were_missing() {
        let rule = RouteRule::new("bare", "api.example.com", "/a", ("mirror.example.net", 443, "/b"));
        let bare = InterceptedRequest::new("GET", Scheme::Https, "api.example.com", "/a");
        let rewritten = rewrite(&bare, &rule).request;
        assert_eq!(rewritten.headers.len(), 3);
        assert_eq!(rewritten.headers.get("origin"), Some("https://mirror.example.net"));
    }

    #[test]
    fn test_response_line_uses_current_request() {
        let (router, log) = router();
        let mut req = request("api.example.com", "/v1/status?id=9");
        router.handle_request(&mut req);
        router.handle_response(&req, &InterceptedResponse::new(200));

        let lines = log.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(body(&lines[1]), "RESP 200 for mirror.example.net/mirror/status.php?id=9");
    }

    #[test]
    fn test_response_line_for_pass_through() {
        let (router, log) = router();
        let req = request("other.example.com", "/index.html");
        router.handle_response(&req, &InterceptedResponse::new(404));
        assert_eq!(body(&log.lines()[0]), "RESP 404 for other.example.com/index.html");
    }

    #[tokio::test]
    async fn test_addon_hooks_delegate() {
        let (router, log) = router();
        let mut req = request("feeds.example.org", "/acme/notices/main/feed.json");
        Addon::on_request(&router, &mut req).await;
        Addon::on_response(&router, &req, &InterceptedResponse::new(502)).await;

        assert_eq!(req.host, "mirror.example.net");
        assert_eq!(log.lines().len(), 2);
        assert_eq!(router.name(), "router");
    }
}
