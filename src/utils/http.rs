//! HTTP utility functions

use hyper::{header, Body, Response, StatusCode};

/// Check if a header is a hop-by-hop header
pub fn is_hop_by_hop_header(name: &str) -> bool {
    const HOP_BY_HOP_HEADERS: [&str; 9] = [
        "connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "proxy-connection",
        "te",
        "trailer",
        "transfer-encoding",
        "upgrade",
    ];

    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// Lower-cased header names listed in `Connection` values; they are hop-by-hop too
pub fn connection_tokens<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    values
        .into_iter()
        .flat_map(|value| value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Parse host and port from CONNECT target (`host:port` or `[v6]:port`)
pub fn parse_connect_target(target: &str) -> Result<(String, u16), String> {
    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| format!("Invalid CONNECT target format: {}", target))?;

    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(format!("Invalid CONNECT target format: {}", target));
    }

    let port = port
        .parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| format!("Invalid CONNECT port in: {}", target))?;

    Ok((host.to_string(), port))
}

/// Build a plain-text error response
pub fn build_error_response(status: StatusCode, message: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(message.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_by_hop() {
        assert!(is_hop_by_hop_header("Connection"));
        assert!(is_hop_by_hop_header("proxy-connection"));
        assert!(!is_hop_by_hop_header("Host"));
        assert!(!is_hop_by_hop_header("content-length"));
    }

    #[test]
    fn test_connection_tokens() {
        let tokens = connection_tokens(["keep-alive, X-Trace-Id", " Upgrade ,"]);
        assert_eq!(tokens, vec!["keep-alive", "x-trace-id", "upgrade"]);
        assert!(connection_tokens(Vec::<&str>::new()).is_empty());
    }

    #[test]
    fn test_parse_connect_target() {
        assert_eq!(parse_connect_target("api.example.com:443").unwrap(), ("api.example.com".to_string(), 443));
        assert_eq!(parse_connect_target("[::1]:8443").unwrap(), ("::1".to_string(), 8443));
        assert!(parse_connect_target("api.example.com").is_err());
        assert!(parse_connect_target("api.example.com:0").is_err());
        assert!(parse_connect_target(":443").is_err());
    }

    #[test]
    fn test_error_response() {
        let response = build_error_response(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }
}
