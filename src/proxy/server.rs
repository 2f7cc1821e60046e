//! Proxy server implementation

use crate::config::settings::ProxyConfig;
use crate::error::{Error, Result};
use crate::models::{Headers, InterceptedRequest, InterceptedResponse, Scheme};
use crate::proxy::addon::AddonChain;
use crate::proxy::http_client::HttpClient;
use crate::tls::Interceptor;
use crate::utils::{build_error_response, connection_tokens, is_hop_by_hop_header, parse_connect_target};
use crate::{log_debug, log_error, log_info, log_warning};
use bytes::{Bytes, BytesMut};
use hyper::body::HttpBody;
use hyper::header::{HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH, HOST};
use hyper::server::conn::{AddrStream, Http};
use hyper::service::{make_service_fn, service_fn};
use hyper::upgrade::Upgraded;
use hyper::{Body, Method, Request, Response, Server, StatusCode, Uri};
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;
use tracing::{debug, error, info, warn};

/// Everything a request handler needs, shared by all connections
pub struct ProxyState {
    addons: AddonChain,
    client: HttpClient,
    interceptor: Option<Interceptor>,
    request_timeout: Duration,
    max_body_size: usize,
    started_at: Instant,
}

impl ProxyState {
    pub fn new(
        addons: AddonChain,
        client: HttpClient,
        interceptor: Option<Interceptor>,
        request_timeout: Duration,
        max_body_size: usize,
    ) -> Self {
        Self {
            addons,
            client,
            interceptor,
            request_timeout,
            max_body_size,
            started_at: Instant::now(),
        }
    }

    /// Build the upstream client and, if enabled, the TLS interceptor
    pub fn from_config(config: &ProxyConfig, addons: AddonChain) -> Result<Self> {
        let client = HttpClient::from_config(&config.http_client, &config.tls)?;
        let interceptor = if config.tls.interception_enabled {
            Some(Interceptor::from_config(&config.tls)?)
        } else {
            None
        };

        Ok(Self::new(
            addons,
            client,
            interceptor,
            Duration::from_secs(config.request_timeout),
            config.max_body_size,
        ))
    }
}

pub struct ProxyServer {
    listen_addr: SocketAddr,
    state: Arc<ProxyState>,
}

impl ProxyServer {
    /// Create a new proxy server with configuration
    pub fn new(config: &ProxyConfig, addons: AddonChain) -> Result<Self> {
        Ok(Self::with_state(config.listen_addr, ProxyState::from_config(config, addons)?))
    }

    pub fn with_state(listen_addr: SocketAddr, state: ProxyState) -> Self {
        Self {
            listen_addr,
            state: Arc::new(state),
        }
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn start(self) -> Result<()> {
        let listener = std::net::TcpListener::bind(self.listen_addr)?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: std::net::TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        log_info!("Proxy server starting on {}", local_addr);
        log_info!("Addons: [{}]", self.state.addons.names().join(", "));
        log_info!(
            "HTTPS interception: {}",
            if self.state.interceptor.is_some() { "ENABLED" } else { "DISABLED (blind tunnels)" }
        );

        let state = self.state;
        let make_svc = make_service_fn(move |conn: &AddrStream| {
            let remote_addr = conn.remote_addr();
            let state = Arc::clone(&state);
            log_debug!("New connection from: {}", remote_addr);

            async move {
                Ok::<_, Infallible>(service_fn(move |req| handle_request(req, remote_addr, Arc::clone(&state))))
            }
        });

        Server::from_tcp(listener)?
            .serve(make_svc)
            .with_graceful_shutdown(shutdown)
            .await?;

        log_info!("Proxy server on {} stopped", local_addr);
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Handle incoming HTTP request
pub async fn handle_request(
    req: Request<Body>,
    remote_addr: SocketAddr,
    state: Arc<ProxyState>,
) -> std::result::Result<Response<Body>, Infallible> {
    debug!("📥 {} {} from {}", req.method(), req.uri(), remote_addr);

    if req.method() == Method::CONNECT {
        return Ok(handle_connect_request(req, remote_addr, state).await);
    }

    // Origin-form requests are addressed to the proxy itself
    if req.uri().scheme().is_none() {
        if req.uri().path() == "/health" {
            return Ok(handle_health_check(req.method(), &state));
        }
        return Ok(build_error_response(
            StatusCode::BAD_REQUEST,
            "This is a forward proxy: send absolute-form requests or CONNECT",
        ));
    }

    let uri = req.uri().clone();
    let scheme = match uri.scheme_str() {
        Some("https") => Scheme::Https,
        _ => Scheme::Http,
    };
    let host = uri
        .host()
        .map(|host| host.trim_start_matches('[').trim_end_matches(']').to_string())
        .or_else(|| host_header(&req).map(|(host, _)| host))
        .unwrap_or_default();
    let port = uri.port_u16().unwrap_or_else(|| scheme.default_port());

    let request = match read_request(req, scheme, host, port, remote_addr, state.max_body_size).await {
        Ok(request) => request,
        Err(e) => return Ok(body_error_response(e)),
    };

    Ok(process_request(request, &state).await)
}

/// Handle health check endpoint locally
fn handle_health_check(method: &Method, state: &ProxyState) -> Response<Body> {
    if method != Method::GET {
        let mut response = build_error_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        response.headers_mut().insert("allow", HeaderValue::from_static("GET"));
        return response;
    }

    let health_data = json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_ms": state.started_at.elapsed().as_millis() as u64,
        "version": env!("CARGO_PKG_VERSION"),
        "addons": state.addons.names(),
        "interception": state.interceptor.is_some(),
    });

    let mut response = Response::new(Body::from(health_data.to_string()));
    let headers = response.headers_mut();
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers.insert("cache-control", HeaderValue::from_static("no-cache"));
    response
}

/// Handle CONNECT: decrypt when an interceptor is configured, otherwise tunnel
async fn handle_connect_request(req: Request<Body>, remote_addr: SocketAddr, state: Arc<ProxyState>) -> Response<Body> {
    let target = req.uri().authority().map(|a| a.to_string()).unwrap_or_default();
    let (host, port) = match parse_connect_target(&target) {
        Ok(target) => target,
        Err(msg) => {
            log_error!("{}", msg);
            return build_error_response(StatusCode::BAD_REQUEST, "Invalid CONNECT target");
        }
    };

    match &state.interceptor {
        Some(interceptor) => {
            let acceptor = match interceptor.acceptor_for(&host) {
                Ok(acceptor) => acceptor,
                Err(e) => {
                    error!("Failed to prepare certificate for {}: {}", host, e);
                    return build_error_response(StatusCode::INTERNAL_SERVER_ERROR, "Certificate generation failed");
                }
            };

            debug!("🔍 CONNECT {}:{} - intercepting", host, port);
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                let upgraded = match hyper::upgrade::on(req).await {
                    Ok(upgraded) => upgraded,
                    Err(e) => {
                        error!("Failed to upgrade connection for {}:{}: {}", host, port, e);
                        return;
                    }
                };
                match acceptor.accept(upgraded).await {
                    Ok(tls_stream) => serve_intercepted_connection(tls_stream, host, port, remote_addr, state).await,
                    Err(e) => warn!("❌ TLS handshake failed for {}:{}: {}", host, port, e),
                }
            });
        }
        None => {
            let mut upstream = match TcpStream::connect((host.as_str(), port)).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("❌ CONNECT failed to {}:{}: {}", host, port, e);
                    return build_error_response(StatusCode::BAD_GATEWAY, "Upstream connection failed");
                }
            };

            debug!("🔐 CONNECT {}:{} - tunneling", host, port);
            tokio::spawn(async move {
                match hyper::upgrade::on(req).await {
                    Ok(mut upgraded) => {
                        if let Err(e) = tokio::io::copy_bidirectional(&mut upgraded, &mut upstream).await {
                            debug!("Tunnel to {}:{} closed: {}", host, port, e);
                        }
                    }
                    Err(e) => error!("Failed to upgrade connection for {}:{}: {}", host, port, e),
                }
            });
        }
    }

    Response::new(Body::empty())
}

/// Serve decrypted HTTP/1.1 requests arriving inside a CONNECT tunnel
async fn serve_intercepted_connection(
    tls_stream: TlsStream<Upgraded>,
    host: String,
    port: u16,
    remote_addr: SocketAddr,
    state: Arc<ProxyState>,
) {
    debug!("🌐 Processing decrypted HTTPS traffic for {}:{}", host, port);

    let service_host = host.clone();
    let service = service_fn(move |req: Request<Body>| {
        let host = service_host.clone();
        let state = Arc::clone(&state);
        async move {
            let max_body_size = state.max_body_size;
            let response = match read_request(req, Scheme::Https, host, port, remote_addr, max_body_size).await {
                Ok(request) => process_request(request, &state).await,
                Err(e) => body_error_response(e),
            };
            Ok::<_, Infallible>(response)
        }
    });

    if let Err(e) = Http::new().http1_only(true).serve_connection(tls_stream, service).await {
        debug!("HTTPS interception connection ended for {}:{}: {}", host, port, e);
    }
}

/// Collect a hyper request into the addon view
async fn read_request(
    req: Request<Body>,
    scheme: Scheme,
    host: String,
    port: u16,
    remote_addr: SocketAddr,
    max_body_size: usize,
) -> Result<InterceptedRequest> {
    let (parts, body) = req.into_parts();

    let declared = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.map_or(false, |len| len > max_body_size) {
        return Err(Error::BodyTooLarge { limit: max_body_size });
    }

    let body = read_body_limited(body, max_body_size).await?;

    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let mut request = InterceptedRequest::new(parts.method.as_str(), scheme, host, path)
        .with_port(port)
        .with_headers(Headers::from_header_map(&parts.headers))
        .with_body(body);
    request.client_addr = Some(remote_addr);
    Ok(request)
}

/// Collect `body`, giving up as soon as it grows past `limit`
async fn read_body_limited(mut body: Body, limit: usize) -> Result<Bytes> {
    let mut collected = BytesMut::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk?;
        if collected.len() + chunk.len() > limit {
            return Err(Error::BodyTooLarge { limit });
        }
        collected.extend_from_slice(&chunk);
    }
    Ok(collected.freeze())
}

fn body_error_response(error: Error) -> Response<Body> {
    match error {
        Error::BodyTooLarge { limit } => {
            log_warning!("Rejected request body over {} bytes", limit);
            build_error_response(StatusCode::PAYLOAD_TOO_LARGE, &format!("Request body exceeds {} bytes", limit))
        }
        other => {
            warn!("Failed to read request: {}", other);
            build_error_response(StatusCode::BAD_REQUEST, "Error reading request")
        }
    }
}

/// Run request hooks, forward, run response hooks
async fn process_request(mut request: InterceptedRequest, state: &ProxyState) -> Response<Body> {
    let start_time = Instant::now();
    state.addons.on_request(&mut request).await;

    match forward_request(&request, state).await {
        Ok(mut response) => {
            let view = InterceptedResponse {
                status: response.status().as_u16(),
                headers: Headers::from_header_map(response.headers()),
            };
            state.addons.on_response(&request, &view).await;

            strip_hop_by_hop(response.headers_mut());
            debug!(
                "✅ {} {} → {} ({}ms)",
                request.method,
                request.url(),
                view.status,
                start_time.elapsed().as_millis()
            );
            response
        }
        Err(Error::Timeout(_)) => {
            error!("⏱️  {} {} timed out after {:?}", request.method, request.url(), state.request_timeout);
            build_error_response(StatusCode::GATEWAY_TIMEOUT, "Upstream request timed out")
        }
        Err(e) => {
            error!("❌ {} {} → {}", request.method, request.url(), e);
            build_error_response(StatusCode::BAD_GATEWAY, &format!("Upstream request failed: {}", e))
        }
    }
}

/// Send the (possibly rewritten) request to its target
async fn forward_request(request: &InterceptedRequest, state: &ProxyState) -> Result<Response<Body>> {
    let uri: Uri = request
        .url()
        .parse()
        .map_err(|e| Error::Upstream(format!("Invalid upstream URL {}: {}", request.url(), e)))?;

    let listed = connection_tokens(request.headers.get_all("connection"));
    let mut headers = request
        .headers
        .to_header_map(|name| !is_hop_by_hop_header(name) && !listed.iter().any(|t| t.eq_ignore_ascii_case(name)));
    if !headers.contains_key(HOST) {
        let authority = HeaderValue::from_str(&request.authority())
            .map_err(|e| Error::Upstream(format!("Invalid host {}: {}", request.host, e)))?;
        headers.insert(HOST, authority);
    }

    let mut upstream_request = Request::builder()
        .method(request.method.as_str())
        .uri(uri)
        .body(Body::from(request.body.clone()))?;
    *upstream_request.headers_mut() = headers;

    debug!("🌐 Forwarding to: {}", request.url());
    let response = tokio::time::timeout(state.request_timeout, state.client.client().request(upstream_request)).await??;
    Ok(response)
}

fn strip_hop_by_hop(headers: &mut hyper::HeaderMap) {
    let listed = connection_tokens(headers.get_all(CONNECTION).iter().filter_map(|v| v.to_str().ok()));
    let hop: Vec<HeaderName> = headers
        .keys()
        .filter(|name| is_hop_by_hop_header(name.as_str()) || listed.iter().any(|t| t == name.as_str()))
        .cloned()
        .collect();
    for name in hop {
        headers.remove(name);
    }
}

/// `Host` header split into host and optional port
fn host_header(req: &Request<Body>) -> Option<(String, Option<u16>)> {
    let value = req.headers().get(HOST)?.to_str().ok()?;
    let authority: hyper::http::uri::Authority = value.parse().ok()?;
    let host = authority.host().trim_start_matches('[').trim_end_matches(']');
    Some((host.to_string(), authority.port_u16()))
}
