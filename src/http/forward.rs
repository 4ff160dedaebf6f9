//! Forwarding primitive.
//!
//! # Responsibilities
//! - Hold the buffered inbound request so it can be replayed on failover
//! - Rewrite the request for a single upstream (URI join, hop-by-hop headers)
//! - Relay the request and hand back the streaming upstream response
//!
//! # Design Decisions
//! - A forward resolves once the upstream response head arrives; the body is
//!   streamed afterwards and never retried
//! - Only transport failures are errors; upstream 5xx is a valid response
//! - One `Forward` handle per backend, built once by a `Connector`

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::rejection::BytesRejection;
use axum::extract::FromRequest;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::uri::InvalidUri;
use axum::http::{Method, Request, Response, Uri};
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time;
use url::Url;

use crate::config::TimeoutConfig;

/// Failure of a single forwarding attempt.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid upstream uri: {0}")]
    InvalidUri(#[from] InvalidUri),

    #[error("failed to build upstream request: {0}")]
    Build(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

/// Relays a request to one backend.
pub trait Forward: Send + Sync {
    fn forward<'a>(
        &'a self,
        request: &'a ProxyRequest,
    ) -> BoxFuture<'a, Result<Response<Body>, ForwardError>>;
}

/// Builds the forward handle for a newly registered backend.
pub trait Connector: Send + Sync {
    fn connect(&self, endpoint: &Url) -> Box<dyn Forward>;
}

/// Headers that only apply to a single connection hop.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// An inbound request with its body buffered for replay.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    client_addr: Option<SocketAddr>,
}

impl ProxyRequest {
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
        client_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            client_addr,
        }
    }

    /// Shorthand for tests and tools: a bodiless GET.
    pub fn get(uri: Uri) -> Self {
        Self::new(Method::GET, uri, HeaderMap::new(), Bytes::new(), None)
    }

    /// Buffer an inbound request. The size limit comes from the router's
    /// `DefaultBodyLimit`; an oversized body is a 413 rejection, any other
    /// read failure a 400.
    pub async fn buffer(
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
    ) -> Result<Self, BytesRejection> {
        let method = request.method().clone();
        let uri = request.uri().clone();
        let headers = request.headers().clone();
        let body = Bytes::from_request(request, &()).await?;
        Ok(Self::new(method, uri, headers, body, client_addr))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client_addr
    }

    /// The `x-request-id` assigned at the edge, if any.
    pub fn request_id(&self) -> &str {
        self.headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }

    /// Build a fresh upstream request aimed at `target`.
    pub fn to_upstream(&self, target: &Url) -> Result<Request<Body>, ForwardError> {
        let uri = upstream_uri(target, &self.uri)?;

        let mut headers = self.headers.clone();
        strip_hop_by_hop(&mut headers);
        if let Some(addr) = self.client_addr {
            append_forwarded_for(&mut headers, addr);
        }

        let mut request = Request::builder()
            .method(self.method.clone())
            .uri(uri)
            .body(Body::from(self.body.clone()))?;
        *request.headers_mut() = headers;
        Ok(request)
    }
}

/// Join the inbound path and query onto the backend base URL.
pub fn upstream_uri(target: &Url, original: &Uri) -> Result<Uri, InvalidUri> {
    let mut uri = format!("{}://{}", target.scheme(), target.host_str().unwrap_or_default());
    if let Some(port) = target.port() {
        uri.push_str(&format!(":{port}"));
    }

    uri.push_str(target.path().trim_end_matches('/'));
    let path = original.path();
    if !path.starts_with('/') {
        uri.push('/');
    }
    uri.push_str(path);

    match (target.query(), original.query()) {
        (Some(a), Some(b)) => uri.push_str(&format!("?{a}&{b}")),
        (Some(q), None) | (None, Some(q)) => uri.push_str(&format!("?{q}")),
        (None, None) => {}
    }

    Uri::try_from(uri)
}

/// Remove hop-by-hop headers, including those named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, addr: SocketAddr) {
    let ip = addr.ip().to_string();
    let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{prior}, {ip}"),
        None => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// Single-host reverse proxy over a shared hyper client.
pub struct ReverseProxy {
    client: Client<HttpConnector, Body>,
    target: Url,
    timeout: Duration,
}

impl Forward for ReverseProxy {
    fn forward<'a>(
        &'a self,
        request: &'a ProxyRequest,
    ) -> BoxFuture<'a, Result<Response<Body>, ForwardError>> {
        Box::pin(async move {
            let upstream = request.to_upstream(&self.target)?;

            let response = match time::timeout(self.timeout, self.client.request(upstream)).await {
                Ok(result) => result?,
                Err(_) => return Err(ForwardError::Timeout(self.timeout)),
            };

            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Ok(Response::from_parts(parts, Body::new(body)))
        })
    }
}

/// Hands out `ReverseProxy` handles sharing one connection pool.
#[derive(Clone)]
pub struct HyperConnector {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl HyperConnector {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut http = HttpConnector::new();
        http.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        http.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(http);
        Self {
            client,
            timeout: Duration::from_secs(timeouts.upstream_secs),
        }
    }
}

impl Connector for HyperConnector {
    fn connect(&self, endpoint: &Url) -> Box<dyn Forward> {
        Box::new(ReverseProxy {
            client: self.client.clone(),
            target: endpoint.clone(),
            timeout: self.timeout,
        })
    }
}
