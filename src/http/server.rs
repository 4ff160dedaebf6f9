//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router; every method and path goes to the proxy handler
//! - Wire up middleware (tracing, request ID, body limit)
//! - Buffer the inbound body and hand the request to the failover core
//! - Bound each request by a deadline that answers 503, never 408
//! - Spawn the health monitor alongside the listener
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, DefaultBodyLimit, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::health::HealthMonitor;
use crate::http::forward::{HyperConnector, ProxyRequest};
use crate::http::request::{ProxyRequestId, X_REQUEST_ID};
use crate::load_balancer::BackendPool;
use crate::observability::metrics;
use crate::resilience::failover::{service_unavailable, Dispatcher};
use crate::resilience::retries::FailoverPolicy;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub request_timeout: Duration,
}

/// HTTP server for the failover proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    pool: Arc<BackendPool>,
}

impl HttpServer {
    /// Create a server whose pool is seeded from `config.backends`.
    pub fn new(config: ProxyConfig) -> Self {
        let connector = Arc::new(HyperConnector::new(&config.timeouts));
        let pool = Arc::new(BackendPool::from_config(&config.backends, connector));
        Self::with_pool(config, pool)
    }

    /// Create a server around an existing pool (shared with the admin API).
    pub fn with_pool(config: ProxyConfig, pool: Arc<BackendPool>) -> Self {
        let state = AppState {
            dispatcher: Dispatcher::new(pool.clone(), FailoverPolicy::from(&config.failover)),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            pool,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The request deadline is enforced in the handler and expires as 503.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.listener.max_body_bytes))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, ProxyRequestId))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.pool.len(),
            "HTTP server starting"
        );

        if self.config.health_check.enabled {
            let monitor = HealthMonitor::new(self.pool.clone(), &self.config.health_check);
            tokio::spawn(monitor.run(shutdown.resubscribe()));
        } else {
            tracing::info!("Health checks disabled");
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    /// The bare router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Main proxy handler.
/// Buffers the request and lets the dispatcher pick, forward and fail over.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let request = match ProxyRequest::buffer(request, client_addr).await {
        Ok(request) => request,
        Err(rejection) => {
            let status = rejection.status();
            tracing::warn!(
                status = %status,
                error = %rejection.body_text(),
                "Rejecting request body"
            );
            metrics::record_request(&method, status.as_u16(), "none", start_time);
            return rejection.into_response();
        }
    };

    tracing::debug!(
        request_id = %request.request_id(),
        method = %method,
        path = %request.uri().path(),
        "Proxying request"
    );

    let dispatch = state.dispatcher.dispatch(&request);
    let outcome = match tokio::time::timeout(state.request_timeout, dispatch).await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!(
                request_id = %request.request_id(),
                path = %request.uri().path(),
                deadline = ?state.request_timeout,
                "Request deadline reached, terminating"
            );
            metrics::record_unavailable("deadline_exceeded");
            metrics::record_request(&method, 503, "none", start_time);
            return service_unavailable();
        }
    };

    let backend = outcome.backend_label();
    metrics::record_request(&method, outcome.status().as_u16(), &backend, start_time);
    outcome.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::forward::{Connector, Forward, ForwardError};
    use crate::load_balancer::pool::testing::echo_pool;
    use axum::http::StatusCode;
    use futures_util::future::BoxFuture;
    use tower::ServiceExt;
    use url::Url;

    /// Accepts the request and never answers.
    struct Hanging;

    impl Forward for Hanging {
        fn forward<'a>(
            &'a self,
            _request: &'a ProxyRequest,
        ) -> BoxFuture<'a, Result<Response<Body>, ForwardError>> {
            Box::pin(std::future::pending())
        }
    }

    struct HangingConnector;

    impl Connector for HangingConnector {
        fn connect(&self, _endpoint: &Url) -> Box<dyn Forward> {
            Box::new(Hanging)
        }
    }

    fn server(addrs: &[&str], max_body_bytes: usize) -> HttpServer {
        let mut config = ProxyConfig::default();
        config.health_check.enabled = false;
        config.listener.max_body_bytes = max_body_bytes;
        HttpServer::with_pool(config, Arc::new(echo_pool(addrs)))
    }

    #[tokio::test]
    async fn dispatches_and_sets_request_id() {
        let server = server(&["http://127.0.0.1:9001"], 1024);
        let response = server
            .router()
            .oneshot(Request::get("/hello").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn keeps_client_request_id() {
        let server = server(&["http://127.0.0.1:9001"], 1024);
        let request = Request::get("/")
            .header(X_REQUEST_ID, "abc-123")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();

        assert_eq!(response.headers()[X_REQUEST_ID], "abc-123");
    }

    #[tokio::test]
    async fn empty_pool_is_unavailable() {
        let server = server(&[], 1024);
        let response = server
            .router()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Service not available");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let server = server(&["http://127.0.0.1:9001"], 8);
        let request = Request::post("/upload")
            .body(Body::from(vec![b'x'; 64]))
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn broken_body_is_bad_request() {
        let server = server(&["http://127.0.0.1:9001"], 1024);
        let chunks = futures_util::stream::iter(vec![
            Ok(axum::body::Bytes::from_static(b"half")),
            Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "client went away")),
        ]);
        let request = Request::post("/upload").body(Body::from_stream(chunks)).unwrap();
        let response = server.router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn request_deadline_answers_service_unavailable() {
        let mut config = ProxyConfig::default();
        config.health_check.enabled = false;
        config.timeouts.request_secs = 1;
        let pool = Arc::new(BackendPool::new(Arc::new(HangingConnector)));
        pool.register(Url::parse("http://127.0.0.1:9001").unwrap());
        let server = HttpServer::with_pool(config, pool);

        let response = server
            .router()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Service not available");
    }
}
