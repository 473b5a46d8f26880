//! HTTP server setup and the proxy handler.
//!
//! # Responsibilities
//! - Create the Axum router and wire up middleware
//! - Bind the server to a listener with graceful shutdown
//! - Run the proxy pipeline for each admitted request
//!
//! # Layer order (outermost first)
//! ```text
//! request ID → trace → CORS → rate limit → size guard → proxy_handler
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::cors::{cors_middleware, CorsHeaders};
use crate::http::request::{proxy_base, request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::http::response::ProxiedResponse;
use crate::observability::metrics;
use crate::routing::{prepare, raw_target};
use crate::security::{rate_limit_middleware, read_body, size_guard_middleware, BodyLimit, RateLimiter};
use crate::upstream::UpstreamClient;

/// Failures building the server from a validated configuration.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid CORS header value: {0}")]
    Cors(#[from] axum::http::header::InvalidHeaderValue),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<UpstreamClient>,
    pub max_body_bytes: usize,
    pub public_base_url: Option<Arc<str>>,
}

/// HTTP server for the CORS proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    limiter: Option<Arc<RateLimiter>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let upstream = Arc::new(UpstreamClient::new(&config.upstream)?);
        let cors = Arc::new(CorsHeaders::from_config(&config.cors)?);
        let limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::new(&config.rate_limit)));

        let state = AppState {
            upstream,
            max_body_bytes: config.limits.max_body_bytes,
            public_base_url: config.listener.public_base_url.as_deref().map(Arc::from),
        };

        let router = Self::build_router(&config, state, cors, limiter.clone());
        Ok(Self {
            router,
            config,
            limiter,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(
        config: &ProxyConfig,
        state: AppState,
        cors: Arc<CorsHeaders>,
        limiter: Option<Arc<RateLimiter>>,
    ) -> Router {
        let mut router = Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(middleware::from_fn_with_state(
                BodyLimit(config.limits.max_body_bytes),
                size_guard_middleware,
            ));

        if let Some(limiter) = limiter {
            router = router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        router
            .layer(middleware::from_fn_with_state(cors, cors_middleware))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id(request)
                )
            }))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// Hand out the router, e.g. to drive it without a socket.
    ///
    /// The rate limiter reads the peer address from `ConnectInfo`, so callers
    /// must provide one (axum's `MockConnectInfo` in tests).
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            rate_limit = self.limiter.is_some(),
            max_body_bytes = self.config.limits.max_body_bytes,
            "HTTP server starting"
        );

        if let Some(limiter) = &self.limiter {
            let sweeper = limiter.clone();
            let interval = self.config.rate_limit.sweep_interval();
            let sweeper_shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                sweeper.run_sweeper(interval, sweeper_shutdown).await;
            });
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Main proxy handler.
///
/// Dropping the client connection drops this future, which cancels the
/// upstream fetch with it.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();

    let response = match forward(&state, request).await {
        Ok(proxied) => {
            tracing::info!(
                status = proxied.status.as_u16(),
                content_type = %proxied.content_type,
                bytes = proxied.body.len(),
                rewritten = proxied.rewritten,
                "Proxied response"
            );
            if proxied.rewritten > 0 {
                metrics::record_rewrites(proxied.rewritten);
            }
            proxied.into_response()
        }
        Err(e) => {
            match &e {
                ProxyError::UpstreamTimeout | ProxyError::UpstreamUnreachable(_) | ProxyError::UpstreamOther(_) => {
                    tracing::warn!(kind = e.kind(), error = ?e, "Upstream fetch failed");
                    metrics::record_upstream_error(e.kind());
                }
                ProxyError::Internal(_) => tracing::error!(error = %e, "Request failed"),
                _ => tracing::info!(kind = e.kind(), error = %e, "Request rejected"),
            }
            e.into_response()
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

/// Body, target, fetch, compose. Every failure ends the request.
async fn forward(state: &AppState, request: Request<Body>) -> Result<ProxiedResponse, ProxyError> {
    let base = proxy_base(state.public_base_url.as_deref(), &request);
    let (parts, body) = request.into_parts();
    let body = read_body(body, state.max_body_bytes).await?;

    let raw = raw_target(&parts.uri)
        .ok_or_else(|| ProxyError::InvalidInput("URL is required. Use format: /?url=https://example.com".into()))?;
    let target = prepare(&raw)?;

    tracing::debug!(url = %target, method = %parts.method, body_bytes = body.len(), "Fetching upstream");
    let fetched = state.upstream.fetch(&target, parts.method, &parts.headers, body).await?;
    if fetched.final_url != *target.as_url() {
        tracing::debug!(from = %target, to = %fetched.final_url, "Followed redirect");
    }

    Ok(ProxiedResponse::compose(fetched, &base))
}
