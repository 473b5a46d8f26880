//! Outbound fetch to the target URL.
//!
//! # Responsibilities
//! - Forward the inbound method, headers and body (or a bare GET)
//! - Fill in `User-Agent` and `Accept` when the caller sent none
//! - Enforce the overall, connect and response-header timeouts
//! - Classify transport failures; no retries
//!
//! # Design Decisions
//! - Pooling is disabled so no connection is shared between unrelated targets
//! - The client negotiates compression itself, so bodies arrive decoded and
//!   the rewriter always sees plain text

use std::error::Error as StdError;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::ProxyError;
use crate::routing::TargetUrl;

/// Inbound request headers that never reach the target.
const SKIPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "origin",
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "accept-encoding",
];

/// A completed upstream exchange, body fully buffered.
#[derive(Debug)]
pub struct Fetched {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Where the body actually came from, after redirects.
    pub final_url: Url,
    pub body: Bytes,
}

/// HTTP client for target fetches.
pub struct UpstreamClient {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .pool_max_idle_per_host(0)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Fetch `target`, carrying the caller's method, headers and body.
    pub async fn fetch(
        &self,
        target: &TargetUrl,
        method: Method,
        inbound_headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Fetched, ProxyError> {
        let (method, body) = if self.config.forward_method {
            (method, body)
        } else {
            (Method::GET, Bytes::new())
        };

        let mut request = self
            .client
            .request(method, target.as_url().clone())
            .headers(outbound_headers(inbound_headers, &self.config));
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = match tokio::time::timeout(self.config.send_timeout(), request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(classify(&e)),
            Err(_) => {
                tracing::debug!(url = %target, "Timed out waiting for upstream response headers");
                return Err(ProxyError::UpstreamTimeout);
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().clone();

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ProxyError::UpstreamTimeout
            } else {
                ProxyError::Internal(format!("failed to read response: {}", error_chain(&e)))
            }
        })?;

        Ok(Fetched {
            status,
            headers,
            final_url,
            body,
        })
    }
}

/// Copy the caller's headers minus the ones that must describe the target
/// rather than the caller, then add defaults.
pub fn outbound_headers(inbound: &HeaderMap, config: &UpstreamConfig) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len() + 2);
    for (name, value) in inbound {
        if SKIPPED_REQUEST_HEADERS.contains(&name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    if !headers.contains_key(header::USER_AGENT) {
        if let Ok(value) = HeaderValue::from_str(&config.user_agent) {
            headers.insert(header::USER_AGENT, value);
        }
    }
    if !headers.contains_key(header::ACCEPT) {
        if let Ok(value) = HeaderValue::from_str(&config.accept) {
            headers.insert(header::ACCEPT, value);
        }
    }

    headers
}

/// Map a transport error onto the proxy's error kinds.
pub fn classify(err: &reqwest::Error) -> ProxyError {
    if err.is_timeout() || is_timeout_failure(err) {
        ProxyError::UpstreamTimeout
    } else if is_dns_failure(err) {
        ProxyError::UpstreamUnreachable(error_chain(err))
    } else {
        ProxyError::UpstreamOther(error_chain(err))
    }
}

fn sources<'a>(err: &'a (dyn StdError + 'static)) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

fn is_timeout_failure(err: &(dyn StdError + 'static)) -> bool {
    sources(err).any(|e| {
        e.downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::TimedOut)
    })
}

/// Name resolution failures surface as text deep in the connector's chain.
fn is_dns_failure(err: &(dyn StdError + 'static)) -> bool {
    sources(err).any(|e| {
        let message = e.to_string().to_ascii_lowercase();
        message.contains("dns error")
            || message.contains("failed to lookup address")
            || message.contains("no such host")
            || message.contains("name or service not known")
    })
}

/// `outer: inner: innermost`, for logs.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    sources(err).map(|e| e.to_string()).collect::<Vec<_>>().join(": ")
}
