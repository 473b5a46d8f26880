//! Request-level error kinds and their HTTP mapping.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Every way a proxied request can fail. All variants are terminal for the
/// request that produced them; nothing is retried.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Missing, undecodable or unparsable target URL.
    #[error("{0}")]
    InvalidInput(String),

    /// Client exceeded its quota for the current window.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Request body exceeded the configured ceiling.
    #[error("Request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("Request timed out")]
    UpstreamTimeout,

    /// Name resolution for the target host failed.
    #[error("Invalid host or DNS resolution failed")]
    UpstreamUnreachable(String),

    /// Any other transport failure talking to the target.
    #[error("Failed to fetch URL: {0}")]
    UpstreamOther(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ProxyError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::UpstreamUnreachable(_) | ProxyError::UpstreamOther(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::InvalidInput(_) => "invalid_input",
            ProxyError::RateLimited => "rate_limited",
            ProxyError::BodyTooLarge { .. } => "body_too_large",
            ProxyError::UpstreamTimeout => "upstream_timeout",
            ProxyError::UpstreamUnreachable(_) => "upstream_unreachable",
            ProxyError::UpstreamOther(_) => "upstream_other",
            ProxyError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), self.to_string()).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}
