//! Inbound request helpers.
//!
//! # Responsibilities
//! - Generate a UUID v4 request ID for every request
//! - Work out the public URL of this proxy, used as the prefix of rewritten
//!   references
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - An explicitly configured public URL beats whatever the client sent as Host

use axum::http::{header, HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Issues a fresh UUID v4 for requests that arrive without an ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Request ID header value, or `-` when absent.
pub fn request_id<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

/// Base URL under which this proxy is reachable, always ending in `/`.
///
/// Uses `public_base_url` when configured, otherwise `http://<Host>/`, falling
/// back to the request URI's authority (HTTP/2) and finally `localhost`.
pub fn proxy_base<B>(public_base_url: Option<&str>, request: &Request<B>) -> String {
    if let Some(base) = public_base_url {
        return with_trailing_slash(base);
    }

    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
        .unwrap_or_else(|| "localhost".to_string());

    format!("http://{}/", host)
}

fn with_trailing_slash(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    }
}
