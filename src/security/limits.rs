//! Request body size guard.
//!
//! # Responsibilities
//! - Reject requests whose declared `Content-Length` exceeds the ceiling
//! - Cap streamed bodies so reading past the ceiling fails
//! - Map an over-limit read to `413 Payload Too Large`
//!
//! # Design Decisions
//! - Applies to every method; the guard never inspects the verb
//! - Limits checked before the body is read (early rejection)

use std::error::Error as StdError;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::{LengthLimitError, Limited};

use crate::error::ProxyError;

/// Ceiling shared by the middleware and the body reader.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

/// Middleware enforcing the body ceiling on every inbound request.
pub async fn size_guard_middleware(
    State(limit): State<BodyLimit>,
    request: Request,
    next: Next,
) -> Response {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    if let Some(length) = declared {
        if length > limit.0 as u64 {
            tracing::warn!(declared = length, limit = limit.0, "Request body too large");
            return ProxyError::BodyTooLarge { limit: limit.0 }.into_response();
        }
    }

    let (parts, body) = request.into_parts();
    let limited = Body::new(Limited::new(body, limit.0));
    next.run(Request::from_parts(parts, limited)).await
}

/// Read a whole request body, failing with `BodyTooLarge` past `limit` bytes.
pub async fn read_body(body: Body, limit: usize) -> Result<Bytes, ProxyError> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        if is_length_limit(&e) {
            ProxyError::BodyTooLarge { limit }
        } else {
            ProxyError::Internal(format!("failed to read request body: {}", e))
        }
    })
}

/// Walk the source chain looking for the limiter's error.
fn is_length_limit(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}
