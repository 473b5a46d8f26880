//! Response composition.
//!
//! # Responsibilities
//! - Resolve the content type of the fetched body
//! - Rewrite HTML and CSS references back through the proxy
//! - Copy the target's status and headers to the client
//!
//! # Design Decisions
//! - The body is fully buffered before anything is sent, so the client sees
//!   either a complete response or an error status
//! - `Content-Length` is recomputed from the (possibly rewritten) body
//! - Hop-by-hop headers are connection-scoped and never copied

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::rewrite::{is_rewritable, resolve_content_type, Rewriter};
use crate::upstream::Fetched;

/// Upstream response headers replaced or dropped on the way out.
const SKIPPED_RESPONSE_HEADERS: &[&str] = &[
    "content-type",
    "content-length",
    "content-encoding",
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// What the client receives for a successful fetch.
#[derive(Debug)]
pub struct ProxiedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub content_type: String,
    pub body: Bytes,
    /// References routed back through the proxy; zero for non-rewritable bodies.
    pub rewritten: usize,
}

impl ProxiedResponse {
    /// Build the client response for `fetched`; `proxy_base` prefixes
    /// rewritten references.
    pub fn compose(fetched: Fetched, proxy_base: &str) -> Self {
        let header_type = fetched
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let content_type = resolve_content_type(header_type, fetched.final_url.path(), &fetched.body);

        let (body, rewritten) = if is_rewritable(&content_type) {
            let rewritten = Rewriter::new(fetched.final_url.clone(), proxy_base).rewrite(&fetched.body);
            (Bytes::from(rewritten.body), rewritten.references)
        } else {
            (fetched.body, 0)
        };

        let mut headers = HeaderMap::with_capacity(fetched.headers.len());
        for (name, value) in &fetched.headers {
            if !SKIPPED_RESPONSE_HEADERS.contains(&name.as_str()) {
                headers.append(name.clone(), value.clone());
            }
        }

        Self {
            status: fetched.status,
            headers,
            content_type,
            body,
            rewritten,
        }
    }
}

impl IntoResponse for ProxiedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;

        let content_type = HeaderValue::from_str(&self.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(crate::rewrite::content_type::OCTET_STREAM));
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn fetched(url: &str, headers: &[(&'static str, &'static str)], body: &'static str) -> Fetched {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(*name, HeaderValue::from_static(value));
        }
        Fetched {
            status: StatusCode::OK,
            headers: map,
            final_url: Url::parse(url).unwrap(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_html_is_rewritten() {
        let proxied = ProxiedResponse::compose(
            fetched(
                "https://example.com/page",
                &[("content-type", "text/html; charset=utf-8")],
                r#"<img src="/logo.png">"#,
            ),
            "http://localhost:3001/",
        );
        assert_eq!(proxied.rewritten, 1);
        assert_eq!(
            proxied.body,
            r#"<img src="http://localhost:3001/?url=https%3A%2F%2Fexample.com%2Flogo.png">"#
        );
        assert_eq!(proxied.content_type, "text/html; charset=utf-8");
    }

    #[test]
    fn test_binary_passes_through() {
        let proxied = ProxiedResponse::compose(
            fetched("https://example.com/a.png", &[], "<p><img src=\"x\">"),
            "http://localhost:3001/",
        );
        assert_eq!(proxied.rewritten, 0);
        assert_eq!(proxied.content_type, "image/png");
        assert_eq!(proxied.body, "<p><img src=\"x\">");
    }

    #[test]
    fn test_rewrite_base_is_final_url() {
        let proxied = ProxiedResponse::compose(
            fetched("https://www.example.com/new/", &[("content-type", "text/css")], "a{b:url(x.png)}"),
            "http://p/",
        );
        assert_eq!(
            proxied.body,
            r#"a{b:url("http://p/?url=https%3A%2F%2Fwww.example.com%2Fnew%2Fx.png")}"#
        );
    }

    #[test]
    fn test_header_copy() {
        let proxied = ProxiedResponse::compose(
            fetched(
                "https://example.com/data",
                &[
                    ("content-type", "application/json"),
                    ("content-length", "999"),
                    ("transfer-encoding", "chunked"),
                    ("set-cookie", "a=1"),
                    ("set-cookie", "b=2"),
                    ("cache-control", "max-age=60"),
                ],
                "{}",
            ),
            "http://p/",
        );
        let response = proxied.into_response();
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert!(!headers.contains_key(header::TRANSFER_ENCODING));
        assert!(!headers.contains_key(header::CONTENT_LENGTH));
        assert_eq!(headers.get_all(header::SET_COOKIE).iter().count(), 2);
        assert_eq!(headers[header::CACHE_CONTROL], "max-age=60");
    }

    #[test]
    fn test_status_is_verbatim() {
        let mut upstream = fetched("https://example.com/missing", &[("content-type", "text/plain")], "nope");
        upstream.status = StatusCode::NOT_FOUND;
        let response = ProxiedResponse::compose(upstream, "http://p/").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
