//! Pattern-based reference rewriting for HTML and CSS bodies.
//!
//! Two passes over the raw bytes, no document tree:
//!
//! 1. Attribute pass: `src=`, `href=`, `url=`, `srcset=` values, with the
//!    original quote characters (double, single or none) kept.
//! 2. CSS pass: `url(...)` references, always emitted as `url("...")`.
//!
//! Each reference is resolved against the page URL and replaced with
//! `<proxy base>?url=<percent-encoded absolute URL>`. Bytes outside the matched
//! spans are never touched, and references that already point at the proxy are
//! left alone, so running the engine over its own output is a no-op.

use std::sync::LazyLock;

use regex::bytes::{Captures, Regex};
use url::Url;

use crate::rewrite::resolve::{is_inline, resolve_reference};

/// Groups: 1 preceding byte, 2 attribute, 3 open quote, 4 value, 5 close quote.
///
/// The preceding byte must not be `?` or `&`, which keeps query-string
/// parameters such as the proxy's own `?url=` out of the match. `;url=` is
/// allowed so meta refresh targets are routed.
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?-u)(^|[^?&])(src|href|url|srcset)=(["']?)([^"'\s>]+)(["']?)"#)
        .expect("valid attribute regex")
});

/// Group 1 is the reference, possibly padded with whitespace.
///
/// Both patterns match bytes, not chars, so invalid UTF-8 around a reference
/// never hides it.
static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?-u)url\(\s*['"]?([^'")]+)['"]?\s*\)"#).expect("valid css url regex")
});

/// Result of one rewrite pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    pub body: Vec<u8>,
    /// Number of references routed back through the proxy.
    pub references: usize,
}

/// Rewrites references in documents fetched from `base`.
#[derive(Debug, Clone)]
pub struct Rewriter {
    base: Url,
    proxy_base: String,
    proxied_prefix: String,
}

impl Rewriter {
    /// `proxy_base` is the URL of this service, e.g. `http://localhost:3001/`.
    pub fn new(base: Url, proxy_base: impl Into<String>) -> Self {
        let proxy_base = proxy_base.into();
        let proxied_prefix = format!("{}?url=", proxy_base);
        Self {
            base,
            proxy_base,
            proxied_prefix,
        }
    }

    /// The URL that fetches `absolute` through this proxy.
    pub fn proxied_url(&self, absolute: &str) -> String {
        format!("{}?url={}", self.proxy_base, urlencoding::encode(absolute))
    }

    fn is_proxied(&self, reference: &str) -> bool {
        reference.starts_with(&self.proxied_prefix)
    }

    /// Resolve a reference and return its proxied form, or `None` when the
    /// reference must stay as written.
    fn route(&self, reference: &str) -> Option<String> {
        if reference.is_empty() || is_inline(reference) || self.is_proxied(reference) {
            return None;
        }

        let resolved = resolve_reference(&self.base, reference);
        // javascript:, mailto:, blob: and friends cannot be fetched.
        let scheme = resolved.split_once(':').map(|(s, _)| s.to_ascii_lowercase());
        if !matches!(scheme.as_deref(), Some("http") | Some("https")) {
            return None;
        }

        Some(self.proxied_url(&resolved))
    }

    /// Run both passes over `content`.
    pub fn rewrite(&self, content: &[u8]) -> Rewritten {
        let mut references = 0;

        let after_attributes = ATTRIBUTE.replace_all(content, |caps: &Captures<'_>| {
            let Some(proxied) = std::str::from_utf8(&caps[4]).ok().and_then(|v| self.route(v)) else {
                return caps[0].to_vec();
            };
            references += 1;

            let mut out = Vec::with_capacity(caps[0].len() + proxied.len());
            out.extend_from_slice(&caps[1]);
            out.extend_from_slice(&caps[2]);
            out.push(b'=');
            out.extend_from_slice(&caps[3]);
            out.extend_from_slice(proxied.as_bytes());
            out.extend_from_slice(&caps[5]);
            out
        });

        let after_css = CSS_URL.replace_all(&after_attributes, |caps: &Captures<'_>| {
            let reference = std::str::from_utf8(&caps[1])
                .ok()
                .map(|v| v.trim().trim_matches(|c| c == '\'' || c == '"'));
            let Some(proxied) = reference.and_then(|v| self.route(v)) else {
                return caps[0].to_vec();
            };
            references += 1;

            format!("url(\"{}\")", proxied).into_bytes()
        });

        Rewritten {
            body: after_css.into_owned(),
            references,
        }
    }
}
