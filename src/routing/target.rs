//! Target URL extraction and normalization.
//!
//! A caller names the resource to fetch either as `/?url=<target>` or by
//! prepending the proxy to it, `/<target>`. Either way the raw string goes
//! through [`prepare`], which yields an absolute http(s) URL.

use std::fmt::Write;
use std::sync::LazyLock;

use axum::http::Uri;
use regex::Regex;
use url::Url;

use crate::error::ProxyError;

/// Leading scheme followed by however many slashes survived intermediaries.
static SCHEME_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(https?):/*").expect("valid scheme regex"));

/// A validated, absolute upstream URL.
///
/// Always has an `http` or `https` scheme and a non-empty host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrl {
    url: Url,
}

impl TargetUrl {
    pub fn as_url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn into_url(self) -> Url {
        self.url
    }
}

impl std::fmt::Display for TargetUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Pull the raw target out of an inbound request URI.
///
/// A path that itself starts with `http:` or `https:` is a path-style target:
/// everything after the leading `/`, plus the query. Otherwise the target is
/// the `url` query parameter, whatever the path.
pub fn raw_target(uri: &Uri) -> Option<String> {
    let path = uri.path().trim_start_matches('/');
    if SCHEME_PREFIX.is_match(path) {
        let mut target = path.to_string();
        if let Some(query) = uri.query() {
            target.push('?');
            target.push_str(query);
        }
        return Some(target);
    }

    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.trim().is_empty())
}

/// Decode, trim, add a missing scheme, collapse extra slashes after the
/// scheme, then parse.
pub fn prepare(raw: &str) -> Result<TargetUrl, ProxyError> {
    let decoded = percent_decode(raw)?;
    let trimmed = decoded.trim();

    let candidate = match SCHEME_PREFIX.captures(trimmed) {
        Some(caps) => {
            let scheme = caps[1].to_ascii_lowercase();
            format!("{}://{}", scheme, &trimmed[caps[0].len()..])
        }
        None => format!("https://{}", trimmed.trim_start_matches('/')),
    };

    let url = Url::parse(&candidate)
        .map_err(|e| ProxyError::InvalidInput(format!("invalid URL: {}", e)))?;

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(TargetUrl { url }),
        _ => Err(ProxyError::InvalidInput("invalid URL: missing host".to_string())),
    }
}

/// Percent-decode `raw`. Only a `%` without two hex digits after it is an
/// error; decoded bytes that are not UTF-8 (legacy `%E9` and the like) are
/// escaped again so the URL still names the same resource.
fn percent_decode(raw: &str) -> Result<String, ProxyError> {
    let bytes = raw.as_bytes();
    let malformed = bytes.iter().enumerate().any(|(i, &b)| {
        b == b'%'
            && !(bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit))
    });
    if malformed {
        return Err(ProxyError::InvalidInput(
            "failed to decode URL: malformed percent escape".to_string(),
        ));
    }

    let decoded = urlencoding::decode_binary(bytes);
    Ok(escape_invalid_utf8(&decoded))
}

fn escape_invalid_utf8(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                let invalid = e.error_len().unwrap_or(rest.len());
                for byte in &rest[..invalid] {
                    let _ = write!(out, "%{:02X}", byte);
                }
                bytes = &rest[invalid..];
            }
        }
    }
}
