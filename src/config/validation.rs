//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! constraints. Validation is a pure function over `ProxyConfig` and reports
//! every problem found, not just the first.

use std::fmt;
use std::net::SocketAddr;

use axum::http::HeaderValue;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `upstream.connect_timeout_ms`.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if let Some(base) = &config.listener.public_base_url {
        match Url::parse(base) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {}
            _ => errors.push(ValidationError::new(
                "listener.public_base_url",
                format!("'{}' is not an absolute http(s) URL", base),
            )),
        }
    }

    let rate_limit = &config.rate_limit;
    if rate_limit.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than 0"));
    }
    if rate_limit.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
    }
    if rate_limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("rate_limit.sweep_interval_secs", "must be greater than 0"));
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than 0"));
    }

    let upstream = &config.upstream;
    if upstream.request_timeout_ms == 0 {
        errors.push(ValidationError::new("upstream.request_timeout_ms", "must be greater than 0"));
    }
    let phases = [
        ("upstream.connect_timeout_ms", upstream.connect_timeout_ms),
        ("upstream.tls_handshake_timeout_ms", upstream.tls_handshake_timeout_ms),
        ("upstream.response_header_timeout_ms", upstream.response_header_timeout_ms),
    ];
    for (field, value) in phases {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        } else if value >= upstream.request_timeout_ms {
            errors.push(ValidationError::new(
                field,
                format!(
                    "{}ms must be shorter than request_timeout_ms ({}ms)",
                    value, upstream.request_timeout_ms
                ),
            ));
        }
    }

    let header_values = [
        ("upstream.user_agent", &upstream.user_agent),
        ("upstream.accept", &upstream.accept),
        ("cors.allow_methods", &config.cors.allow_methods),
        ("cors.allow_headers", &config.cors.allow_headers),
        ("cors.expose_headers", &config.cors.expose_headers),
    ];
    for (field, value) in header_values {
        if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::new(field, "is not a valid header value"));
        }
    }

    let observability = &config.observability;
    if !matches!(observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("'{}' is not one of: pretty, json", observability.log_format),
        ));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
