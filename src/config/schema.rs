//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the CORS proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, public base URL).
    pub listener: ListenerConfig,

    /// Per-client admission control.
    pub rate_limit: RateLimitConfig,

    /// Inbound request limits.
    pub limits: LimitsConfig,

    /// Outbound fetch behaviour.
    pub upstream: UpstreamConfig,

    /// CORS response headers.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    pub bind_address: String,

    /// Base URL that rewritten references point back to.
    /// When unset, `http://<Host header>/` of each request is used.
    pub public_base_url: Option<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
            public_base_url: None,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests admitted per client within one window.
    pub max_requests: u32,

    /// Fixed window length in seconds.
    pub window_secs: u64,

    /// How often expired client entries are swept, in seconds.
    pub sweep_interval_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 20,
            window_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Upstream fetch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Overall budget for one fetch (headers and body) in milliseconds.
    pub request_timeout_ms: u64,

    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// TLS handshake timeout in milliseconds.
    pub tls_handshake_timeout_ms: u64,

    /// Time allowed between sending the request and receiving response headers.
    ///
    /// The wait starts once the connection is up; see
    /// [`UpstreamConfig::send_timeout`].
    pub response_header_timeout_ms: u64,

    /// Maximum redirect hops followed.
    pub max_redirects: usize,

    /// Forward the inbound method and body. When false every fetch is a GET.
    pub forward_method: bool,

    /// User-Agent sent when the caller did not provide one.
    pub user_agent: String,

    /// Accept sent when the caller did not provide one.
    pub accept: String,
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Budget for establishing a connection. The client exposes a single
    /// connector timeout, so it covers TCP connect plus the TLS handshake.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.saturating_add(self.tls_handshake_timeout_ms))
    }

    pub fn response_header_timeout(&self) -> Duration {
        Duration::from_millis(self.response_header_timeout_ms)
    }

    /// Budget for getting response headers back, counted from the start of
    /// the fetch: the connect budget plus the header wait. Redirect hops
    /// draw from the same budget, and `request_timeout` still caps it.
    pub fn send_timeout(&self) -> Duration {
        self.connect_timeout() + self.response_header_timeout()
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            tls_handshake_timeout_ms: 10_000,
            response_header_timeout_ms: 10_000,
            max_redirects: 10,
            forward_method: true,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string(),
            accept: "*/*".to_string(),
        }
    }
}

/// CORS header values attached to every response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_methods: String,
    pub allow_headers: String,
    pub expose_headers: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_methods: "GET, POST, PUT, DELETE, OPTIONS".to_string(),
            allow_headers: "*".to_string(),
            expose_headers: "*".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
