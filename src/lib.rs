//! CORS forwarding proxy library.
//!
//! Fetches an arbitrary target URL on a browser's behalf, returns the result
//! with permissive CORS headers, and rewrites resource references in HTML and
//! CSS so follow-up requests route through the proxy as well.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rewrite;
pub mod routing;
pub mod security;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
