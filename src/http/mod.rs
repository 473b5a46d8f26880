//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, proxy base URL)
//!     → cors.rs (preflight short-circuit)
//!     → [security: rate limit, size guard]
//!     → [routing: target URL] → [upstream: fetch]
//!     → response.rs (content type, rewrite, header copy)
//!     → cors.rs (CORS headers re-asserted) → client
//! ```

pub mod cors;
pub mod request;
pub mod response;
pub mod server;

pub use cors::{cors_middleware, CorsHeaders};
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use response::ProxiedResponse;
pub use server::{AppState, HttpServer, ServerError};
