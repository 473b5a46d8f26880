//! Admission control.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-IP fixed window)
//!     → limits.rs (body size ceiling)
//!     → Pass to the proxy handler
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any admission check failure
//! - The quota table is the only state shared across requests

pub mod limits;
pub mod rate_limit;

pub use limits::{read_body, size_guard_middleware, BodyLimit};
pub use rate_limit::{rate_limit_middleware, Admission, Clock, RateLimiter, SystemClock};
