//! Request routing: where does this request go?
//!
//! # Data Flow
//! ```text
//! Inbound URI
//!     → target.rs (raw_target: `url` query or path-style)
//!     → target.rs (prepare: decode, trim, scheme, parse)
//!     → TargetUrl (absolute http/https URL, non-empty host)
//! ```

pub mod target;

pub use target::{prepare, raw_target, TargetUrl};
