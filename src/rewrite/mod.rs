//! Response body rewriting.
//!
//! # Data Flow
//! ```text
//! fetched body + headers
//!     → content_type.rs (header > extension > sniff > octet-stream)
//!     → [HTML or CSS only] engine.rs (attribute pass, url() pass)
//!         → resolve.rs (reference against page URL)
//!     → body with references routed back through the proxy
//! ```

pub mod content_type;
pub mod engine;
pub mod resolve;

pub use content_type::{is_rewritable, resolve_content_type};
pub use engine::{Rewriter, Rewritten};
pub use resolve::resolve_reference;
