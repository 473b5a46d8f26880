//! Upstream fetching.

pub mod client;

pub use client::{classify, outbound_headers, Fetched, UpstreamClient};
