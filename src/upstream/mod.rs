//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! Decoded target URL (+ optional Range)
//!     → client.rs (fixed headers, redirects, header timeout)
//!     → reqwest::Response with an unread body stream
//!     → http layer relays status, selected headers and the stream
//!     → tracker.rs guard lives inside the body until it is dropped
//! ```

pub mod client;
pub mod tracker;

pub use client::{ClientBuildError, UpstreamClient};
pub use tracker::{StreamGuard, StreamTracker};
