//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Decoded target URL:
//!     → target_policy.rs (scheme check, optional host allow-list)
//!     → Pass to upstream client
//! ```
//!
//! # Design Decisions
//! - Checked before any upstream contact
//! - Rejections answer 403 and never reach the network

pub mod target_policy;

pub use target_policy::TargetPolicy;
