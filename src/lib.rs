//! Audio stream proxy library.
//!
//! Relays audio byte streams from upstreams that enforce referrer checks,
//! adding permissive CORS headers so any web page can play them.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
