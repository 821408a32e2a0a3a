//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID + trace middleware)
//!     → request.rs (request ID, target extraction and decoding)
//!     → proxy.rs (policy check, upstream fetch, error mapping)
//!     → response.rs (relay headers, CORS, streamed body)
//!     → Send to client
//! ```

pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ProxyState, ServerError};
