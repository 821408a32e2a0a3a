//! Proxy error taxonomy and its HTTP mapping.
//!
//! Every failure is terminal for its request and is answered synchronously
//! with a plain-text body. Only the missing-parameter case omits CORS headers.

use std::error::Error as _;
use std::time::Duration;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::http::response::cors_headers;

/// Errors produced while proxying a single request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The `url` query parameter was absent or empty.
    #[error("Missing url parameter")]
    MissingUrl,

    /// The decoded target is not an absolute URL.
    #[error("invalid target URL {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },

    /// The target's scheme or host is not allowed by configuration.
    #[error("Forbidden target: {0}")]
    ForbiddenTarget(String),

    /// Upstream answered with a non-success status.
    #[error("Upstream error: {}", .0.as_u16())]
    Upstream(StatusCode),

    /// Network-level failure reaching upstream.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// Upstream did not send response headers in time.
    #[error("upstream did not respond within {}s", .0.as_secs())]
    Timeout(Duration),

    /// Upstream stopped sending body bytes mid-stream.
    #[error("upstream sent nothing for {}s", .0.as_secs())]
    Stalled(Duration),
}

impl ProxyError {
    /// HTTP status returned to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingUrl => StatusCode::BAD_REQUEST,
            ProxyError::ForbiddenTarget(_) => StatusCode::FORBIDDEN,
            ProxyError::Upstream(status) => *status,
            ProxyError::InvalidTarget { .. }
            | ProxyError::Transport(_)
            | ProxyError::Timeout(_)
            | ProxyError::Stalled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Label used for metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            ProxyError::MissingUrl => "missing_url",
            ProxyError::ForbiddenTarget(_) => "forbidden",
            ProxyError::Upstream(_) => "upstream_error",
            ProxyError::InvalidTarget { .. } => "invalid_target",
            ProxyError::Transport(_) => "transport_error",
            ProxyError::Timeout(_) => "timeout",
            ProxyError::Stalled(_) => "stalled",
        }
    }

    /// Plain-text body returned to the caller.
    pub fn body(&self) -> String {
        match self {
            ProxyError::MissingUrl | ProxyError::ForbiddenTarget(_) | ProxyError::Upstream(_) => {
                self.to_string()
            }
            ProxyError::InvalidTarget { .. }
            | ProxyError::Transport(_)
            | ProxyError::Timeout(_)
            | ProxyError::Stalled(_) => format!("Proxy error: {}", transport_message(self)),
        }
    }
}

/// Describe a transport failure including its source chain, which is where
/// reqwest keeps the useful part ("connection refused", "dns error").
fn transport_message(err: &ProxyError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.body();
        let content_type = [(header::CONTENT_TYPE, "text/plain; charset=utf-8")];

        if matches!(self, ProxyError::MissingUrl) {
            return (status, content_type, body).into_response();
        }
        (status, cors_headers(), content_type, body).into_response()
    }
}
