//! The stream proxy endpoint.
//!
//! ```text
//! GET /proxy?url=<percent-encoded target>
//!     → extract + decode target (400 if missing)
//!     → target policy (403 if forbidden)
//!     → upstream GET with fixed headers (500 on transport failure)
//!     → non-2xx upstream: status mirrored, diagnostic body
//!     → 2xx upstream: status + relay headers + streamed body (idle-bounded)
//!
//! HEAD /proxy → 405, never fetched
//! ```

use std::time::Instant;

use axum::{
    extract::State,
    http::{
        header::{ALLOW, RANGE},
        HeaderMap, HeaderValue, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
};

use crate::error::ProxyError;
use crate::http::request::{extract_target, request_id};
use crate::http::response;
use crate::http::server::{AppState, ProxyState};
use crate::observability::metrics;

/// Proxy handler for `GET`.
pub async fn proxy_handler(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    let start = Instant::now();
    let snapshot = state.load();
    let request_id = request_id(&headers);
    let range = headers.get(RANGE);

    match forward(&snapshot, &uri, range).await {
        Ok(upstream) => {
            let status = upstream.status();
            tracing::debug!(
                request_id = %request_id,
                status = %status,
                content_length = ?upstream.content_length(),
                ranged = range.is_some(),
                "Streaming upstream response"
            );
            metrics::record_request("ok", status.as_u16(), start);
            let relay_headers = snapshot.response.headers(upstream.headers(), range.is_some());
            let body = snapshot.upstream.body_stream(upstream);
            snapshot
                .response
                .relay(status, relay_headers, body, state.streams().track())
        }
        Err(err) => {
            match &err {
                ProxyError::MissingUrl | ProxyError::ForbiddenTarget(_) => {
                    tracing::debug!(request_id = %request_id, error = %err, "Rejected request")
                }
                ProxyError::Upstream(status) => {
                    tracing::warn!(request_id = %request_id, status = %status, "Upstream error")
                }
                _ => tracing::error!(request_id = %request_id, error = %err.body(), "Proxy error"),
            }
            metrics::record_request(err.outcome(), err.status().as_u16(), start);
            err.into_response()
        }
    }
}

/// Preflight handler for `OPTIONS`.
pub async fn preflight_handler() -> Response {
    response::preflight()
}

/// `HEAD` would cost a full upstream GET whose body is thrown away.
pub async fn head_handler() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(ALLOW, response::ALLOWED_METHODS)],
    )
        .into_response()
}

/// Resolve the target and fetch it, returning only successful upstream responses.
async fn forward(
    state: &ProxyState,
    uri: &Uri,
    range: Option<&HeaderValue>,
) -> Result<reqwest::Response, ProxyError> {
    let target = extract_target(uri)?;
    state.policy.check(&target)?;

    tracing::debug!(target = %target, "Fetching upstream");
    let upstream = state.upstream.fetch(target, range).await?;

    let status = upstream.status();
    if !status.is_success() {
        return Err(ProxyError::Upstream(status));
    }
    Ok(upstream)
}
