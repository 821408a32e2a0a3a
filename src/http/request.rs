//! Inbound request handling.
//!
//! # Responsibilities
//! - Generate unique request IDs (UUID v4) for tracing
//! - Extract and decode the target URL from the query string
//!
//! # Design Decisions
//! - Request ID added as early as possible, before the trace span opens
//! - The `url` parameter is percent-decoded exactly once
//! - Caller headers other than `Range` never influence the upstream request

use axum::http::{HeaderMap, HeaderValue, Request, Uri};
use tower_http::request_id::{MakeRequestId, RequestId};
use url::Url;
use uuid::Uuid;

use crate::error::ProxyError;

/// Header carrying the request ID in both directions.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Query parameter holding the percent-encoded target.
pub const TARGET_PARAM: &str = "url";

/// Generates a fresh UUID v4 for requests that arrive without an ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Request ID of an inbound request, or `"unknown"` outside the ID layer.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// The decoded `url` query parameter, if present and non-empty.
pub fn target_param(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == TARGET_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Parse a decoded target into an absolute URL.
pub fn parse_target(raw: &str) -> Result<Url, ProxyError> {
    Url::parse(raw).map_err(|e| ProxyError::InvalidTarget {
        target: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Extract, decode and parse the target of a proxy request.
pub fn extract_target(uri: &Uri) -> Result<Url, ProxyError> {
    let raw = target_param(uri).ok_or(ProxyError::MissingUrl)?;
    parse_target(&raw)
}
