//! Response construction for relayed upstream bodies.
//!
//! # Responsibilities
//! - Replace the upstream header set with the relay header set
//! - Add permissive CORS headers
//! - Stream the upstream body without buffering it
//!
//! # Design Decisions
//! - Only `Content-Type`, `Content-Length` and `Content-Range` are taken
//!   from upstream; everything else is dropped
//! - Status is passed through verbatim so 206 survives
//! - Dropping the response body drops the upstream stream and its connection
//! - A stalled or failed upstream body ends the response early

use axum::{
    body::{Body, Bytes},
    http::{
        header::{
            ACCEPT_RANGES, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, CACHE_CONTROL, CONTENT_LENGTH,
            CONTENT_RANGE, CONTENT_TYPE,
        },
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use futures_util::{Stream, StreamExt, TryStreamExt};

use crate::config::ResponseConfig;
use crate::error::ProxyError;
use crate::observability::metrics;
use crate::upstream::StreamGuard;

/// Methods advertised to browsers.
pub const ALLOWED_METHODS: &str = "GET, OPTIONS";

/// CORS headers carried by every relayed or upstream-error response.
pub fn cors_headers() -> [(HeaderName, &'static str); 2] {
    [
        (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS),
    ]
}

/// Answer to a CORS preflight request.
pub fn preflight() -> Response {
    (
        StatusCode::NO_CONTENT,
        cors_headers(),
        [
            (ACCESS_CONTROL_ALLOW_HEADERS, "Range"),
            (ACCESS_CONTROL_MAX_AGE, "86400"),
        ],
    )
        .into_response()
}

/// Pre-validated header values applied to every relayed response.
#[derive(Debug, Clone)]
pub struct ResponseTemplate {
    default_content_type: HeaderValue,
    cache_control: HeaderValue,
}

impl ResponseTemplate {
    pub fn from_config(config: &ResponseConfig) -> Result<Self, InvalidTemplate> {
        let value = |field: &'static str, v: &str| {
            HeaderValue::from_str(v).map_err(|_| InvalidTemplate {
                field,
                value: v.to_string(),
            })
        };
        Ok(Self {
            default_content_type: value("default_content_type", &config.default_content_type)?,
            cache_control: value("cache_control", &config.cache_control)?,
        })
    }

    /// Headers for a relayed response.
    ///
    /// `ranged` is whether the caller sent a `Range` header.
    pub fn headers(&self, upstream: &HeaderMap, ranged: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            upstream
                .get(CONTENT_TYPE)
                .cloned()
                .unwrap_or_else(|| self.default_content_type.clone()),
        );
        if let Some(length) = upstream.get(CONTENT_LENGTH) {
            headers.insert(CONTENT_LENGTH, length.clone());
        }
        for (name, value) in cors_headers() {
            headers.insert(name, HeaderValue::from_static(value));
        }
        headers.insert(CACHE_CONTROL, self.cache_control.clone());

        if ranged {
            headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
            if let Some(range) = upstream.get(CONTENT_RANGE) {
                headers.insert(CONTENT_RANGE, range.clone());
            }
        }
        headers
    }

    /// Build the caller's response around an upstream body.
    ///
    /// `guard` is owned by the body stream and released with it. A body
    /// error aborts the response mid-stream.
    pub fn relay<S>(
        &self,
        status: StatusCode,
        headers: HeaderMap,
        body: S,
        guard: StreamGuard,
    ) -> Response
    where
        S: Stream<Item = Result<Bytes, ProxyError>> + Send + 'static,
    {
        let body = Body::from_stream(
            body.inspect_ok(|chunk| metrics::record_streamed_bytes(chunk.len()))
                .map(move |chunk| {
                    let _held = &guard;
                    chunk
                }),
        );

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

/// A configured response header that cannot be sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("response.{field}: not a valid header value {value:?}")]
pub struct InvalidTemplate {
    pub field: &'static str,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::StreamTracker;

    fn template() -> ResponseTemplate {
        ResponseTemplate::from_config(&ResponseConfig::default()).unwrap()
    }

    fn upstream(pairs: &[(HeaderName, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(name.clone(), HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn copies_type_and_length() {
        let headers = template().headers(
            &upstream(&[(CONTENT_TYPE, "audio/mp4"), (CONTENT_LENGTH, "1000")]),
            false,
        );
        assert_eq!(headers[CONTENT_TYPE], "audio/mp4");
        assert_eq!(headers[CONTENT_LENGTH], "1000");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "GET, OPTIONS");
        assert_eq!(headers[CACHE_CONTROL], "public, max-age=3600");
        assert!(headers.get(ACCEPT_RANGES).is_none());
    }

    #[test]
    fn defaults_content_type() {
        let headers = template().headers(&HeaderMap::new(), false);
        assert_eq!(headers[CONTENT_TYPE], "audio/mpeg");
        assert!(headers.get(CONTENT_LENGTH).is_none());
    }

    #[test]
    fn drops_unlisted_upstream_headers() {
        let headers = template().headers(
            &upstream(&[
                (HeaderName::from_static("set-cookie"), "a=b"),
                (CACHE_CONTROL, "no-store"),
            ]),
            false,
        );
        assert!(headers.get("set-cookie").is_none());
        assert_eq!(headers[CACHE_CONTROL], "public, max-age=3600");
    }

    #[test]
    fn ranged_request_adds_range_headers() {
        let up = upstream(&[(CONTENT_RANGE, "bytes 0-99/1000")]);

        let headers = template().headers(&up, true);
        assert_eq!(headers[ACCEPT_RANGES], "bytes");
        assert_eq!(headers[CONTENT_RANGE], "bytes 0-99/1000");

        let headers = template().headers(&up, false);
        assert!(headers.get(CONTENT_RANGE).is_none());
    }

    #[test]
    fn preflight_is_no_content_with_cors() {
        let response = preflight();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_HEADERS], "Range");
    }

    #[tokio::test]
    async fn relay_streams_body_and_releases_guard() {
        let tracker = StreamTracker::new();
        let body = futures_util::stream::iter(vec![
            Ok::<_, ProxyError>(Bytes::from_static(b"ab")),
            Ok(Bytes::from_static(b"cd")),
        ]);

        let response = template().relay(StatusCode::PARTIAL_CONTENT, HeaderMap::new(), body, tracker.track());
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(tracker.active_count(), 1);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"abcd");
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn stalled_body_aborts_response() {
        let tracker = StreamTracker::new();
        let body = futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b"ab")),
            Err(ProxyError::Stalled(std::time::Duration::from_secs(1))),
        ]);

        let response = template().relay(StatusCode::OK, HeaderMap::new(), body, tracker.track());
        assert!(axum::body::to_bytes(response.into_body(), usize::MAX).await.is_err());
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn rejects_unsendable_cache_control() {
        let err = ResponseTemplate::from_config(&ResponseConfig {
            cache_control: "max-age=1\r\n".into(),
            ..ResponseConfig::default()
        })
        .unwrap_err();
        assert_eq!(err.field, "cache_control");
    }
}
