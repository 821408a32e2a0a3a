//! Outbound HTTP client.
//!
//! # Responsibilities
//! - Send a fixed, sanitized header set to every upstream
//! - Never send `Referer`
//! - Follow redirects up to a configured limit
//! - Bound the wait for response headers
//! - Bound the gap between body chunks
//!
//! # Design Decisions
//! - The header timeout wraps `send()` only; long audio bodies keep streaming
//!   as long as each chunk arrives within the idle timeout
//! - Redirect hops get no referer either (`referer(false)`)
//! - No retries: every failure is reported to the caller as-is

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{
    header::{ACCEPT, ACCEPT_LANGUAGE, RANGE, USER_AGENT},
    HeaderMap, HeaderValue,
};
use futures_util::{stream, Stream, StreamExt};
use reqwest::redirect::Policy;
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::ProxyError;

/// Error building the client from configuration.
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("invalid header value for {0}")]
    Header(&'static str),

    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Client used for all upstream fetches. Cheap to clone.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    inner: reqwest::Client,
    header_timeout: Duration,
    idle_timeout: Duration,
    forward_range: bool,
}

impl UpstreamClient {
    /// Build a client from the upstream configuration.
    pub fn new(config: &UpstreamConfig) -> Result<Self, ClientBuildError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value(&config.user_agent, "user_agent")?);
        headers.insert(ACCEPT, header_value(&config.accept, "accept")?);
        headers.insert(
            ACCEPT_LANGUAGE,
            header_value(&config.accept_language, "accept_language")?,
        );

        let inner = reqwest::Client::builder()
            .default_headers(headers)
            .referer(false)
            .redirect(Policy::limited(config.max_redirects))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .no_proxy()
            .build()?;

        Ok(Self {
            inner,
            header_timeout: Duration::from_secs(config.timeout_secs),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            forward_range: config.forward_range,
        })
    }

    /// Whether inbound `Range` headers are passed upstream.
    pub fn forwards_range(&self) -> bool {
        self.forward_range
    }

    /// Issue a GET to `target` and wait for the response headers.
    ///
    /// The returned response still owns the unread body stream.
    pub async fn fetch(
        &self,
        target: Url,
        range: Option<&HeaderValue>,
    ) -> Result<reqwest::Response, ProxyError> {
        let mut request = self.inner.get(target);
        if let Some(range) = range.filter(|_| self.forward_range) {
            request = request.header(RANGE, range.clone());
        }

        match tokio::time::timeout(self.header_timeout, request.send()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ProxyError::Timeout(self.header_timeout)),
        }
    }

    /// The unread body of `response`, ended with [`ProxyError::Stalled`]
    /// if upstream goes quiet for longer than the idle timeout.
    pub fn body_stream(
        &self,
        response: reqwest::Response,
    ) -> impl Stream<Item = Result<Bytes, ProxyError>> + Send + 'static {
        idle_bounded(response.bytes_stream(), self.idle_timeout)
    }
}

/// Yield chunks from `body` until it ends, fails, or stays silent for `idle`.
///
/// A stall or transport error is yielded once as the final item; the
/// inner stream is dropped with it.
pub fn idle_bounded<S, E>(
    body: S,
    idle: Duration,
) -> impl Stream<Item = Result<Bytes, ProxyError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<ProxyError> + Send + 'static,
{
    stream::unfold(Some(Box::pin(body)), move |body| async move {
        let mut body = body?;
        match tokio::time::timeout(idle, body.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(body))),
            Ok(Some(Err(e))) => Some((Err(e.into()), None)),
            Ok(None) => None,
            Err(_) => {
                tracing::warn!(idle_secs = idle.as_secs(), "Upstream body stalled, dropping stream");
                Some((Err(ProxyError::Stalled(idle)), None))
            }
        }
    })
}

fn header_value(value: &str, field: &'static str) -> Result<HeaderValue, ClientBuildError> {
    HeaderValue::from_str(value).map_err(|_| ClientBuildError::Header(field))
}
