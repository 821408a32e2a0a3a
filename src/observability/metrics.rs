//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by outcome and status
//! - `proxy_request_duration_seconds` (histogram): time until the response
//!   head is ready, by outcome
//! - `proxy_streamed_bytes_total` (counter): body bytes relayed to callers
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the exporter
//! - Duration stops at the response head; streaming time is not measured

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

/// Record a finished proxy request.
pub fn record_request(outcome: &'static str, status: u16, start: Instant) {
    ::metrics::counter!(
        "proxy_requests_total",
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("proxy_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

/// Record body bytes forwarded to a caller.
pub fn record_streamed_bytes(bytes: usize) {
    ::metrics::counter!("proxy_streamed_bytes_total").increment(bytes as u64);
}
