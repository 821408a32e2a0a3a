//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and that every
//! configured header value can actually be sent. All problems are reported
//! at once rather than stopping at the first.

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::http::server::HEALTH_PATH;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("listener.path must start with '/', got {0:?}")]
    InvalidPath(String),

    #[error("listener.path {0:?} is reserved")]
    ReservedPath(String),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{field}: not a valid header value {value:?}")]
    InvalidHeaderValue { field: &'static str, value: String },

    #[error("security.allowed_schemes: unsupported scheme {0:?}")]
    UnsupportedScheme(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if !config.listener.path.starts_with('/') {
        errors.push(ValidationError::InvalidPath(config.listener.path.clone()));
    } else if config.listener.path == HEALTH_PATH {
        errors.push(ValidationError::ReservedPath(config.listener.path.clone()));
    }

    let upstream = &config.upstream;
    if upstream.timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("upstream.timeout_secs"));
    }
    if upstream.idle_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("upstream.idle_timeout_secs"));
    }
    if upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("upstream.connect_timeout_secs"));
    }
    if upstream.user_agent.trim().is_empty() {
        errors.push(ValidationError::Empty("upstream.user_agent"));
    }

    let header_fields = [
        ("upstream.user_agent", &upstream.user_agent),
        ("upstream.accept", &upstream.accept),
        ("upstream.accept_language", &upstream.accept_language),
        ("response.default_content_type", &config.response.default_content_type),
        ("response.cache_control", &config.response.cache_control),
    ];
    for (field, value) in header_fields {
        if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::InvalidHeaderValue {
                field,
                value: value.clone(),
            });
        }
    }

    if config.security.allowed_schemes.is_empty() {
        errors.push(ValidationError::Empty("security.allowed_schemes"));
    }
    for scheme in &config.security.allowed_schemes {
        if !matches!(scheme.to_ascii_lowercase().as_str(), "http" | "https") {
            errors.push(ValidationError::UnsupportedScheme(scheme.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
