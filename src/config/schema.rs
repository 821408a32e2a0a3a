//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Desktop browser user agent sent to every upstream.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Root configuration for the stream proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, route path).
    pub listener: ListenerConfig,

    /// Outbound request settings.
    pub upstream: UpstreamConfig,

    /// Headers applied to relayed responses.
    pub response: ResponseConfig,

    /// Target restrictions.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Path the proxy endpoint is mounted on.
    pub path: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            path: "/proxy".to_string(),
        }
    }
}

/// Outbound request configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// `User-Agent` sent upstream.
    pub user_agent: String,

    /// `Accept` sent upstream.
    pub accept: String,

    /// `Accept-Language` sent upstream.
    pub accept_language: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Time allowed for upstream response headers in seconds.
    /// Body streaming is not bounded by this.
    pub timeout_secs: u64,

    /// Longest gap between two body chunks before the stream is dropped.
    pub idle_timeout_secs: u64,

    /// Maximum redirects followed before giving up.
    pub max_redirects: usize,

    /// Forward the caller's `Range` header upstream.
    pub forward_range: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: "*/*".to_string(),
            accept_language: "zh-CN,zh;q=0.9,en;q=0.8".to_string(),
            connect_timeout_secs: 10,
            timeout_secs: 30,
            idle_timeout_secs: 30,
            max_redirects: 10,
            forward_range: true,
        }
    }
}

/// Response header configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ResponseConfig {
    /// `Content-Type` used when upstream does not send one.
    pub default_content_type: String,

    /// `Cache-Control` set on every relayed response.
    pub cache_control: String,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            default_content_type: "audio/mpeg".to_string(),
            cache_control: "public, max-age=3600".to_string(),
        }
    }
}

/// Target restriction configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Hosts the proxy may contact. Empty means any host.
    pub allowed_hosts: Vec<String>,

    /// URL schemes the proxy may contact.
    pub allowed_schemes: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: Vec::new(),
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_baseline_headers() {
        let config = ProxyConfig::default();
        assert_eq!(config.listener.path, "/proxy");
        assert_eq!(config.upstream.accept, "*/*");
        assert!(config.upstream.user_agent.contains("Chrome/120.0.0.0"));
        assert_eq!(config.upstream.timeout_secs, 30);
        assert_eq!(config.upstream.idle_timeout_secs, 30);
        assert_eq!(config.response.default_content_type, "audio/mpeg");
        assert_eq!(config.response.cache_control, "public, max-age=3600");
        assert!(config.security.allowed_hosts.is_empty());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [upstream]
            timeout_secs = 5

            [security]
            allowed_hosts = ["music.example.com"]
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.timeout_secs, 5);
        assert_eq!(config.upstream.accept, "*/*");
        assert_eq!(config.security.allowed_hosts, vec!["music.example.com"]);
        assert_eq!(config.security.allowed_schemes, vec!["http", "https"]);
        assert_eq!(config.listener, ListenerConfig::default());
    }
}
