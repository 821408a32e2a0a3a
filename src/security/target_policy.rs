//! Upstream target restrictions.
//!
//! # Responsibilities
//! - Restrict the URL schemes the proxy will fetch
//! - Optionally restrict target hosts to an allow-list
//!
//! # Design Decisions
//! - Host matching is case-insensitive
//! - `*.example.com` matches any subdomain of example.com, not the apex
//! - Empty host list = any host (open relay, the historical behavior)

use url::Url;

use crate::config::SecurityConfig;
use crate::error::ProxyError;

/// A single allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
enum HostRule {
    Exact(String),
    Subdomains(String),
}

impl HostRule {
    fn parse(entry: &str) -> Self {
        let entry = entry.trim().to_lowercase();
        match entry.strip_prefix("*.") {
            Some(suffix) => HostRule::Subdomains(format!(".{suffix}")),
            None => HostRule::Exact(entry),
        }
    }

    fn matches(&self, host: &str) -> bool {
        match self {
            HostRule::Exact(expected) => host == expected,
            HostRule::Subdomains(suffix) => host.len() > suffix.len() && host.ends_with(suffix.as_str()),
        }
    }
}

/// Decides whether a decoded target may be fetched.
#[derive(Debug, Clone)]
pub struct TargetPolicy {
    schemes: Vec<String>,
    hosts: Vec<HostRule>,
}

impl TargetPolicy {
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self {
            schemes: config
                .allowed_schemes
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
            hosts: config.allowed_hosts.iter().map(|h| HostRule::parse(h)).collect(),
        }
    }

    /// True when no host allow-list is configured.
    pub fn is_open(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Check a target against the policy.
    pub fn check(&self, target: &Url) -> Result<(), ProxyError> {
        let host = target.host_str().unwrap_or_default().to_lowercase();

        if !self.schemes.iter().any(|s| s == target.scheme()) {
            return Err(ProxyError::ForbiddenTarget(format!("{}://{}", target.scheme(), host)));
        }
        if self.is_open() || self.hosts.iter().any(|rule| rule.matches(&host)) {
            Ok(())
        } else {
            Err(ProxyError::ForbiddenTarget(host))
        }
    }
}
