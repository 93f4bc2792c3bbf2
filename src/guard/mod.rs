//! SSRF guard
//!
//! Every URL the crawler is about to fetch, and every URL a fetch was
//! redirected to, passes through [`SsrfGuard::validate`]. The hostname is
//! resolved on every call and all of its addresses must be globally routable.
//! Results are never cached: DNS answers change over time.

mod ranges;

pub use ranges::is_global;

use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Reasons a URL is refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("URL must be of scheme http or https, got '{0}'")]
    InvalidScheme(String),

    #[error("URL must include a hostname")]
    MissingHost,

    #[error("DNS resolution failed for {host}: {message}")]
    DnsFailure { host: String, message: String },

    #[error("Non-global IP address detected: {ip}; loopback, link-local, private and multicast ranges may not be crawled")]
    NonGlobalAddress { ip: IpAddr },
}

/// Validates crawl targets against internal-network access
#[derive(Debug, Clone, Copy)]
pub struct SsrfGuard {
    enforce: bool,
}

impl Default for SsrfGuard {
    fn default() -> Self {
        Self::enforcing()
    }
}

impl SsrfGuard {
    /// Creates a guard; a disabled guard accepts every URL
    pub fn new(enforce: bool) -> Self {
        Self { enforce }
    }

    /// Creates an enforcing guard
    pub fn enforcing() -> Self {
        Self::new(true)
    }

    /// Creates a guard that accepts everything (trusted internal deployments)
    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Whether checks are applied
    pub fn is_enforced(&self) -> bool {
        self.enforce
    }

    /// Validates a URL
    ///
    /// # Rules
    ///
    /// 1. Scheme must be `http` or `https`
    /// 2. A host must be present
    /// 3. The host must resolve
    /// 4. Every resolved address must be globally routable
    pub async fn validate(&self, url: &Url) -> Result<(), GuardError> {
        if !self.enforce {
            return Ok(());
        }

        let host = check_shape(url)?;
        let port = url.port_or_known_default().unwrap_or(80);

        // IP literals need no lookup; brackets are already stripped by `Url`
        let addresses: Vec<IpAddr> = match host.parse::<IpAddr>() {
            Ok(ip) => vec![ip],
            Err(_) => tokio::net::lookup_host((host.as_str(), port))
                .await
                .map_err(|e| GuardError::DnsFailure {
                    host: host.clone(),
                    message: e.to_string(),
                })?
                .map(|addr| addr.ip())
                .collect(),
        };

        if addresses.is_empty() {
            return Err(GuardError::DnsFailure {
                host,
                message: "no addresses returned".to_string(),
            });
        }

        check_addresses(&addresses)
    }

    /// Rejects a URL whose host is a non-global IP literal, without any lookup
    ///
    /// Hostnames pass; they are resolved by [`SsrfGuard::validate`].
    pub fn check_literal(&self, url: &Url) -> Result<(), GuardError> {
        if !self.enforce {
            return Ok(());
        }
        match url.host() {
            Some(url::Host::Ipv4(ip)) => check_addresses(&[IpAddr::V4(ip)]),
            Some(url::Host::Ipv6(ip)) => check_addresses(&[IpAddr::V6(ip)]),
            _ => Ok(()),
        }
    }
}

/// Checks scheme and host presence, returning the host (without IPv6 brackets)
fn check_shape(url: &Url) -> Result<String, GuardError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(GuardError::InvalidScheme(url.scheme().to_string()));
    }

    match url.host() {
        Some(url::Host::Domain(domain)) if !domain.is_empty() => Ok(domain.to_string()),
        Some(url::Host::Ipv4(ip)) => Ok(ip.to_string()),
        Some(url::Host::Ipv6(ip)) => Ok(ip.to_string()),
        _ => Err(GuardError::MissingHost),
    }
}

/// Rejects the first non-global address in a resolved set
pub fn check_addresses(addresses: &[IpAddr]) -> Result<(), GuardError> {
    match addresses.iter().find(|ip| !is_global(ip)) {
        Some(ip) => Err(GuardError::NonGlobalAddress { ip: *ip }),
        None => Ok(()),
    }
}
