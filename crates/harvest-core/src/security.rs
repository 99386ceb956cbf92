//! URL validation for SSRF protection.
//!
//! Candidate URLs come from scraped listing pages and are fetched
//! server-side, so every URL is validated before any network I/O:
//! - scheme must be http/https (no file://, ftp://, javascript:)
//! - host must not be loopback, private, link-local, multicast, or a
//!   cloud metadata endpoint, for both IPv4 and IPv6
//! - in strict mode the host must match the configured CDN allowlist
//! - DNS results are re-checked against the blocklist (DNS rebinding)

use std::collections::HashSet;
use std::net::IpAddr;

use url::Host;

use crate::config::SecurityConfig;
use crate::error::ValidationError;

/// Outcome of validating one candidate URL, for reporting paths that want
/// a value instead of an error.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub reason: Option<String>,
}

impl From<Result<(), ValidationError>> for ValidationResult {
    fn from(result: Result<(), ValidationError>) -> Self {
        match result {
            Ok(()) => Self {
                is_valid: true,
                reason: None,
            },
            Err(e) => Self {
                is_valid: false,
                reason: Some(e.to_string()),
            },
        }
    }
}

/// URL validator with strict (allowlist) and permissive modes.
#[derive(Debug, Clone)]
pub struct UrlValidator {
    strict: bool,
    allowed_cdn_domains: Vec<String>,
    blocked_hosts: HashSet<String>,
    blocked_nets: Vec<ipnet::IpNet>,
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::new(&SecurityConfig::default())
    }
}

impl UrlValidator {
    /// Create a validator from the security configuration.
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            strict: config.strict_url_mode,
            allowed_cdn_domains: config
                .allowed_cdn_domains
                .iter()
                .map(|d| d.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            blocked_hosts: [
                "localhost",
                "metadata.google.internal",
                "metadata.gke.internal",
                "instance-data",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            blocked_nets: vec![
                "0.0.0.0/8".parse().unwrap(),     // "this network"
                "10.0.0.0/8".parse().unwrap(),    // RFC 1918
                "100.64.0.0/10".parse().unwrap(), // carrier-grade NAT
                "127.0.0.0/8".parse().unwrap(),   // loopback
                "169.254.0.0/16".parse().unwrap(), // link-local / cloud metadata
                "172.16.0.0/12".parse().unwrap(), // RFC 1918
                "192.168.0.0/16".parse().unwrap(), // RFC 1918
                "224.0.0.0/4".parse().unwrap(),   // multicast
                "240.0.0.0/4".parse().unwrap(),   // reserved
                "::/128".parse().unwrap(),        // unspecified
                "::1/128".parse().unwrap(),       // IPv6 loopback
                "fc00::/7".parse().unwrap(),      // IPv6 unique-local
                "fe80::/10".parse().unwrap(),     // IPv6 link-local
                "ff00::/8".parse().unwrap(),      // IPv6 multicast
            ],
        }
    }

    /// Block an additional host name.
    pub fn block_host(mut self, host: impl Into<String>) -> Self {
        self.blocked_hosts.insert(host.into());
        self
    }

    /// Add a CDN domain to the strict-mode allowlist.
    pub fn allow_cdn_domain(mut self, domain: impl Into<String>) -> Self {
        self.allowed_cdn_domains
            .push(domain.into().trim_start_matches('.').to_ascii_lowercase());
        self
    }

    /// Validate a candidate URL without touching the network.
    pub fn validate(&self, raw: &str) -> Result<(), ValidationError> {
        if raw.trim().is_empty() {
            return Err(ValidationError::EmptyUrl);
        }

        let parsed = url::Url::parse(raw)?;

        let scheme = parsed.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ValidationError::DisallowedScheme(scheme.to_string()));
        }

        match parsed.host() {
            None => Err(ValidationError::NoHost),
            Some(Host::Ipv4(ip)) => {
                self.check_ip(&IpAddr::V4(ip))?;
                if self.strict {
                    // IP literals cannot match a domain allowlist
                    return Err(ValidationError::NotAllowlisted(ip.to_string()));
                }
                Ok(())
            }
            Some(Host::Ipv6(ip)) => {
                self.check_ip(&IpAddr::V6(ip))?;
                if self.strict {
                    return Err(ValidationError::NotAllowlisted(ip.to_string()));
                }
                Ok(())
            }
            Some(Host::Domain(domain)) => {
                let domain = domain.to_ascii_lowercase();
                if self.blocked_hosts.contains(&domain) {
                    return Err(ValidationError::BlockedHost(domain));
                }
                if self.strict && !self.domain_allowlisted(&domain) {
                    return Err(ValidationError::NotAllowlisted(domain));
                }
                Ok(())
            }
        }
    }

    /// Validate a URL, then resolve its host and re-check every returned IP
    /// against the blocklist.
    ///
    /// Catches DNS rebinding: a public-looking hostname that resolves to an
    /// internal address is rejected before any fetch.
    pub async fn validate_resolved(&self, raw: &str) -> Result<(), ValidationError> {
        self.validate(raw)?;

        let parsed = url::Url::parse(raw)?;
        let Some(Host::Domain(domain)) = parsed.host() else {
            // IP literals were already checked in validate()
            return Ok(());
        };

        let port = parsed.port_or_known_default().unwrap_or(443);
        let addrs = tokio::net::lookup_host((domain, port))
            .await
            .map_err(|e| ValidationError::DnsResolution(format!("{domain}: {e}")))?;

        for addr in addrs {
            if let Err(e) = self.check_ip(&addr.ip()) {
                tracing::warn!("DNS for {domain} resolved to a blocked address: {e}");
                return Err(ValidationError::BlockedIp(format!(
                    "{domain} resolved to {}",
                    addr.ip()
                )));
            }
        }

        Ok(())
    }

    /// Non-raising view of `validate` for reporting.
    pub fn check(&self, raw: &str) -> ValidationResult {
        self.validate(raw).into()
    }

    fn check_ip(&self, ip: &IpAddr) -> Result<(), ValidationError> {
        // Unwrap IPv4-mapped IPv6 (::ffff:10.0.0.1) so the v4 blocklist applies
        let canonical = match ip {
            IpAddr::V6(v6) => v6
                .to_ipv4_mapped()
                .map(IpAddr::V4)
                .unwrap_or(IpAddr::V6(*v6)),
            v4 => *v4,
        };

        for net in &self.blocked_nets {
            if net.contains(&canonical) {
                return Err(ValidationError::BlockedIp(format!("{ip} in {net}")));
            }
        }
        Ok(())
    }

    /// Exact or subdomain allowlist match.
    ///
    /// Suffix matching requires the leading dot, so neither
    /// `evilphotos.zillowstatic.com.attacker.net` (prepending) nor
    /// `notssl.cdn-redfin.com.evil.io` style hosts can slip through.
    fn domain_allowlisted(&self, domain: &str) -> bool {
        self.allowed_cdn_domains
            .iter()
            .any(|allowed| domain == allowed || domain.ends_with(&format!(".{allowed}")))
    }
}
