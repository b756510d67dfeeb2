//! SSRF policy for externally-supplied download URLs.
//!
//! Validation happens twice: once on the URL itself (scheme, hostname,
//! IP literals) and again on every address DNS resolution returns, so a
//! hostname cannot smuggle a private target past the literal checks. Every
//! redirect hop goes through the same gate.

use std::net::IpAddr;
use thiserror::Error;

use url::Url;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UrlPolicyError {
    #[error("URL scheme '{0}' is not allowed")]
    SchemeNotAllowed(String),

    #[error("URL has no host")]
    HostMissing,

    #[error("host '{0}' is blocked")]
    BlockedHost(String),

    #[error("address {0} is in a private or local range")]
    PrivateAddress(IpAddr),
}

const BLOCKED_SUFFIXES: &[&str] = &[
    ".local",
    ".internal",
    ".lan",
    ".home",
    ".svc",
    ".cluster.local",
];

#[derive(Debug, Clone)]
pub struct UrlPolicy {
    /// Reject plain `http` when set.
    pub https_only: bool,
    /// Master switch for the private-network checks. Off means only the
    /// scheme check applies (useful against test fixtures).
    pub block_unsafe: bool,
}

impl UrlPolicy {
    pub fn validate_url(&self, url: &Url) -> Result<(), UrlPolicyError> {
        match url.scheme() {
            "https" => {}
            "http" if !self.https_only => {}
            other => return Err(UrlPolicyError::SchemeNotAllowed(other.to_string())),
        }

        if !self.block_unsafe {
            return Ok(());
        }

        match url.host() {
            None => Err(UrlPolicyError::HostMissing),
            Some(url::Host::Ipv4(ip)) => self.validate_resolved_addr(IpAddr::V4(ip)),
            Some(url::Host::Ipv6(ip)) => self.validate_resolved_addr(IpAddr::V6(ip)),
            Some(url::Host::Domain(domain)) => {
                let lower = domain.trim_end_matches('.').to_ascii_lowercase();
                if lower == "localhost"
                    || BLOCKED_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
                {
                    return Err(UrlPolicyError::BlockedHost(lower));
                }
                Ok(())
            }
        }
    }

    /// Re-check every address DNS resolution produced for a domain host.
    pub fn validate_resolved_addr(&self, addr: IpAddr) -> Result<(), UrlPolicyError> {
        if self.block_unsafe && is_private_or_local(addr) {
            return Err(UrlPolicyError::PrivateAddress(addr));
        }
        Ok(())
    }
}

fn is_private_or_local(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_or_local(IpAddr::V4(mapped));
            }
            let segments = v6.segments();
            v6.is_loopback()
                || v6.is_unspecified()
                // ULA fc00::/7
                || (segments[0] & 0xfe00) == 0xfc00
                // link-local fe80::/10
                || (segments[0] & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> UrlPolicy {
        UrlPolicy {
            https_only: false,
            block_unsafe: true,
        }
    }

    fn check(url: &str) -> Result<(), UrlPolicyError> {
        policy().validate_url(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_public_urls_pass() {
        assert!(check("https://example.com/a.jpg").is_ok());
        assert!(check("http://cdn.example.org/x").is_ok());
    }

    #[test]
    fn test_scheme_restrictions() {
        assert_eq!(
            check("ftp://example.com/a"),
            Err(UrlPolicyError::SchemeNotAllowed("ftp".to_string()))
        );

        let https_only = UrlPolicy {
            https_only: true,
            block_unsafe: true,
        };
        assert_eq!(
            https_only.validate_url(&Url::parse("http://example.com/a").unwrap()),
            Err(UrlPolicyError::SchemeNotAllowed("http".to_string()))
        );
    }

    #[test]
    fn test_localhost_and_blocked_suffixes() {
        assert_eq!(
            check("http://localhost/x"),
            Err(UrlPolicyError::BlockedHost("localhost".to_string()))
        );
        assert_eq!(
            check("http://LOCALHOST./x"),
            Err(UrlPolicyError::BlockedHost("localhost".to_string()))
        );
        for host in [
            "foo.local",
            "db.internal",
            "nas.lan",
            "router.home",
            "api.svc",
            "api.default.svc.cluster.local",
        ] {
            assert!(
                matches!(
                    check(&format!("http://{}/x", host)),
                    Err(UrlPolicyError::BlockedHost(_))
                ),
                "{} should be blocked",
                host
            );
        }
    }

    #[test]
    fn test_private_ip_literals() {
        for url in [
            "http://127.0.0.1/x",
            "http://10.0.0.1/x",
            "http://172.16.5.5/x",
            "http://192.168.1.1/x",
            "http://169.254.169.254/latest/meta-data",
            "http://0.0.0.0/x",
            "http://[::1]/x",
            "http://[fd00::1]/x",
            "http://[fe80::1]/x",
            "http://[::ffff:10.0.0.1]/x",
        ] {
            assert!(
                matches!(check(url), Err(UrlPolicyError::PrivateAddress(_))),
                "{} should be blocked",
                url
            );
        }
    }

    #[test]
    fn test_public_ip_literal_passes() {
        assert!(check("http://93.184.216.34/x").is_ok());
    }

    #[test]
    fn test_resolved_addr_gate() {
        let p = policy();
        assert!(p
            .validate_resolved_addr("10.0.0.1".parse().unwrap())
            .is_err());
        assert!(p
            .validate_resolved_addr("93.184.216.34".parse().unwrap())
            .is_ok());
    }

    #[test]
    fn test_unsafe_blocking_can_be_disabled() {
        let open = UrlPolicy {
            https_only: false,
            block_unsafe: false,
        };
        assert!(open
            .validate_url(&Url::parse("http://127.0.0.1/x").unwrap())
            .is_ok());
    }
}
