//! Host classification and host/URL plumbing shared by the backends.
//!
//! The classification side decides whether a host or IP is
//! internet-routable. A backend may register a private host (common in
//! on-prem MinIO deployments); resolved URLs then only work inside that
//! network, so the registry leaves a breadcrumb in the logs.

use std::net::{IpAddr, Ipv6Addr};

use crate::traits::{StorageError, StorageResult};

/// Whether the address falls in loopback, link-local, or a reserved private
/// range: RFC1918 IPv4 blocks, 169.254.0.0/16, IPv6 loopback, fe80::/10,
/// fc00::/7. IPv4-mapped IPv6 addresses classify as their IPv4 form.
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            octets[0] == 10
                || (octets[0] == 172 && octets[1] >= 16 && octets[1] <= 31)
                || (octets[0] == 192 && octets[1] == 168)
                || octets[0] == 127
                || (octets[0] == 169 && octets[1] == 254)
        }
        IpAddr::V6(ipv6) => {
            if let Some(ipv4) = ipv6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(ipv4));
            }
            ipv6.is_loopback() || is_ipv6_link_local(ipv6) || is_ipv6_unique_local(ipv6)
        }
    }
}

/// IPv6 link-local unicast: `fe80::/10`.
fn is_ipv6_link_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

/// IPv6 unique-local address: `fc00::/7`.
fn is_ipv6_unique_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

/// Whether a host string (optionally `host:port`) names a private address.
/// `localhost` counts as private; other hostnames are not classified.
pub fn is_private_host(host: &str) -> bool {
    let bare = strip_port(host);
    if bare.eq_ignore_ascii_case("localhost") {
        return true;
    }
    match bare.parse::<IpAddr>() {
        Ok(ip) => is_private_ip(&ip),
        Err(_) => false,
    }
}

/// Host (with port, if any) of a URL or bare `host[:port]` string.
pub(crate) fn host_of(s: &str) -> String {
    let candidate = if has_url_scheme(s) {
        s.to_string()
    } else {
        format!("http://{}", s)
    };
    match reqwest::Url::parse(&candidate) {
        Ok(url) => match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => s.to_string(),
        },
        Err(_) => s.to_string(),
    }
}

/// Append an object key to a base URL or bare host, preserving any path on
/// the base.
pub(crate) fn join_url(base: &str, key: &str) -> StorageResult<String> {
    let base = if has_url_scheme(base) {
        base.to_string()
    } else {
        format!("http://{}", base)
    };
    let mut url =
        reqwest::Url::parse(&base).map_err(|e| StorageError::ConfigError(e.to_string()))?;
    let joined = format!("{}/{}", url.path().trim_end_matches('/'), key);
    url.set_path(&joined);
    Ok(url.to_string())
}

pub(crate) fn has_url_scheme(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literal, e.g. [::1]:9000
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        // A second ':' means a bare IPv6 literal, not host:port
        Some((h, port)) if !h.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => h,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_private_ipv4_ranges() {
        assert!(is_private_ip(&ip("127.0.0.1")));
        assert!(is_private_ip(&ip("10.0.0.1")));
        assert!(is_private_ip(&ip("172.16.0.1")));
        assert!(is_private_ip(&ip("172.31.255.254")));
        assert!(is_private_ip(&ip("192.168.1.1")));
        assert!(is_private_ip(&ip("169.254.10.20")));
    }

    #[test]
    fn test_public_ipv4_is_not_private() {
        assert!(!is_private_ip(&ip("8.8.8.8")));
        assert!(!is_private_ip(&ip("1.1.1.1")));
        assert!(!is_private_ip(&ip("172.32.0.1")));
        assert!(!is_private_ip(&ip("192.169.0.1")));
    }

    #[test]
    fn test_private_ipv6_ranges() {
        assert!(is_private_ip(&ip("::1")));
        assert!(is_private_ip(&ip("fe80::1")));
        assert!(is_private_ip(&ip("fc00::1")));
        assert!(is_private_ip(&ip("fd12:3456:789a::1")));
        assert!(!is_private_ip(&ip("2001:4860:4860::8888")));
    }

    #[test]
    fn test_ipv4_mapped_ipv6_classifies_as_ipv4() {
        assert!(is_private_ip(&ip("::ffff:127.0.0.1")));
        assert!(is_private_ip(&ip("::ffff:10.0.0.1")));
        assert!(!is_private_ip(&ip("::ffff:8.8.8.8")));
    }

    #[test]
    fn test_private_host_forms() {
        assert!(is_private_host("localhost"));
        assert!(is_private_host("LOCALHOST:9000"));
        assert!(is_private_host("127.0.0.1:9000"));
        assert!(is_private_host("[::1]:9000"));
        assert!(is_private_host("::1"));
        assert!(!is_private_host("cdn.example.com"));
        assert!(!is_private_host("8.8.8.8:80"));
    }

    #[test]
    fn test_host_of_strips_scheme_and_path() {
        assert_eq!(host_of("http://localhost:9000/media"), "localhost:9000");
        assert_eq!(host_of("https://cdn.example.com"), "cdn.example.com");
        assert_eq!(host_of("localhost:9000"), "localhost:9000");
        assert_eq!(host_of("cdn.example.com"), "cdn.example.com");
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("http://localhost:9000/", "test.jpg").unwrap(),
            "http://localhost:9000/test.jpg"
        );
        assert_eq!(
            join_url("http://cdn.example.com/media", "a/b.png").unwrap(),
            "http://cdn.example.com/media/a/b.png"
        );
        assert_eq!(
            join_url("cdn.example.com", "x.bin").unwrap(),
            "http://cdn.example.com/x.bin"
        );
    }
}
