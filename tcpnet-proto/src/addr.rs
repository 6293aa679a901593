//! IPv4 address helpers.
//!
//! Resolution is best effort: when a hostname cannot be resolved the literal
//! string is handed back, and parsing it later reports the address as invalid.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener, ToSocketAddrs};
use tracing::debug;

/// Resolve `host` to a dotted-quad string, falling back to `host` itself.
pub fn resolve_host(host: &str) -> String {
    if host.parse::<Ipv4Addr>().is_ok() {
        return host.to_string();
    }
    match (host, 0).to_socket_addrs() {
        Ok(addrs) => {
            for addr in addrs {
                if let SocketAddr::V4(v4) = addr {
                    return v4.ip().to_string();
                }
            }
            debug!("No IPv4 address for {}, using literal", host);
            host.to_string()
        }
        Err(e) => {
            debug!("Failed to resolve {}: {}, using literal", host, e);
            host.to_string()
        }
    }
}

/// Resolve `host` and combine it with `port`.
///
/// Returns `None` if neither resolution nor the literal yields an IPv4 address.
pub fn socket_addr(host: &str, port: u16) -> Option<SocketAddrV4> {
    resolve_host(host)
        .parse::<Ipv4Addr>()
        .ok()
        .map(|ip| SocketAddrV4::new(ip, port))
}

/// Whether `value` is a dotted-quad IPv4 address.
pub fn is_valid_ipv4(value: &str) -> bool {
    value.parse::<Ipv4Addr>().is_ok()
}

/// Split `host:port`. A missing port yields `default_port`.
pub fn parse_endpoint(value: &str, default_port: u16) -> Option<(String, u16)> {
    match value.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port.parse().ok()?;
            Some((host.to_string(), port))
        }
        Some(_) => None,
        None if value.is_empty() => None,
        None => Some((value.to_string(), default_port)),
    }
}

/// First port in `start..=end` that can be bound on the loopback interface.
pub fn find_available_port(start: u16, end: u16) -> Option<u16> {
    (start..=end).find(|port| TcpListener::bind((Ipv4Addr::LOCALHOST, *port)).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_literal_and_localhost() {
        assert_eq!(resolve_host("10.1.2.3"), "10.1.2.3");
        assert_eq!(resolve_host("localhost"), "127.0.0.1");
        assert_eq!(
            socket_addr("127.0.0.1", 80),
            Some(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 80))
        );
    }

    #[test]
    fn test_unresolvable_falls_back_to_literal() {
        assert_eq!(resolve_host("no such host!"), "no such host!");
        assert_eq!(socket_addr("no such host!", 80), None);
    }

    #[test]
    fn test_parse_endpoint() {
        assert_eq!(
            parse_endpoint("example.com:8080", 1),
            Some(("example.com".to_string(), 8080))
        );
        assert_eq!(parse_endpoint("example.com", 7777), Some(("example.com".to_string(), 7777)));
        assert_eq!(parse_endpoint("host:notaport", 1), None);
        assert_eq!(parse_endpoint(":80", 1), None);
        assert_eq!(parse_endpoint("", 1), None);
    }

    #[test]
    fn test_is_valid_ipv4() {
        assert!(is_valid_ipv4("192.168.0.1"));
        assert!(!is_valid_ipv4("256.0.0.1"));
        assert!(!is_valid_ipv4("localhost"));
    }

    #[test]
    fn test_find_available_port() {
        let held = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = held.local_addr().unwrap().port();
        assert_ne!(find_available_port(port, port.saturating_add(20)), Some(port));
    }
}
