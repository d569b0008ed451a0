// Network module - Host address discovery for access URLs
use std::net::{IpAddr, Ipv4Addr};
use tracing::{debug, warn};

/// First non-loopback IPv4 address in interface order
pub fn first_non_loopback_ipv4<I>(addrs: I) -> Option<Ipv4Addr>
where
    I: IntoIterator<Item = IpAddr>,
{
    addrs.into_iter().find_map(|addr| match addr {
        IpAddr::V4(v4) if !v4.is_loopback() && !v4.is_unspecified() => Some(v4),
        _ => None,
    })
}

/// Primary non-loopback IPv4 address of this machine, taken from the
/// interface list
pub fn primary_ipv4() -> Option<Ipv4Addr> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            warn!("Failed to enumerate network interfaces: {}", e);
            return None;
        }
    };

    let found = first_non_loopback_ipv4(interfaces.iter().map(|iface| iface.ip()));
    match found {
        Some(addr) => debug!("Using interface address {} for access URLs", addr),
        None => debug!("No non-loopback IPv4 interface found"),
    }
    found
}

/// Host name used when building access URLs
pub fn access_host(configured: Option<&str>) -> String {
    if let Some(host) = configured.map(str::trim).filter(|h| !h.is_empty()) {
        return host.to_string();
    }
    primary_ipv4()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn test_configured_host_wins() {
        assert_eq!(access_host(Some("sessions.example.test")), "sessions.example.test");
    }

    #[test]
    fn test_blank_configured_host_falls_through() {
        let host = access_host(Some("  "));
        assert!(!host.is_empty());
        assert_ne!(host, "127.0.0.1");
    }

    #[test]
    fn test_first_non_loopback_ipv4_skips_loopback_and_v6() {
        let addrs = vec![
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(Ipv6Addr::LOCALHOST),
            IpAddr::V6("fe80::1".parse().unwrap()),
            IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)),
            IpAddr::V4(Ipv4Addr::new(192, 168, 0, 7)),
        ];

        assert_eq!(first_non_loopback_ipv4(addrs), Some(Ipv4Addr::new(10, 1, 2, 3)));
    }

    #[test]
    fn test_only_loopback_gives_none() {
        let addrs = vec![IpAddr::V4(Ipv4Addr::LOCALHOST), IpAddr::V4(Ipv4Addr::UNSPECIFIED)];
        assert_eq!(first_non_loopback_ipv4(addrs), None);
    }

    #[test]
    fn test_detected_address_matches_interface_list() {
        let interfaces = if_addrs::get_if_addrs().unwrap();
        let expected = first_non_loopback_ipv4(interfaces.iter().map(|iface| iface.ip()));

        assert_eq!(primary_ipv4(), expected);
        let host = access_host(None);
        match expected {
            Some(addr) => assert_eq!(host, addr.to_string()),
            None => assert_eq!(host, "localhost"),
        }
    }
}
