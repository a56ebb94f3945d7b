//! Externally reachable address of the gateway.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Routable address used only to rank interfaces; nothing is sent.
const ROUTE_HINT: (Ipv4Addr, u16) = (Ipv4Addr::new(192, 0, 2, 1), 9);

/// Host clients on the local network should use to reach a listener bound
/// to `bind_host`.
///
/// Wildcard binds report a non-loopback interface address, or `localhost`
/// when the host has none.
pub fn advertised_host(bind_host: &str) -> String {
    match bind_host.parse::<IpAddr>() {
        Ok(ip) if ip.is_unspecified() => primary_interface_ip()
            .map_or_else(|| "localhost".to_string(), |ip| format_host(&ip)),
        Ok(ip) if ip.is_loopback() => "localhost".to_string(),
        Ok(ip) => format_host(&ip),
        Err(_) => bind_host.to_string(),
    }
}

/// Address of the host's primary non-loopback interface.
fn primary_interface_ip() -> Option<IpAddr> {
    let interfaces = match local_ip_address::list_afinet_netifas() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            tracing::debug!("Failed to list network interfaces: {e}");
            return None;
        }
    };
    pick_interface_ip(&interfaces, route_source_ip())
}

/// Choose the advertised address among `(name, address)` pairs.
///
/// The default route's source address wins when it belongs to one of the
/// interfaces. Otherwise IPv4 is preferred over IPv6; loopback, unspecified
/// and link-local addresses never qualify.
pub(crate) fn pick_interface_ip(
    interfaces: &[(String, IpAddr)],
    route_source: Option<IpAddr>,
) -> Option<IpAddr> {
    let usable: Vec<IpAddr> = interfaces
        .iter()
        .map(|(_, ip)| *ip)
        .filter(is_reachable_from_lan)
        .collect();

    if let Some(source) = route_source
        && usable.contains(&source)
    {
        return Some(source);
    }

    usable
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| usable.first())
        .copied()
}

fn is_reachable_from_lan(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => !v4.is_loopback() && !v4.is_unspecified() && !v4.is_link_local(),
        IpAddr::V6(v6) => {
            !v6.is_loopback() && !v6.is_unspecified() && !v6.is_unicast_link_local()
        }
    }
}

/// Source address of the default route, if the host has one.
fn route_source_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect(ROUTE_HINT).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

fn format_host(ip: &IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str, ip: &str) -> (String, IpAddr) {
        (name.to_string(), ip.parse().unwrap())
    }

    #[test]
    fn test_loopback_is_localhost() {
        assert_eq!(advertised_host("127.0.0.1"), "localhost");
        assert_eq!(advertised_host("::1"), "localhost");
    }

    #[test]
    fn test_specific_addresses_are_kept() {
        assert_eq!(advertised_host("192.168.1.20"), "192.168.1.20");
        assert_eq!(advertised_host("fe80::1"), "[fe80::1]");
        assert_eq!(advertised_host("my-host.lan"), "my-host.lan");
    }

    #[test]
    fn test_wildcard_never_reports_loopback() {
        let host = advertised_host("0.0.0.0");
        assert!(!host.is_empty());
        assert_ne!(host, "127.0.0.1");
    }

    #[test]
    fn test_lan_interface_without_default_route() {
        let interfaces = vec![
            iface("lo", "127.0.0.1"),
            iface("eth0", "fe80::1c2b:3fff:fe4a:1"),
            iface("eth0", "10.0.0.7"),
        ];
        assert_eq!(
            pick_interface_ip(&interfaces, None),
            Some("10.0.0.7".parse().unwrap())
        );
    }

    #[test]
    fn test_route_source_breaks_ties() {
        let interfaces = vec![
            iface("docker0", "172.17.0.1"),
            iface("wlan0", "192.168.1.40"),
        ];
        assert_eq!(
            pick_interface_ip(&interfaces, Some("192.168.1.40".parse().unwrap())),
            Some("192.168.1.40".parse().unwrap())
        );
        // A route source that is not a listed interface is ignored.
        assert_eq!(
            pick_interface_ip(&interfaces, Some("203.0.113.9".parse().unwrap())),
            Some("172.17.0.1".parse().unwrap())
        );
    }

    #[test]
    fn test_ipv6_only_host() {
        let interfaces = vec![iface("lo", "::1"), iface("eth0", "2001:db8::5")];
        assert_eq!(
            pick_interface_ip(&interfaces, None),
            Some("2001:db8::5".parse().unwrap())
        );
    }

    #[test]
    fn test_loopback_only_host_has_no_address() {
        let interfaces = vec![iface("lo", "127.0.0.1"), iface("lo", "::1")];
        assert_eq!(pick_interface_ip(&interfaces, None), None);
        assert_eq!(
            pick_interface_ip(&interfaces, Some("127.0.0.1".parse().unwrap())),
            None
        );
    }
}
