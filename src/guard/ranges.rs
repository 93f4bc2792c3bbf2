use ipnet::{Ipv4Net, Ipv6Net};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;

/// IPv4 ranges that are not globally routable (IANA special-purpose registry)
const NON_GLOBAL_V4: &[&str] = &[
    "0.0.0.0/8",          // "this network" and unspecified
    "10.0.0.0/8",         // private
    "100.64.0.0/10",      // shared address space (CGNAT)
    "127.0.0.0/8",        // loopback
    "169.254.0.0/16",     // link-local, cloud metadata
    "172.16.0.0/12",      // private
    "192.0.0.0/24",       // IETF protocol assignments
    "192.0.2.0/24",       // TEST-NET-1
    "192.88.99.0/24",     // deprecated 6to4 relay anycast
    "192.168.0.0/16",     // private
    "198.18.0.0/15",      // benchmarking
    "198.51.100.0/24",    // TEST-NET-2
    "203.0.113.0/24",     // TEST-NET-3
    "224.0.0.0/4",        // multicast
    "240.0.0.0/4",        // reserved
    "255.255.255.255/32", // broadcast
];

/// IPv6 ranges that are not globally routable
const NON_GLOBAL_V6: &[&str] = &[
    "::/128",         // unspecified
    "::1/128",        // loopback
    "64:ff9b:1::/48", // local-use NAT64
    "100::/64",       // discard-only
    "2001:db8::/32",  // documentation
    "2002::/16",      // 6to4
    "fc00::/7",       // unique local
    "fe80::/10",      // link-local
    "ff00::/8",       // multicast
];

fn v4_table() -> &'static [Ipv4Net] {
    static TABLE: OnceLock<Vec<Ipv4Net>> = OnceLock::new();
    TABLE.get_or_init(|| NON_GLOBAL_V4.iter().filter_map(|c| c.parse().ok()).collect())
}

fn v6_table() -> &'static [Ipv6Net] {
    static TABLE: OnceLock<Vec<Ipv6Net>> = OnceLock::new();
    TABLE.get_or_init(|| NON_GLOBAL_V6.iter().filter_map(|c| c.parse().ok()).collect())
}

/// Returns true if the address is globally routable
///
/// IPv4-mapped and IPv4-compatible IPv6 addresses are judged by their
/// embedded IPv4 address.
pub fn is_global(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_global_v4(v4),
        IpAddr::V6(v6) => match embedded_v4(v6) {
            Some(v4) => is_global_v4(&v4),
            None => is_global_v6(v6),
        },
    }
}

fn is_global_v4(ip: &Ipv4Addr) -> bool {
    !v4_table().iter().any(|net| net.contains(ip))
}

fn is_global_v6(ip: &Ipv6Addr) -> bool {
    !v6_table().iter().any(|net| net.contains(ip))
}

/// Extracts the IPv4 address carried by `::ffff:a.b.c.d` or `::a.b.c.d`
fn embedded_v4(ip: &Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return Some(v4);
    }
    let segments = ip.segments();
    // `::` and `::1` are handled by the IPv6 table
    if segments[..6].iter().all(|s| *s == 0) && !ip.is_unspecified() && !ip.is_loopback() {
        return ip.to_ipv4();
    }
    None
}
