//! Local IPv4 interfaces and the LAN hosts they can reach.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

/// An IPv4 address bound to a local interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalInterface {
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub loopback: bool,
}

/// Every IPv4 interface address. Enumeration failure yields none.
pub fn local_ipv4_interfaces() -> Vec<LocalInterface> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            tracing::debug!("Interface enumeration failed: {e}");
            return Vec::new();
        }
    };

    interfaces
        .into_iter()
        .filter_map(|iface| match iface.addr {
            if_addrs::IfAddr::V4(v4) => Some(LocalInterface {
                ip: v4.ip,
                netmask: v4.netmask,
                loopback: v4.ip.is_loopback(),
            }),
            _ => None,
        })
        .collect()
}

/// Sorted `http://<ip>:<port>` URLs under which this machine answers.
pub fn local_aliases(interfaces: &[LocalInterface], port: u16) -> Vec<String> {
    let mut names: BTreeSet<String> = ["127.0.0.1", "localhost"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    names.extend(interfaces.iter().map(|iface| iface.ip.to_string()));

    names
        .into_iter()
        .map(|host| format!("http://{host}:{port}"))
        .collect()
}

fn prefix_len(netmask: Ipv4Addr) -> u32 {
    u32::from(netmask).count_ones()
}

/// Usable host addresses in the subnet (network and broadcast excluded
/// below /31).
pub fn host_count(netmask: Ipv4Addr) -> u64 {
    let size = 1u64 << (32 - prefix_len(netmask));
    if size <= 2 {
        size
    } else {
        size - 2
    }
}

/// All usable host addresses of the subnet containing `ip`.
pub fn subnet_hosts(ip: Ipv4Addr, netmask: Ipv4Addr) -> Vec<Ipv4Addr> {
    let mask = u32::from(netmask);
    let network = u32::from(ip) & mask;
    let broadcast = network | !mask;

    let (first, last) = if broadcast - network < 2 {
        (network, broadcast)
    } else {
        (network + 1, broadcast - 1)
    };
    (first..=last).map(Ipv4Addr::from).collect()
}

/// Candidate LAN hosts from every non-loopback interface, minus our own
/// addresses. Subnets larger than `max_hosts` are skipped.
pub fn lan_hosts(interfaces: &[LocalInterface], max_hosts: usize) -> Vec<Ipv4Addr> {
    let own: BTreeSet<Ipv4Addr> = interfaces.iter().map(|iface| iface.ip).collect();
    let mut hosts = BTreeSet::new();

    for iface in interfaces.iter().filter(|iface| !iface.loopback) {
        let count = host_count(iface.netmask);
        if count > max_hosts as u64 {
            tracing::warn!(
                "Skipping subnet of {} ({} hosts exceeds limit {max_hosts})",
                iface.ip,
                count
            );
            continue;
        }
        hosts.extend(
            subnet_hosts(iface.ip, iface.netmask)
                .into_iter()
                .filter(|host| !own.contains(host)),
        );
    }

    hosts.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(ip: [u8; 4], mask: [u8; 4]) -> LocalInterface {
        let ip = Ipv4Addr::from(ip);
        LocalInterface {
            ip,
            netmask: Ipv4Addr::from(mask),
            loopback: ip.is_loopback(),
        }
    }

    #[test]
    fn test_subnet_hosts_slash_30() {
        let hosts = subnet_hosts(Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(255, 255, 255, 252));
        assert_eq!(
            hosts,
            vec![Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 0, 6)]
        );
    }

    #[test]
    fn test_subnet_hosts_slash_31_and_32() {
        let pair = subnet_hosts(Ipv4Addr::new(10, 0, 0, 4), Ipv4Addr::new(255, 255, 255, 254));
        assert_eq!(pair.len(), 2);
        let single = subnet_hosts(Ipv4Addr::new(10, 0, 0, 4), Ipv4Addr::new(255, 255, 255, 255));
        assert_eq!(single, vec![Ipv4Addr::new(10, 0, 0, 4)]);
    }

    #[test]
    fn test_host_count() {
        assert_eq!(host_count(Ipv4Addr::new(255, 255, 255, 0)), 254);
        assert_eq!(host_count(Ipv4Addr::new(255, 255, 0, 0)), 65_534);
        assert_eq!(host_count(Ipv4Addr::new(255, 255, 255, 254)), 2);
        assert_eq!(host_count(Ipv4Addr::new(0, 0, 0, 0)), (1u64 << 32) - 2);
    }

    #[test]
    fn test_lan_hosts_excludes_own_and_loopback() {
        let interfaces = vec![
            iface([127, 0, 0, 1], [255, 0, 0, 0]),
            iface([192, 168, 1, 10], [255, 255, 255, 0]),
        ];
        let hosts = lan_hosts(&interfaces, 65_534);

        assert_eq!(hosts.len(), 253);
        assert!(!hosts.contains(&Ipv4Addr::new(192, 168, 1, 10)));
        assert!(!hosts.contains(&Ipv4Addr::new(192, 168, 1, 0)));
        assert!(!hosts.contains(&Ipv4Addr::new(192, 168, 1, 255)));
        assert!(hosts.iter().all(|h| !h.is_loopback()));
    }

    #[test]
    fn test_lan_hosts_skips_oversized_subnet() {
        let interfaces = vec![iface([10, 1, 2, 3], [255, 0, 0, 0])];
        assert!(lan_hosts(&interfaces, 65_534).is_empty());
    }

    #[test]
    fn test_lan_hosts_without_interfaces_is_empty() {
        assert!(lan_hosts(&[], 65_534).is_empty());
        assert_eq!(
            local_aliases(&[], 11434),
            vec!["http://127.0.0.1:11434", "http://localhost:11434"]
        );
    }

    #[test]
    fn test_local_aliases_sorted() {
        let interfaces = vec![iface([192, 168, 1, 10], [255, 255, 255, 0])];
        assert_eq!(
            local_aliases(&interfaces, 1234),
            vec![
                "http://127.0.0.1:1234",
                "http://192.168.1.10:1234",
                "http://localhost:1234",
            ]
        );
    }
}
