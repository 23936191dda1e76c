//! `ifconfig` output parsing.
//!
//! Everything that knows what FreeBSD's `ifconfig` prints lives here. The
//! rest of the workspace only ever sees [`CarpRole`], [`LinkStatus`] and
//! [`Vhid`] values.
//!
//! Typical input:
//!
//! ```text
//! pppoe0: flags=88d1<UP,POINTOPOINT,RUNNING,NOARP,SIMPLEX,MULTICAST> metric 0 mtu 1492
//!         inet 100.64.12.7 --> 100.64.0.1 netmask 0xffffffff
//!         inet6 fe80::2a0:98ff:fe3a:1%pppoe0 prefixlen 64 scopeid 0x9
//! igb1: flags=8943<UP,BROADCAST,RUNNING,PROMISC,SIMPLEX,MULTICAST> metric 0 mtu 1500
//!         inet 192.0.2.10 netmask 0xffffff00 broadcast 192.0.2.255 vhid 5
//!         carp: MASTER vhid 5 advbase 1 advskew 0
//! ```

use crate::types::{CarpRole, LinkStatus, Vhid};
use regex::Regex;
use std::sync::LazyLock;

static CARP_RECORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcarp:\s*(MASTER|BACKUP|INIT)\b.*\bvhid\s+(\d+)").expect("valid regex")
});

static FLAGS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9_.]+):\s+flags=[0-9A-Fa-f]+<([^>]*)>").expect("valid regex")
});

static INET_P2P: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*inet\s+\S+\s+-->\s+\S+").expect("valid regex"));

static INET6: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*inet6\s+([0-9a-f:]+)").expect("valid regex"));

static VHID_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bvhid\s+(\d+)").expect("valid regex"));

/// Every `carp: <ROLE> vhid <N>` record in the output, in order.
///
/// Records whose VHID does not fit a [`Vhid`] are ignored.
pub fn parse_carp_roles(output: &str) -> Vec<(Vhid, CarpRole)> {
    output
        .lines()
        .filter_map(|line| {
            let caps = CARP_RECORD.captures(line)?;
            let role = caps[1].parse().ok()?;
            let vhid = caps[2].parse().ok()?;
            Some((vhid, role))
        })
        .collect()
}

/// Role of `vhid` according to `ifconfig -a` output; `Init` when absent.
pub fn role_for_vhid(output: &str, vhid: Vhid) -> CarpRole {
    parse_carp_roles(output)
        .into_iter()
        .find(|(v, _)| *v == vhid)
        .map(|(_, role)| role)
        .unwrap_or(CarpRole::Init)
}

/// Link flags and address presence from `ifconfig <iface>` output.
pub fn parse_link_status(output: &str) -> LinkStatus {
    let mut status = LinkStatus::default();

    for line in output.lines() {
        if let Some(caps) = FLAGS_LINE.captures(line) {
            let flags: Vec<String> = caps[2]
                .split(',')
                .map(|f| f.trim().to_ascii_uppercase())
                .collect();
            status.up = flags.iter().any(|f| f == "UP");
            status.running = flags.iter().any(|f| f == "RUNNING");
            status.lower_up = flags.iter().any(|f| f == "LOWER_UP");
            continue;
        }

        if INET_P2P.is_match(line) {
            status.has_ipv4_p2p = true;
            continue;
        }

        if let Some(caps) = INET6.captures(line) {
            let addr = caps[1].to_ascii_lowercase();
            if !addr.starts_with("fe80:") && !line.to_ascii_lowercase().contains("tentative") {
                status.has_ipv6_global = true;
            }
        }
    }

    status
}

/// First `vhid N` field in `ifconfig carpN` output.
pub fn parse_vhid_field(output: &str) -> Option<Vhid> {
    output
        .lines()
        .find_map(|line| VHID_FIELD.captures(line))
        .and_then(|caps| caps[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const IFCONFIG_A: &str = "\
igb0: flags=8843<UP,BROADCAST,RUNNING,SIMPLEX,MULTICAST> metric 0 mtu 1500
\tinet 10.0.0.2 netmask 0xffffff00 broadcast 10.0.0.255
igb1: flags=8943<UP,BROADCAST,RUNNING,PROMISC,SIMPLEX,MULTICAST> metric 0 mtu 1500
\tinet 192.0.2.10 netmask 0xffffff00 broadcast 192.0.2.255 vhid 5
\tcarp: MASTER vhid 5 advbase 1 advskew 0
\tinet 198.51.100.10 netmask 0xffffff00 broadcast 198.51.100.255 vhid 7
\tcarp: backup vhid 7 advbase 1 advskew 100
";

    #[test]
    fn test_roles_by_vhid() {
        assert_eq!(
            parse_carp_roles(IFCONFIG_A),
            vec![(5, CarpRole::Master), (7, CarpRole::Backup)]
        );
        assert_eq!(role_for_vhid(IFCONFIG_A, 5), CarpRole::Master);
        assert_eq!(role_for_vhid(IFCONFIG_A, 7), CarpRole::Backup);
    }

    #[test]
    fn test_missing_vhid_is_init() {
        assert_eq!(role_for_vhid(IFCONFIG_A, 9), CarpRole::Init);
        assert_eq!(role_for_vhid("", 5), CarpRole::Init);
    }

    #[test]
    fn test_vhid_overflow_is_ignored() {
        let out = "\tcarp: MASTER vhid 300 advbase 1 advskew 0\n";
        assert!(parse_carp_roles(out).is_empty());
    }

    #[test]
    fn test_established_session() {
        let out = "\
pppoe0: flags=88d1<UP,POINTOPOINT,RUNNING,NOARP,SIMPLEX,MULTICAST> metric 0 mtu 1492
\tinet 100.64.12.7 --> 100.64.0.1 netmask 0xffffffff
\tinet6 fe80::2a0:98ff:fe3a:1%pppoe0 prefixlen 64 scopeid 0x9
";
        let status = parse_link_status(out);
        assert!(status.up);
        assert!(status.running);
        assert!(status.has_ipv4_p2p);
        assert!(!status.has_ipv6_global);
        assert!(status.is_active());
    }

    #[test]
    fn test_link_up_without_address() {
        let out = "\
pppoe0: flags=88d1<UP,POINTOPOINT,RUNNING,NOARP,SIMPLEX,MULTICAST> metric 0 mtu 1492
\tinet6 fe80::2a0:98ff:fe3a:1%pppoe0 prefixlen 64 scopeid 0x9
";
        let status = parse_link_status(out);
        assert!(status.link_up());
        assert!(!status.is_active());
    }

    #[test]
    fn test_ipv6_global_and_tentative() {
        let tentative = "\
pppoe1: flags=1008851<UP,POINTOPOINT,RUNNING,SIMPLEX,MULTICAST,LOWER_UP> metric 0 mtu 1492
\tinet6 2001:db8:1::7 prefixlen 64 tentative
";
        let status = parse_link_status(tentative);
        assert!(status.lower_up);
        assert!(!status.has_ipv6_global);

        let settled = tentative.replace(" tentative", "");
        assert!(parse_link_status(&settled).is_active());
    }

    #[test]
    fn test_down_interface() {
        let out = "pppoe0: flags=8890<POINTOPOINT,NOARP,SIMPLEX,MULTICAST> metric 0 mtu 1492\n";
        let status = parse_link_status(out);
        assert!(!status.up);
        assert!(!status.link_up());
        assert_eq!(parse_link_status(""), LinkStatus::default());
    }

    #[test]
    fn test_vhid_field() {
        let out = "\
carp1: flags=49<UP,LOOPBACK,RUNNING> metric 0 mtu 1500
\tinet 192.0.2.1 netmask 0xffffff00 vhid 12
";
        assert_eq!(parse_vhid_field(out), Some(12));
        assert_eq!(parse_vhid_field("carp1: flags=0<> metric 0\n"), None);
    }
}
