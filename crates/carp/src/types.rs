//! CARP data types and structures.
//!
//! Roles and link state are observed from the host, never computed here:
//! the election itself belongs to the kernel's CARP implementation.

use std::fmt;
use std::str::FromStr;

/// Virtual host ID of a CARP group (1-255)
pub type Vhid = u8;

/// Real interface names produced by the PPPoE dialer look like `pppoe0`
pub const DIALUP_PREFIX: &str = "pppoe";

/// CARP role enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CarpRole {
    /// Initial state, or no role could be observed
    Init,
    /// Backup state - another host owns the virtual IP
    Backup,
    /// Master state - this host owns the virtual IP
    Master,
}

impl fmt::Display for CarpRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CarpRole::Init => write!(f, "INIT"),
            CarpRole::Backup => write!(f, "BACKUP"),
            CarpRole::Master => write!(f, "MASTER"),
        }
    }
}

/// Error returned when a role token is not MASTER, BACKUP or INIT
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown CARP role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for CarpRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MASTER" => Ok(CarpRole::Master),
            "BACKUP" => Ok(CarpRole::Backup),
            "INIT" => Ok(CarpRole::Init),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Parse a VHID, rejecting 0 and anything above 255.
pub fn parse_vhid(s: &str) -> Option<Vhid> {
    match s.trim().parse::<Vhid>() {
        Ok(0) | Err(_) => None,
        Ok(vhid) => Some(vhid),
    }
}

/// Whether `name` follows the dialer's `pppoe<N>` naming.
pub fn is_dialup_name(name: &str) -> bool {
    name.strip_prefix(DIALUP_PREFIX)
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Link and address state of one interface, as reported by `ifconfig`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStatus {
    /// UP flag (administratively up)
    pub up: bool,

    /// RUNNING flag (driver resources allocated)
    pub running: bool,

    /// LOWER_UP flag (carrier present)
    pub lower_up: bool,

    /// An `inet A --> B` point-to-point address is configured
    pub has_ipv4_p2p: bool,

    /// A non-link-local, non-tentative IPv6 address is configured
    pub has_ipv6_global: bool,
}

impl LinkStatus {
    /// Link is administratively and operationally up
    pub fn link_up(&self) -> bool {
        (self.up && self.running) || self.lower_up
    }

    /// The PPPoE session is established: link up and at least one usable address
    pub fn is_active(&self) -> bool {
        self.link_up() && (self.has_ipv4_p2p || self.has_ipv6_global)
    }
}

/// Whether interface `name` in state `status` is fit to carry traffic for a
/// MASTER: an established session for `pppoeN`, a link for anything else.
pub fn serves_master(name: &str, status: Option<LinkStatus>) -> bool {
    status.is_some_and(|s| if is_dialup_name(name) { s.is_active() } else { s.link_up() })
}
