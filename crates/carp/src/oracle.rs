//! Role and link observation.

use crate::parser;
use crate::types::{CarpRole, LinkStatus, Vhid};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default location of the network configuration utility
pub const DEFAULT_IFCONFIG: &str = "/sbin/ifconfig";

/// Read-only view of CARP roles and interface state
#[async_trait]
pub trait RoleOracle: Send + Sync {
    /// Current role of `vhid`. Never fails: unobservable is `Init`.
    async fn role(&self, vhid: Vhid) -> CarpRole;

    /// Link status of `iface`, or `None` when the interface does not exist.
    async fn link_status(&self, iface: &str) -> Option<LinkStatus>;

    /// VHID carried by a `carpN` pseudo-interface.
    async fn carp_vhid(&self, carp_if: &str) -> Option<Vhid>;
}

/// [`RoleOracle`] backed by the `ifconfig` binary
#[derive(Debug, Clone)]
pub struct IfconfigOracle {
    binary: PathBuf,
}

impl IfconfigOracle {
    /// Create an oracle invoking the `ifconfig` at `binary`
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run ifconfig, returning stdout only on success with non-empty output
    async fn run(&self, args: &[&str]) -> Option<String> {
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                let text = String::from_utf8_lossy(&out.stdout).into_owned();
                if text.trim().is_empty() { None } else { Some(text) }
            }
            Ok(out) => {
                debug!(args = ?args, status = %out.status, "ifconfig exited unsuccessfully");
                None
            }
            Err(e) => {
                warn!(binary = %self.binary.display(), error = %e, "Failed to run ifconfig");
                None
            }
        }
    }
}

impl Default for IfconfigOracle {
    fn default() -> Self {
        Self::new(DEFAULT_IFCONFIG)
    }
}

#[async_trait]
impl RoleOracle for IfconfigOracle {
    async fn role(&self, vhid: Vhid) -> CarpRole {
        match self.run(&["-a"]).await {
            Some(output) => parser::role_for_vhid(&output, vhid),
            None => CarpRole::Init,
        }
    }

    async fn link_status(&self, iface: &str) -> Option<LinkStatus> {
        self.run(&[iface])
            .await
            .map(|output| parser::parse_link_status(&output))
    }

    async fn carp_vhid(&self, carp_if: &str) -> Option<Vhid> {
        let output = self.run(&[carp_if]).await?;
        parser::parse_vhid_field(&output)
    }
}
