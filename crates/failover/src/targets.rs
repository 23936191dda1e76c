//! Resolution of configured mappings into controlled interfaces.

use carp::{Vhid, is_dialup_name};
use common::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One configured mapping: "this virtual IP decides the state of this interface"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRow {
    /// Accepts `true`/`false` as well as `on`/`off` strings
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub enabled: bool,

    /// Key into the virtual IP table
    #[serde(default)]
    pub vipref: String,

    /// Friendly interface name, e.g. `wan`
    #[serde(default)]
    pub iface: String,
}

/// Virtual IP type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VipMode {
    Carp,
    IpAlias,
    ProxyArp,
    #[serde(other)]
    Other,
}

/// Entry of the virtual IP table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualIp {
    pub mode: VipMode,

    #[serde(default)]
    pub vhid: Option<Vhid>,
}

/// Interface controlled by a CARP group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Position of the originating mapping row
    pub index: usize,

    /// Friendly name, e.g. `wan`
    pub friendly: String,

    /// Real interface name, e.g. `pppoe0`
    pub real: String,

    pub vhid: Vhid,
}

impl Target {
    /// Whether the real interface follows the dialer's `pppoe<N>` naming
    pub fn is_dialup(&self) -> bool {
        is_dialup_name(&self.real)
    }
}

/// Where mappings, virtual IPs and interface names come from
#[cfg_attr(test, mockall::automock)]
pub trait ConfigSource: Send + Sync {
    /// Mapping rows in configuration order
    fn mapping_rows(&self) -> Result<Vec<MappingRow>>;

    /// Virtual IP table keyed by reference
    fn virtual_ips(&self) -> Result<HashMap<String, VirtualIp>>;

    /// Real interface behind a friendly name
    fn resolve_real_interface(&self, friendly: &str) -> Option<String>;
}

/// Builds [`Target`] lists from a [`ConfigSource`]
#[derive(Clone)]
pub struct TargetResolver {
    source: Arc<dyn ConfigSource>,
}

impl TargetResolver {
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self { source }
    }

    /// Targets for every usable mapping row, optionally only those of `only_vhid`.
    ///
    /// Rows that cannot be resolved are skipped; a broken row never aborts
    /// the pass. Configuration order is preserved and nothing is deduplicated.
    pub fn build_targets(&self, only_vhid: Option<Vhid>) -> Vec<Target> {
        let rows = match self.source.mapping_rows() {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Failed to load mapping rows");
                return Vec::new();
            }
        };
        let vips = match self.source.virtual_ips() {
            Ok(vips) => vips,
            Err(e) => {
                warn!(error = %e, "Failed to load virtual IP table");
                return Vec::new();
            }
        };

        let mut targets = Vec::new();
        for (index, row) in rows.into_iter().enumerate() {
            if !row.enabled || row.vipref.is_empty() || row.iface.is_empty() {
                continue;
            }

            let vhid = match vips.get(&row.vipref) {
                Some(VirtualIp {
                    mode: VipMode::Carp,
                    vhid: Some(vhid),
                }) => *vhid,
                _ => {
                    debug!(index, vipref = %row.vipref, "Mapping does not reference a CARP VIP; skipping");
                    continue;
                }
            };

            if only_vhid.is_some_and(|only| only != vhid) {
                continue;
            }

            let Some(real) = self.source.resolve_real_interface(&row.iface) else {
                info!(
                    index,
                    iface = %row.iface,
                    vipref = %row.vipref,
                    "Real interface not found; skipping"
                );
                continue;
            };

            targets.push(Target {
                index,
                friendly: row.iface,
                real,
                vhid,
            });
        }

        targets
    }
}

/// Keep the first target of each VHID, preserving order
pub fn dedup_by_vhid(targets: Vec<Target>) -> Vec<Target> {
    let mut seen = HashSet::new();
    targets
        .into_iter()
        .filter(|target| seen.insert(target.vhid))
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => Ok(true),
            "off" | "no" | "false" | "0" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "invalid enabled flag: {other}"
            ))),
        },
    }
}
