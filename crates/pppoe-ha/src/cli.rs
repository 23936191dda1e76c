//! Command-line surface.
//!
//! devd and the pfSense GUI hand over raw tokens (sometimes still carrying
//! a `$` from an unexpanded variable), so verbs are matched
//! case-insensitively and arguments are sanitized before clap sees them.
//! clap only splits the arguments; values are validated here so that every
//! malformed invocation exits with the same usage message.

use carp::{CarpRole, RoleOracle, Vhid, parse_vhid};
use clap::{Parser, Subcommand};
use failover::StabilizeRequest;
use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Usage printed for malformed invocations
pub const USAGE: &str = "\
usage: pppoe-ha role-event <vhid|vhid@iface|carpN> <MASTER|BACKUP>
       pppoe-ha reconcile [vhid]
       pppoe-ha reconcile-quiet [vhid]";

#[derive(Debug, Parser)]
#[command(name = "pppoe-ha", version, about = "CARP-driven PPPoE failover")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Apply a CARP role change reported by devd
    #[command(name = "role-event", alias = "carp")]
    RoleEvent { group: String, state: String },

    /// Converge interfaces with their CARP role
    Reconcile { vhid: Option<String> },

    /// Like reconcile, logging only at debug level
    #[command(name = "reconcile-quiet", alias = "reconcile_quiet")]
    ReconcileQuiet { vhid: Option<String> },

    /// Post-promotion stabilization loop (started by role-event)
    #[command(alias = "master_post", hide = true)]
    Stabilize {
        vhid: String,
        friendly: String,
        real: String,
    },
}

/// A CARP group as named by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupToken {
    /// `5`
    Vhid(Vhid),

    /// `5@igb0`; the interface part is informational
    Qualified { vhid: Vhid, iface: String },

    /// `carp1`; the VHID has to be looked up
    CarpInterface(String),
}

impl GroupToken {
    /// Resolve to a VHID, asking `oracle` for `carpN` tokens
    pub async fn resolve(&self, oracle: &dyn RoleOracle) -> Option<Vhid> {
        match self {
            GroupToken::Vhid(vhid) | GroupToken::Qualified { vhid, .. } => Some(*vhid),
            GroupToken::CarpInterface(name) => oracle.carp_vhid(name).await,
        }
    }
}

impl FromStr for GroupToken {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || UsageError::InvalidGroup(s.to_string());

        if let Some((vhid, iface)) = s.split_once('@') {
            let vhid = parse_vhid(vhid).ok_or_else(invalid)?;
            if iface.is_empty() {
                return Err(invalid());
            }
            return Ok(GroupToken::Qualified {
                vhid,
                iface: iface.to_string(),
            });
        }

        if let Some(unit) = s.strip_prefix("carp") {
            if !unit.is_empty() && unit.bytes().all(|b| b.is_ascii_digit()) {
                return Ok(GroupToken::CarpInterface(s.to_string()));
            }
            return Err(invalid());
        }

        parse_vhid(s).map(GroupToken::Vhid).ok_or_else(invalid)
    }
}

impl fmt::Display for GroupToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupToken::Vhid(vhid) => write!(f, "{vhid}"),
            GroupToken::Qualified { vhid, iface } => write!(f, "{vhid}@{iface}"),
            GroupToken::CarpInterface(name) => f.write_str(name),
        }
    }
}

/// A validated invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    RoleEvent { group: GroupToken, role: CarpRole },
    Reconcile { vhid: Option<Vhid>, quiet: bool },
    Stabilize(StabilizeRequest),
}

/// Malformed invocation; always exit code 1
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("{0}")]
    Arguments(String),

    #[error("invalid group token: {0}")]
    InvalidGroup(String),

    #[error("invalid state: {0} (expected MASTER or BACKUP)")]
    InvalidState(String),

    #[error("invalid vhid: {0}")]
    InvalidVhid(String),

    #[error("invalid interface name: {0:?}")]
    InvalidInterface(String),
}

/// Outcome of argument parsing that is not an invocation
#[derive(Debug, Error)]
pub enum ParseFailure {
    /// `--help` or `--version`: print and exit successfully
    #[error("{0}")]
    Info(clap::Error),

    #[error(transparent)]
    Usage(#[from] UsageError),
}

/// Parse process arguments (including the program name)
pub fn parse_args<I, T>(args: I) -> Result<Invocation, ParseFailure>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let cli = Cli::try_parse_from(normalize(args)).map_err(|e| {
        if e.use_stderr() {
            ParseFailure::Usage(UsageError::Arguments(e.kind().to_string()))
        } else {
            ParseFailure::Info(e)
        }
    })?;

    Ok(Invocation::try_from(cli.command)?)
}

/// Strip `$` and whitespace from every argument and lowercase the verb
fn normalize<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            let arg: OsString = arg.into();
            match arg.into_string() {
                Ok(s) if i == 0 => OsString::from(s),
                Ok(s) => {
                    let clean = sanitize(&s);
                    if i == 1 {
                        OsString::from(clean.to_ascii_lowercase())
                    } else {
                        OsString::from(clean)
                    }
                }
                Err(raw) => raw,
            }
        })
        .collect()
}

fn sanitize(arg: &str) -> String {
    arg.trim().trim_start_matches('$').trim().to_string()
}

fn vhid_arg(s: &str) -> Result<Vhid, UsageError> {
    parse_vhid(s).ok_or_else(|| UsageError::InvalidVhid(s.to_string()))
}

fn iface_arg(s: String) -> Result<String, UsageError> {
    let valid = !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'));
    if valid { Ok(s) } else { Err(UsageError::InvalidInterface(s)) }
}

impl TryFrom<Command> for Invocation {
    type Error = UsageError;

    fn try_from(command: Command) -> Result<Self, Self::Error> {
        match command {
            Command::RoleEvent { group, state } => {
                let group = group.parse()?;
                let role = match state.parse::<CarpRole>() {
                    Ok(role @ (CarpRole::Master | CarpRole::Backup)) => role,
                    _ => return Err(UsageError::InvalidState(state)),
                };
                Ok(Invocation::RoleEvent { group, role })
            }
            Command::Reconcile { vhid } => Ok(Invocation::Reconcile {
                vhid: vhid.as_deref().map(vhid_arg).transpose()?,
                quiet: false,
            }),
            Command::ReconcileQuiet { vhid } => Ok(Invocation::Reconcile {
                vhid: vhid.as_deref().map(vhid_arg).transpose()?,
                quiet: true,
            }),
            Command::Stabilize {
                vhid,
                friendly,
                real,
            } => Ok(Invocation::Stabilize(StabilizeRequest {
                vhid: vhid_arg(&vhid)?,
                friendly: iface_arg(friendly)?,
                real: iface_arg(real)?,
            })),
        }
    }
}
