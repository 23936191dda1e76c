//! Interface actions and the stabilizer launch hook.

use async_trait::async_trait;
use carp::Vhid;
use common::Result;
use std::fmt;

/// Drives interfaces up and down.
///
/// Every action must be safe to repeat: raising an interface that is already
/// up, or lowering one that is already down, is a no-op at the link layer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InterfaceActuator: Send + Sync {
    /// Full reconfiguration of a friendly interface, re-dialing PPPoE
    async fn reload(&self, friendly: &str) -> Result<()>;

    /// Raise an existing real interface
    async fn up(&self, real: &str) -> Result<()>;

    /// Lower a real interface
    async fn down(&self, real: &str) -> Result<()>;
}

/// An action issued against an interface
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    /// `up(real)`
    Up(String),
    /// `reload(friendly)`
    Reload(String),
    /// `down(real)`
    Down(String),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Up(iface) => write!(f, "up {iface}"),
            Action::Reload(iface) => write!(f, "reload {iface}"),
            Action::Down(iface) => write!(f, "down {iface}"),
        }
    }
}

/// Arguments of one stabilization loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilizeRequest {
    pub vhid: Vhid,

    /// Friendly name of the controlled interface
    pub friendly: String,

    /// Real name of the controlled interface
    pub real: String,
}

/// Starts a stabilization loop that outlives the caller.
///
/// Fire-and-forget: the caller gets no handle and cannot cancel the loop.
#[cfg_attr(test, mockall::automock)]
pub trait StabilizerLauncher: Send + Sync {
    fn launch(&self, request: &StabilizeRequest) -> Result<()>;
}
