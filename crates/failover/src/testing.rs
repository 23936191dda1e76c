//! In-memory stand-ins for the host, the clock and the configuration.
//!
//! Available to this crate's tests and, through the `testing` feature, to
//! downstream crates.

use crate::actuator::{Action, InterfaceActuator, StabilizeRequest, StabilizerLauncher};
use crate::clock::Clock;
use crate::targets::{ConfigSource, MappingRow, VipMode, VirtualIp};
use async_trait::async_trait;
use carp::{CarpRole, LinkStatus, RoleOracle, Vhid};
use common::{Error, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Link status of an established PPPoE session
pub fn established() -> LinkStatus {
    LinkStatus {
        up: true,
        running: true,
        has_ipv4_p2p: true,
        ..Default::default()
    }
}

/// Clock that only moves when told to; `sleep` advances it instantly
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_secs(), Ordering::SeqCst);
    }

    /// Every duration passed to `sleep`, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

#[derive(Debug, Default)]
struct HostState {
    roles: HashMap<Vhid, CarpRole>,
    links: HashMap<String, LinkStatus>,
    dialer: HashMap<String, String>,
    negotiate: bool,
    fail_actions: bool,
    actions: Vec<Action>,
    role_lookups: HashMap<Vhid, usize>,
}

/// A simulated host: CARP roles, interfaces and a PPPoE dialer.
///
/// Actions are recorded and change the simulated links: `down` drops the
/// link, `up` raises it, and with negotiation enabled `up`/`reload` also
/// establish the session. `reload` only creates an interface for friendly
/// names registered with [`FakeHost::dial`].
#[derive(Debug, Default)]
pub struct FakeHost {
    state: Mutex<HostState>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_role(&self, vhid: Vhid, role: CarpRole) {
        self.state.lock().unwrap().roles.insert(vhid, role);
    }

    pub fn set_link(&self, iface: &str, status: LinkStatus) {
        self.state.lock().unwrap().links.insert(iface.to_string(), status);
    }

    pub fn remove_link(&self, iface: &str) {
        self.state.lock().unwrap().links.remove(iface);
    }

    /// Reloading `friendly` brings `real` into existence
    pub fn dial(&self, friendly: &str, real: &str) {
        self.state
            .lock()
            .unwrap()
            .dialer
            .insert(friendly.to_string(), real.to_string());
    }

    /// Whether raising an interface also establishes its session
    pub fn negotiate_on_up(&self, enabled: bool) {
        self.state.lock().unwrap().negotiate = enabled;
    }

    /// Make every actuator call fail (after being recorded)
    pub fn fail_actions(&self, enabled: bool) {
        self.state.lock().unwrap().fail_actions = enabled;
    }

    pub fn actions(&self) -> Vec<Action> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn role_lookups(&self, vhid: Vhid) -> usize {
        self.state
            .lock()
            .unwrap()
            .role_lookups
            .get(&vhid)
            .copied()
            .unwrap_or(0)
    }

    fn record(&self, action: Action) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(action.clone());
        if state.fail_actions {
            return Err(Error::command(format!("{action} failed")));
        }

        let raised = |negotiate: bool| {
            if negotiate {
                established()
            } else {
                LinkStatus {
                    up: true,
                    running: true,
                    ..Default::default()
                }
            }
        };

        match action {
            Action::Up(real) => {
                let status = raised(state.negotiate);
                state.links.insert(real, status);
            }
            Action::Reload(friendly) => {
                if let Some(real) = state.dialer.get(&friendly).cloned() {
                    let status = raised(state.negotiate);
                    state.links.insert(real, status);
                }
            }
            Action::Down(real) => {
                if let Some(link) = state.links.get_mut(&real) {
                    *link = LinkStatus::default();
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RoleOracle for FakeHost {
    async fn role(&self, vhid: Vhid) -> CarpRole {
        let mut state = self.state.lock().unwrap();
        *state.role_lookups.entry(vhid).or_default() += 1;
        state.roles.get(&vhid).copied().unwrap_or(CarpRole::Init)
    }

    async fn link_status(&self, iface: &str) -> Option<LinkStatus> {
        self.state.lock().unwrap().links.get(iface).copied()
    }

    async fn carp_vhid(&self, carp_if: &str) -> Option<Vhid> {
        // carpN carries VHID N
        carp_if.strip_prefix("carp")?.parse().ok()
    }
}

#[async_trait]
impl InterfaceActuator for FakeHost {
    async fn reload(&self, friendly: &str) -> Result<()> {
        self.record(Action::Reload(friendly.to_string()))
    }

    async fn up(&self, real: &str) -> Result<()> {
        self.record(Action::Up(real.to_string()))
    }

    async fn down(&self, real: &str) -> Result<()> {
        self.record(Action::Down(real.to_string()))
    }
}

/// Fixed configuration assembled with a builder
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    rows: Vec<MappingRow>,
    vips: HashMap<String, VirtualIp>,
    interfaces: HashMap<String, String>,
}

impl StaticConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vip(mut self, vipref: &str, vip: VirtualIp) -> Self {
        self.vips.insert(vipref.to_string(), vip);
        self
    }

    pub fn carp_vip(self, vipref: &str, vhid: Vhid) -> Self {
        self.vip(
            vipref,
            VirtualIp {
                mode: VipMode::Carp,
                vhid: Some(vhid),
            },
        )
    }

    pub fn interface(mut self, friendly: &str, real: &str) -> Self {
        self.interfaces.insert(friendly.to_string(), real.to_string());
        self
    }

    pub fn mapping(mut self, vipref: &str, iface: &str) -> Self {
        self.rows.push(MappingRow {
            enabled: true,
            vipref: vipref.to_string(),
            iface: iface.to_string(),
        });
        self
    }

    pub fn disabled_mapping(mut self, vipref: &str, iface: &str) -> Self {
        self.rows.push(MappingRow {
            enabled: false,
            vipref: vipref.to_string(),
            iface: iface.to_string(),
        });
        self
    }
}

impl ConfigSource for StaticConfig {
    fn mapping_rows(&self) -> Result<Vec<MappingRow>> {
        Ok(self.rows.clone())
    }

    fn virtual_ips(&self) -> Result<HashMap<String, VirtualIp>> {
        Ok(self.vips.clone())
    }

    fn resolve_real_interface(&self, friendly: &str) -> Option<String> {
        self.interfaces.get(friendly).cloned()
    }
}

/// Launcher that only records what it was asked to start
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    requests: Mutex<Vec<StabilizeRequest>>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<StabilizeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl StabilizerLauncher for RecordingLauncher {
    fn launch(&self, request: &StabilizeRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }
}
