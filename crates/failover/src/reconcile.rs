//! Convergence of interfaces towards the state their CARP role demands.

use crate::actuator::{Action, InterfaceActuator};
use crate::targets::{Target, TargetResolver, dedup_by_vhid};
use carp::{CarpRole, RoleOracle, Vhid, serves_master};
use std::sync::Arc;
use tracing::warn;

/// Log at info, or at debug for quiet passes
macro_rules! report {
    ($quiet:expr, $($arg:tt)+) => {
        if $quiet {
            tracing::debug!($($arg)+)
        } else {
            tracing::info!($($arg)+)
        }
    };
}

/// Compares observed interface state with the role and issues the minimal fix
pub struct Reconciler {
    resolver: TargetResolver,
    oracle: Arc<dyn RoleOracle>,
    actuator: Arc<dyn InterfaceActuator>,
}

impl Reconciler {
    pub fn new(
        resolver: TargetResolver,
        oracle: Arc<dyn RoleOracle>,
        actuator: Arc<dyn InterfaceActuator>,
    ) -> Self {
        Self {
            resolver,
            oracle,
            actuator,
        }
    }

    pub fn resolver(&self) -> &TargetResolver {
        &self.resolver
    }

    pub fn oracle(&self) -> &Arc<dyn RoleOracle> {
        &self.oracle
    }

    /// Converge every interface mapped to `vhid`.
    ///
    /// A VHID without mappings is inert, not an error. The role is read once
    /// and applied to every target of the group. Returns the actions issued.
    pub async fn reconcile(&self, vhid: Vhid, quiet: bool) -> Vec<Action> {
        let targets = self.resolver.build_targets(Some(vhid));
        if targets.is_empty() {
            report!(quiet, vhid, "reconcile: no mappings for VHID");
            return Vec::new();
        }

        let role = self.oracle.role(vhid).await;

        let mut actions = Vec::new();
        for target in &targets {
            warn_if_not_dialup(target);
            if let Some(action) = self.reconcile_target(target, role, quiet).await {
                actions.push(action);
            }
        }
        actions
    }

    /// Reconcile each configured VHID once, in configuration order
    pub async fn reconcile_all(&self, quiet: bool) -> Vec<Action> {
        let groups = dedup_by_vhid(self.resolver.build_targets(None));
        if groups.is_empty() {
            report!(quiet, "reconcile: no mappings configured");
            return Vec::new();
        }

        let mut actions = Vec::new();
        for group in groups {
            actions.extend(self.reconcile(group.vhid, quiet).await);
        }
        actions
    }

    async fn reconcile_target(&self, target: &Target, role: CarpRole, quiet: bool) -> Option<Action> {
        let vhid = target.vhid;
        let real = target.real.as_str();

        match role {
            CarpRole::Master => {
                let status = self.oracle.link_status(real).await;
                if serves_master(real, status) {
                    report!(quiet, vhid, real, "reconcile: MASTER and interface active - ok");
                    return None;
                }
                report!(quiet, vhid, real, present = status.is_some(), "reconcile: MASTER - bringing interface up");
                Some(self.raise(target, status.is_some()).await)
            }
            CarpRole::Backup => {
                let status = self.oracle.link_status(real).await;
                if !status.is_some_and(|s| s.link_up()) {
                    report!(quiet, vhid, real, "reconcile: BACKUP and link already down - ok");
                    return None;
                }
                report!(quiet, vhid, real, "reconcile: BACKUP - bringing interface down");
                Some(self.bring_down(target).await)
            }
            CarpRole::Init => {
                report!(quiet, vhid, "reconcile: state INIT - skip");
                None
            }
        }
    }

    /// Raise `target`: the real interface when it exists, otherwise a full
    /// reload of the friendly interface (a session that never negotiated has
    /// no real interface to raise).
    pub async fn bring_up(&self, target: &Target) -> Action {
        let present = self.oracle.link_status(&target.real).await.is_some();
        self.raise(target, present).await
    }

    /// Lower the real interface of `target`
    pub async fn bring_down(&self, target: &Target) -> Action {
        let action = Action::Down(target.real.clone());
        self.perform(&action).await;
        action
    }

    async fn raise(&self, target: &Target, present: bool) -> Action {
        let action = if present {
            Action::Up(target.real.clone())
        } else {
            Action::Reload(target.friendly.clone())
        };
        self.perform(&action).await;
        action
    }

    /// Failures are logged only; the next pass retries naturally
    async fn perform(&self, action: &Action) {
        let result = match action {
            Action::Up(real) => self.actuator.up(real).await,
            Action::Reload(friendly) => self.actuator.reload(friendly).await,
            Action::Down(real) => self.actuator.down(real).await,
        };

        if let Err(e) = result {
            warn!(action = %action, error = %e, "Interface action failed");
        }
    }
}

pub(crate) fn warn_if_not_dialup(target: &Target) {
    if !target.is_dialup() {
        warn!(vhid = target.vhid, real = %target.real, "Interface is not pppoeN; continuing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::MockInterfaceActuator;
    use crate::testing::{FakeHost, StaticConfig, established};
    use async_trait::async_trait;
    use carp::LinkStatus;
    use common::Error;
    use mockall::predicate::eq;

    mockall::mock! {
        pub Oracle {}

        #[async_trait]
        impl RoleOracle for Oracle {
            async fn role(&self, vhid: Vhid) -> CarpRole;
            async fn link_status(&self, iface: &str) -> Option<LinkStatus>;
            async fn carp_vhid(&self, carp_if: &str) -> Option<Vhid>;
        }
    }

    fn wan_config() -> StaticConfig {
        StaticConfig::new()
            .carp_vip("vip5", 5)
            .interface("wan", "pppoe0")
            .mapping("vip5", "wan")
    }

    fn reconciler(config: StaticConfig, host: &Arc<FakeHost>) -> Reconciler {
        Reconciler::new(
            TargetResolver::new(Arc::new(config)),
            host.clone(),
            host.clone(),
        )
    }

    #[tokio::test]
    async fn test_master_with_active_link_is_noop() {
        let host = Arc::new(FakeHost::new());
        host.set_role(5, CarpRole::Master);
        host.set_link("pppoe0", established());

        let actions = reconciler(wan_config(), &host).reconcile(5, false).await;
        assert!(actions.is_empty());
        assert!(host.actions().is_empty());
    }

    #[tokio::test]
    async fn test_master_raises_existing_interface() {
        let host = Arc::new(FakeHost::new());
        host.set_role(5, CarpRole::Master);
        host.set_link("pppoe0", LinkStatus::default());

        let actions = reconciler(wan_config(), &host).reconcile(5, false).await;
        assert_eq!(actions, vec![Action::Up("pppoe0".into())]);
        assert_eq!(host.actions(), actions);
    }

    #[tokio::test]
    async fn test_master_reloads_missing_interface() {
        let host = Arc::new(FakeHost::new());
        host.set_role(5, CarpRole::Master);

        let actions = reconciler(wan_config(), &host).reconcile(5, true).await;
        assert_eq!(actions, vec![Action::Reload("wan".into())]);
    }

    #[tokio::test]
    async fn test_backup_lowers_link_up_interface() {
        let host = Arc::new(FakeHost::new());
        host.set_role(5, CarpRole::Backup);
        host.set_link(
            "pppoe0",
            LinkStatus {
                up: true,
                running: true,
                ..Default::default()
            },
        );

        let actions = reconciler(wan_config(), &host).reconcile(5, false).await;
        assert_eq!(actions, vec![Action::Down("pppoe0".into())]);
    }

    #[tokio::test]
    async fn test_backup_with_link_down_is_noop() {
        let host = Arc::new(FakeHost::new());
        host.set_role(5, CarpRole::Backup);
        host.set_link("pppoe0", LinkStatus::default());
        let reconciler = reconciler(wan_config(), &host);

        assert!(reconciler.reconcile(5, false).await.is_empty());

        // Absent interface is down as well
        host.remove_link("pppoe0");
        assert!(reconciler.reconcile(5, false).await.is_empty());
        assert!(host.actions().is_empty());
    }

    #[tokio::test]
    async fn test_init_is_inert() {
        let host = Arc::new(FakeHost::new());
        host.set_link("pppoe0", established());

        let actions = reconciler(wan_config(), &host).reconcile(5, false).await;
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn test_unmapped_vhid_is_inert() {
        let host = Arc::new(FakeHost::new());
        host.set_role(9, CarpRole::Master);

        let actions = reconciler(wan_config(), &host).reconcile(9, false).await;
        assert!(actions.is_empty());
        assert_eq!(host.role_lookups(9), 0);
    }

    #[tokio::test]
    async fn test_non_dialup_interface_is_still_processed() {
        let host = Arc::new(FakeHost::new());
        host.set_role(5, CarpRole::Master);
        host.set_link("igb2", LinkStatus::default());
        let config = StaticConfig::new()
            .carp_vip("vip5", 5)
            .interface("opt2", "igb2")
            .mapping("vip5", "opt2");

        let actions = reconciler(config, &host).reconcile(5, false).await;
        assert_eq!(actions, vec![Action::Up("igb2".into())]);
    }

    #[tokio::test]
    async fn test_non_dialup_master_needs_only_link() {
        let host = Arc::new(FakeHost::new());
        host.set_role(5, CarpRole::Master);
        // Link up, no point-to-point or global address
        host.set_link(
            "igb2",
            LinkStatus {
                up: true,
                running: true,
                ..Default::default()
            },
        );
        let config = StaticConfig::new()
            .carp_vip("vip5", 5)
            .interface("opt2", "igb2")
            .mapping("vip5", "opt2");

        let actions = reconciler(config, &host).reconcile(5, false).await;
        assert!(actions.is_empty());
        assert!(host.actions().is_empty());
    }

    #[tokio::test]
    async fn test_actuator_failure_is_absorbed() {
        let host = Arc::new(FakeHost::new());
        host.set_role(5, CarpRole::Master);
        host.set_link("pppoe0", LinkStatus::default());

        let mut actuator = MockInterfaceActuator::new();
        actuator
            .expect_up()
            .withf(|real| real == "pppoe0")
            .times(1)
            .returning(|_| Err(Error::command("ifconfig pppoe0 up exited with 1")));

        let reconciler = Reconciler::new(
            TargetResolver::new(Arc::new(wan_config())),
            host.clone(),
            Arc::new(actuator),
        );
        let actions = reconciler.reconcile(5, false).await;
        assert_eq!(actions, vec![Action::Up("pppoe0".into())]);
    }

    #[tokio::test]
    async fn test_reconcile_all_reads_each_role_once() {
        let config = StaticConfig::new()
            .carp_vip("a", 7)
            .carp_vip("b", 7)
            .interface("wan", "pppoe0")
            .interface("opt1", "pppoe1")
            .mapping("a", "wan")
            .mapping("b", "opt1");

        let mut oracle = MockOracle::new();
        oracle
            .expect_role()
            .with(eq(7))
            .times(1)
            .returning(|_| CarpRole::Master);
        oracle
            .expect_link_status()
            .returning(|_| Some(LinkStatus {
                up: true,
                running: true,
                has_ipv4_p2p: true,
                ..Default::default()
            }));

        let mut actuator = MockInterfaceActuator::new();
        actuator.expect_up().never();
        actuator.expect_reload().never();
        actuator.expect_down().never();

        let reconciler = Reconciler::new(
            TargetResolver::new(Arc::new(config)),
            Arc::new(oracle),
            Arc::new(actuator),
        );
        assert!(reconciler.reconcile_all(false).await.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_all_covers_every_group() {
        let host = Arc::new(FakeHost::new());
        host.set_role(5, CarpRole::Master);
        host.set_role(7, CarpRole::Backup);
        host.set_link("pppoe1", established());
        let config = StaticConfig::new()
            .carp_vip("vip5", 5)
            .carp_vip("vip7", 7)
            .interface("wan", "pppoe0")
            .interface("opt1", "pppoe1")
            .mapping("vip5", "wan")
            .mapping("vip7", "opt1");

        let actions = reconciler(config, &host).reconcile_all(true).await;
        assert_eq!(
            actions,
            vec![Action::Reload("wan".into()), Action::Down("pppoe1".into())]
        );
        assert_eq!(host.role_lookups(5), 1);
        assert_eq!(host.role_lookups(7), 1);
    }
}
