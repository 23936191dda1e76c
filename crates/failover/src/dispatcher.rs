//! Handling of CARP role-change notifications.

use crate::actuator::{Action, StabilizeRequest, StabilizerLauncher};
use crate::reconcile::{Reconciler, warn_if_not_dialup};
use crate::suppression::{REASON_MASTER_STABILIZE, SuppressionStore};
use carp::{CarpRole, Vhid};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What happened to a role-change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// A stabilization loop owns the group; the event was dropped
    Suppressed { remaining: u64 },

    /// No interface is mapped to the group
    NoTargets,

    /// The role was applied to every mapped interface
    Applied {
        actions: Vec<Action>,
        /// A stabilization loop was launched
        stabilizing: bool,
    },
}

/// Entry point for role changes reported by CARP
pub struct Dispatcher {
    reconciler: Arc<Reconciler>,
    store: Arc<SuppressionStore>,
    launcher: Arc<dyn StabilizerLauncher>,
    window: Duration,
}

impl Dispatcher {
    /// Create a dispatcher arming suppression windows of `window`
    pub fn new(
        reconciler: Arc<Reconciler>,
        store: Arc<SuppressionStore>,
        launcher: Arc<dyn StabilizerLauncher>,
        window: Duration,
    ) -> Self {
        Self {
            reconciler,
            store,
            launcher,
            window,
        }
    }

    /// Apply a role change to every interface mapped to `vhid`.
    ///
    /// Unlike reconciliation the role is applied unconditionally: the event
    /// says CARP's state changed, so interfaces are driven, not checked.
    /// Promotion to MASTER arms suppression and launches one stabilization
    /// loop; demotion to BACKUP is final and arms nothing.
    pub async fn on_role_change(&self, vhid: Vhid, role: CarpRole) -> EventOutcome {
        if let Some(record) = self.store.read(vhid) {
            let remaining = self.store.remaining_seconds(vhid);
            info!(vhid, role = %role, reason = %record.reason, remaining, "CARP event suppressed");
            return EventOutcome::Suppressed { remaining };
        }

        let targets = self.reconciler.resolver().build_targets(Some(vhid));
        let Some(first) = targets.first().cloned() else {
            info!(vhid, role = %role, "No mappings for VHID; ignoring event");
            return EventOutcome::NoTargets;
        };

        let mut actions = Vec::new();
        for target in &targets {
            warn_if_not_dialup(target);
            match role {
                CarpRole::Master => {
                    info!(vhid, iface = %target.friendly, real = %target.real, "MASTER - bringing interface up");
                    actions.push(self.reconciler.bring_up(target).await);
                }
                CarpRole::Backup => {
                    info!(vhid, iface = %target.friendly, real = %target.real, "BACKUP - bringing interface down");
                    actions.push(self.reconciler.bring_down(target).await);
                }
                CarpRole::Init => {
                    debug!(vhid, "INIT event ignored");
                }
            }
        }

        let stabilizing =
            role == CarpRole::Master && self.start_stabilizer(first.vhid, &first.friendly, &first.real);

        EventOutcome::Applied {
            actions,
            stabilizing,
        }
    }

    fn start_stabilizer(&self, vhid: Vhid, friendly: &str, real: &str) -> bool {
        self.store.set(vhid, self.window, REASON_MASTER_STABILIZE);

        let request = StabilizeRequest {
            vhid,
            friendly: friendly.to_string(),
            real: real.to_string(),
        };
        match self.launcher.launch(&request) {
            Ok(()) => {
                info!(vhid, iface = friendly, real, "Stabilization loop launched");
                true
            }
            Err(e) => {
                // The window still expires on its own
                warn!(vhid, error = %e, "Failed to launch stabilization loop");
                false
            }
        }
    }
}
