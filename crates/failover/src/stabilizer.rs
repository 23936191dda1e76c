//! Post-promotion stabilization loop.
//!
//! Runs detached after a MASTER promotion and owns the group's suppression
//! record until every interface mapped to the group is up:
//!
//! ```text
//!             remaining > 0: sleep min(remaining, poll)
//!              ┌──────┐
//!              ▼      │
//!  start ──► Waiting ─┘ ── cleared early by someone else ──► Superseded
//!              │   ▲
//!   window end │   │ re-arm full window
//!              ▼   │
//!          Evaluating ── not MASTER ──► clear + quiet reconcile ──► Demoted
//!              │
//!              ├── MASTER, all links healthy ──► clear ──► Converged
//!              │
//!              └── MASTER, any link unhealthy ──► quiet reconcile ──► Extended
//! ```
//!
//! Evaluation happens only at the end of a window, never on every poll: a
//! session that has not started negotiating shortly after promotion is not
//! a reason to act yet.

use crate::actuator::StabilizeRequest;
use crate::clock::Clock;
use crate::reconcile::Reconciler;
use crate::suppression::{REASON_MASTER_EXTEND, REASON_MASTER_STABILIZE, SuppressionStore};
use carp::{CarpRole, serves_master};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default length of a suppression window
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(120);

/// Default upper bound of a single sleep while waiting
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Timing of the stabilization loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilizerSettings {
    /// Length of every suppression window, initial and extended
    pub window: Duration,

    /// Longest single sleep; bounds how late an external clear is noticed
    pub poll_interval: Duration,
}

impl Default for StabilizerSettings {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// How a stabilization loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilizeOutcome {
    /// Still MASTER with every link of the group healthy; suppression cleared
    Converged,

    /// No longer MASTER at window end; suppression cleared, interface reconciled
    Demoted,

    /// Another actor cleared suppression first; nothing left to do
    Superseded,
}

/// Drives one group to a confirmed MASTER with an established session
pub struct Stabilizer {
    reconciler: Arc<Reconciler>,
    store: Arc<SuppressionStore>,
    clock: Arc<dyn Clock>,
    settings: StabilizerSettings,
}

impl Stabilizer {
    pub fn new(
        reconciler: Arc<Reconciler>,
        store: Arc<SuppressionStore>,
        clock: Arc<dyn Clock>,
        settings: StabilizerSettings,
    ) -> Self {
        Self {
            reconciler,
            store,
            clock,
            settings,
        }
    }

    /// Run until the group converges.
    ///
    /// There is no cap on extensions: an unreachable WAN keeps being retried
    /// once per window for as long as this host stays MASTER.
    pub async fn run(&self, request: &StabilizeRequest) -> StabilizeOutcome {
        let vhid = request.vhid;
        info!(vhid, iface = %request.friendly, real = %request.real, "Stabilization started");

        // The window armed by the dispatcher, or a fresh one when started by hand
        let mut owned_until = match self.store.read(vhid) {
            Some(record) => record.until,
            None => {
                self.store
                    .set(vhid, self.settings.window, REASON_MASTER_STABILIZE)
                    .until
            }
        };

        let mut extensions: u64 = 0;
        loop {
            self.wait_for_window(request).await;

            if self.clock.now() < owned_until {
                info!(vhid, "Suppression cleared by another actor; stopping");
                return StabilizeOutcome::Superseded;
            }

            let role = self.reconciler.oracle().role(vhid).await;
            if role != CarpRole::Master {
                info!(vhid, role = %role, "No longer MASTER at window end - clear suppression");
                self.store.clear(vhid);
                self.reconciler.reconcile(vhid, true).await;
                return StabilizeOutcome::Demoted;
            }

            let Some(real) = self.unhealthy_link(request).await else {
                info!(vhid, extensions, "MASTER and all links OK - clear suppression");
                self.store.clear(vhid);
                return StabilizeOutcome::Converged;
            };

            extensions += 1;
            info!(vhid, real = %real, extensions, "MASTER but link not established - reconcile and extend");
            self.reconciler.reconcile(vhid, true).await;
            owned_until = self
                .store
                .set(vhid, self.settings.window, REASON_MASTER_EXTEND)
                .until;
        }
    }

    /// Sleep in bounded steps until the group's record is gone or expired
    async fn wait_for_window(&self, request: &StabilizeRequest) {
        let floor = Duration::from_secs(1);
        loop {
            let remaining = self.store.remaining_seconds(request.vhid);
            if remaining == 0 {
                return;
            }

            let nap = Duration::from_secs(remaining)
                .min(self.settings.poll_interval)
                .max(floor);
            debug!(vhid = request.vhid, remaining, nap_secs = nap.as_secs(), "Waiting for suppression window");
            self.clock.sleep(nap).await;
        }
    }

    /// First interface of the group that cannot serve as MASTER yet.
    ///
    /// The group is whatever is mapped to the VHID now, plus the interface
    /// named in the request.
    async fn unhealthy_link(&self, request: &StabilizeRequest) -> Option<String> {
        let mut reals: Vec<String> = self
            .reconciler
            .resolver()
            .build_targets(Some(request.vhid))
            .into_iter()
            .map(|target| target.real)
            .collect();
        if !reals.contains(&request.real) {
            reals.push(request.real.clone());
        }

        for real in reals {
            let status = self.reconciler.oracle().link_status(&real).await;
            if !serves_master(&real, status) {
                return Some(real);
            }
        }
        None
    }
}
