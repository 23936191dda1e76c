//! Wiring of the failover engine and dispatch of a single invocation.

use crate::cli::{GroupToken, Invocation};
use crate::config::Config;
use crate::system::{SelfLauncher, SystemActuator};
use carp::{IfconfigOracle, RoleOracle, Vhid};
use failover::{
    Clock, ConfigSource, Dispatcher, EventOutcome, InterfaceActuator, Reconciler,
    StabilizeOutcome, Stabilizer, StabilizerLauncher, StabilizerSettings, SuppressionStore,
    SystemClock, TargetResolver,
};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Failure of an invocation that was well-formed but cannot be handled
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("cannot resolve group token {0} to a VHID")]
    UnresolvedGroup(String),
}

/// Host capabilities the engine runs against
#[derive(Clone)]
pub struct Collaborators {
    pub config: Arc<dyn ConfigSource>,
    pub oracle: Arc<dyn RoleOracle>,
    pub actuator: Arc<dyn InterfaceActuator>,
    pub launcher: Arc<dyn StabilizerLauncher>,
    pub clock: Arc<dyn Clock>,
}

/// Settings that do not come from the mapping tables
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub suppression_dir: PathBuf,
    pub stabilizer: StabilizerSettings,
}

impl From<&Config> for AppSettings {
    fn from(config: &Config) -> Self {
        Self {
            suppression_dir: config.suppression.dir.clone(),
            stabilizer: config.stabilizer_settings(),
        }
    }
}

/// What an invocation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Event(EventOutcome),
    Reconciled(usize),
    Stabilized(StabilizeOutcome),
}

pub struct App {
    oracle: Arc<dyn RoleOracle>,
    reconciler: Arc<Reconciler>,
    dispatcher: Dispatcher,
    stabilizer: Stabilizer,
}

impl App {
    pub fn new(parts: Collaborators, settings: AppSettings) -> Self {
        let store = Arc::new(SuppressionStore::new(
            settings.suppression_dir,
            parts.clock.clone(),
        ));
        let reconciler = Arc::new(Reconciler::new(
            TargetResolver::new(parts.config),
            parts.oracle.clone(),
            parts.actuator,
        ));
        let dispatcher = Dispatcher::new(
            reconciler.clone(),
            store.clone(),
            parts.launcher,
            settings.stabilizer.window,
        );
        let stabilizer = Stabilizer::new(
            reconciler.clone(),
            store,
            parts.clock,
            settings.stabilizer,
        );

        Self {
            oracle: parts.oracle,
            reconciler,
            dispatcher,
            stabilizer,
        }
    }

    /// Production wiring: ifconfig, pfSctl, the system clock and this binary
    /// as the stabilizer.
    ///
    /// `config_source` is where mappings are read from on every pass;
    /// `config` supplies everything else.
    pub fn system(config: &Config, config_source: Arc<dyn ConfigSource>) -> common::Result<Self> {
        let parts = Collaborators {
            config: config_source,
            oracle: Arc::new(IfconfigOracle::new(&config.commands.ifconfig)),
            actuator: Arc::new(SystemActuator::new(
                &config.commands.ifconfig,
                &config.commands.pfsctl,
            )),
            launcher: Arc::new(
                SelfLauncher::current()?.with_stderr_log(config.logging.file.clone()),
            ),
            clock: Arc::new(SystemClock),
        };
        Ok(Self::new(parts, AppSettings::from(config)))
    }

    /// Handle one invocation
    pub async fn execute(&self, invocation: Invocation) -> Result<Report, AppError> {
        match invocation {
            Invocation::RoleEvent { group, role } => {
                let vhid = self.resolve(&group).await?;
                info!(vhid, group = %group, role = %role, "CARP event");
                let outcome = self.dispatcher.on_role_change(vhid, role).await;
                Ok(Report::Event(outcome))
            }
            Invocation::Reconcile { vhid, quiet } => {
                let actions = match vhid {
                    Some(vhid) => self.reconciler.reconcile(vhid, quiet).await,
                    None => self.reconciler.reconcile_all(quiet).await,
                };
                debug!(vhid, actions = actions.len(), "Reconcile finished");
                Ok(Report::Reconciled(actions.len()))
            }
            Invocation::Stabilize(request) => {
                let outcome = self.stabilizer.run(&request).await;
                Ok(Report::Stabilized(outcome))
            }
        }
    }

    async fn resolve(&self, group: &GroupToken) -> Result<Vhid, AppError> {
        group
            .resolve(self.oracle.as_ref())
            .await
            .ok_or_else(|| AppError::UnresolvedGroup(group.to_string()))
    }
}
