//! CARP-driven failover of dial-up WAN interfaces.
//!
//! Keeps a PPPoE interface in the state its CARP group demands: up on the
//! MASTER, down on the BACKUP. The hard part is doing that safely when roles
//! flap, events are missed and the session takes a while to negotiate.
//!
//! # Components
//!
//! - **SuppressionStore**: per-VHID on-disk record saying "a stabilization
//!   loop owns this group until T"
//! - **Reconciler**: compares observed link state with the role and issues
//!   the minimal corrective action
//! - **Dispatcher**: applies role-change events unless suppressed, arms
//!   suppression and launches a stabilizer on promotion
//! - **Stabilizer**: waits out the window, then converges, or extends it
//!
//! Host access goes through capability traits ([`carp::RoleOracle`],
//! [`InterfaceActuator`], [`ConfigSource`], [`StabilizerLauncher`],
//! [`Clock`]), so the state machine never sees `ifconfig` text.
//!
//! # Example
//!
//! ```no_run
//! use carp::{CarpRole, IfconfigOracle};
//! use failover::{
//!     Dispatcher, InterfaceActuator, Reconciler, StabilizerLauncher, SuppressionStore,
//!     SystemClock, TargetResolver, ConfigSource,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example(
//! #     config: Arc<dyn ConfigSource>,
//! #     actuator: Arc<dyn InterfaceActuator>,
//! #     launcher: Arc<dyn StabilizerLauncher>,
//! # ) {
//! let reconciler = Arc::new(Reconciler::new(
//!     TargetResolver::new(config),
//!     Arc::new(IfconfigOracle::default()),
//!     actuator,
//! ));
//! let store = Arc::new(SuppressionStore::new("/var/run/pppoe-ha", Arc::new(SystemClock)));
//! let dispatcher = Dispatcher::new(reconciler, store, launcher, Duration::from_secs(120));
//!
//! dispatcher.on_role_change(5, CarpRole::Master).await;
//! # }
//! ```

pub mod actuator;
pub mod clock;
pub mod dispatcher;
pub mod reconcile;
pub mod stabilizer;
pub mod suppression;
pub mod targets;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use actuator::{Action, InterfaceActuator, StabilizeRequest, StabilizerLauncher};
pub use clock::{Clock, SystemClock};
pub use dispatcher::{Dispatcher, EventOutcome};
pub use reconcile::Reconciler;
pub use stabilizer::{StabilizeOutcome, Stabilizer, StabilizerSettings};
pub use suppression::{SuppressionRecord, SuppressionStore};
pub use targets::{ConfigSource, MappingRow, Target, TargetResolver, VipMode, VirtualIp};
