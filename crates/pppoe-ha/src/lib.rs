//! CARP-driven PPPoE failover for pfSense.
//!
//! Binary glue around the [`failover`] engine: the command-line surface
//! devd and the GUI call, YAML configuration and the adapters that run
//! `ifconfig`, `pfSctl` and the detached stabilizer.

pub mod app;
pub mod cli;
pub mod config;
pub mod system;

pub use app::{App, AppError, AppSettings, Collaborators, Report};
pub use cli::{GroupToken, Invocation, ParseFailure, USAGE, UsageError, parse_args};
pub use config::{Config, ConfigError, FileConfigSource};
pub use system::{SelfLauncher, SystemActuator};
