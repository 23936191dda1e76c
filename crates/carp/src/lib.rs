//! CARP role and interface observation.
//!
//! This crate does not speak the CARP protocol. It reads what the kernel
//! reports through `ifconfig` and turns that text into typed values:
//!
//! - [`CarpRole`] per VHID (MASTER / BACKUP / INIT)
//! - [`LinkStatus`] per interface, with the "PPPoE session established"
//!   predicate [`LinkStatus::is_active`]
//! - the VHID behind a `carpN` pseudo-interface
//!
//! # Example
//!
//! ```no_run
//! use carp::{IfconfigOracle, RoleOracle};
//!
//! # async fn example() {
//! let oracle = IfconfigOracle::default();
//! let role = oracle.role(5).await;
//! let up = oracle
//!     .link_status("pppoe0")
//!     .await
//!     .is_some_and(|s| s.is_active());
//! println!("vhid 5 is {role}, pppoe0 established: {up}");
//! # }
//! ```

mod oracle;
pub mod parser;
mod types;

pub use oracle::{DEFAULT_IFCONFIG, IfconfigOracle, RoleOracle};
pub use types::{
    CarpRole, DIALUP_PREFIX, LinkStatus, UnknownRole, Vhid, is_dialup_name, parse_vhid,
    serves_master,
};
