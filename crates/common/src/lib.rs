//! Common utilities and types shared across pppoe-ha components.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
