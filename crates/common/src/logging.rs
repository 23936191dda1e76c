//! Logging utilities for pppoe-ha components.

use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize tracing for a single invocation.
///
/// `RUST_LOG` takes precedence over `level`. Output goes to stderr unless
/// `file` is given, in which case lines are appended to it. Detached
/// stabilizer processes run with null stdio, so a log file is the only way
/// their output survives.
pub fn init_with(level: &str, json: bool, file: Option<&Path>) -> Result<()> {
    let writer = match file {
        Some(path) => {
            let handle = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(handle))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if json {
        registry.with(fmt::layer().json().with_writer(writer)).try_init()
    } else {
        registry
            .with(fmt::layer().with_ansi(file.is_none()).with_writer(writer))
            .try_init()
    };

    result.map_err(Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwritable_log_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir").join("pppoe-ha.log");

        let err = init_with("info", false, Some(&missing)).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
