//! Per-VHID suppression records.
//!
//! A record says "a stabilization loop owns this group until `until`". It is
//! the only coordination token between the event handler and the detached
//! stabilizer processes. Records are advisory: every storage failure reads as
//! "not suppressed" so an event is never dropped because of a disk problem.

use crate::clock::Clock;
use carp::Vhid;
use common::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default directory holding suppression records
pub const DEFAULT_SUPPRESSION_DIR: &str = "/var/run/pppoe-ha";

/// Reason recorded when a MASTER promotion arms suppression
pub const REASON_MASTER_STABILIZE: &str = "master_stabilize";

/// Reason recorded when the stabilizer re-arms an unconverged window
pub const REASON_MASTER_EXTEND: &str = "master_stabilize_extend";

/// On-disk suppression record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionRecord {
    /// Expiry, seconds since the Unix epoch
    pub until: u64,

    /// Free-text reason, for operators
    pub reason: String,

    /// Group this record belongs to (also encoded in the file name)
    pub vhid: Vhid,
}

/// Lazily-expiring suppression records, one file per VHID
pub struct SuppressionStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl SuppressionStore {
    /// Create a store keeping its records under `dir`
    pub fn new(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            clock,
        }
    }

    /// File backing the record of `vhid`
    pub fn path(&self, vhid: Vhid) -> PathBuf {
        self.dir.join(format!("pppoe_ha.suppress.{vhid}.json"))
    }

    /// Arm suppression for `vhid`, replacing any existing record.
    ///
    /// Durations shorter than a second are rounded up to one second. Returns
    /// the record that was meant to be written even if persisting it failed.
    pub fn set(&self, vhid: Vhid, duration: Duration, reason: &str) -> SuppressionRecord {
        let seconds = duration.as_secs().max(1);
        let record = SuppressionRecord {
            until: self.clock.now().saturating_add(seconds),
            reason: reason.to_string(),
            vhid,
        };

        match self.write(&record) {
            Ok(()) => info!(vhid, seconds, reason, "Suppression armed"),
            Err(e) => warn!(vhid, error = %e, "Failed to persist suppression record"),
        }

        record
    }

    /// Remove the record of `vhid`, if any
    pub fn clear(&self, vhid: Vhid) {
        match fs::remove_file(self.path(vhid)) {
            Ok(()) => info!(vhid, "Suppression cleared"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(vhid, error = %e, "Failed to remove suppression record"),
        }
    }

    /// Live record of `vhid`. Expired records are deleted and read as absent.
    pub fn read(&self, vhid: Vhid) -> Option<SuppressionRecord> {
        let path = self.path(vhid);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(vhid, error = %e, "Failed to read suppression record");
                return None;
            }
        };

        let record: SuppressionRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                warn!(vhid, path = %path.display(), error = %e, "Ignoring unreadable suppression record");
                return None;
            }
        };

        if self.clock.now() >= record.until {
            debug!(vhid, until = record.until, "Suppression record expired");
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!(vhid, error = %e, "Failed to remove expired suppression record");
                }
            }
            return None;
        }

        Some(record)
    }

    /// Whether events for `vhid` are currently suppressed
    pub fn is_suppressed(&self, vhid: Vhid) -> bool {
        self.read(vhid).is_some()
    }

    /// Seconds until the record of `vhid` expires; 0 when there is none
    pub fn remaining_seconds(&self, vhid: Vhid) -> u64 {
        self.read(vhid)
            .map(|record| record.until.saturating_sub(self.clock.now()))
            .unwrap_or(0)
    }

    fn write(&self, record: &SuppressionRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        // Readers never observe a half-written record
        let path = self.path(record.vhid);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(record)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualClock;

    fn store(dir: &Path) -> (SuppressionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        (SuppressionStore::new(dir, clock.clone()), clock)
    }

    #[test]
    fn test_set_then_suppressed_until_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let (store, clock) = store(dir.path());

        let record = store.set(5, Duration::from_secs(120), REASON_MASTER_STABILIZE);
        assert_eq!(record.until, 1_120);
        assert!(store.is_suppressed(5));
        assert_eq!(store.remaining_seconds(5), 120);

        clock.advance(Duration::from_secs(119));
        assert!(store.is_suppressed(5));
        assert_eq!(store.remaining_seconds(5), 1);

        clock.advance(Duration::from_secs(1));
        assert!(!store.is_suppressed(5));
        assert_eq!(store.remaining_seconds(5), 0);
    }

    #[test]
    fn test_expired_record_is_deleted_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let (store, clock) = store(dir.path());

        store.set(5, Duration::from_secs(10), "test");
        assert!(store.path(5).exists());

        clock.advance(Duration::from_secs(60));
        assert_eq!(store.read(5), None);
        assert!(!store.path(5).exists());
    }

    #[test]
    fn test_sub_second_duration_rounds_up() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _clock) = store(dir.path());

        let record = store.set(3, Duration::from_millis(10), "test");
        assert_eq!(record.until, 1_001);
        assert!(store.is_suppressed(3));
    }

    #[test]
    fn test_groups_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _clock) = store(dir.path());

        store.set(5, Duration::from_secs(60), "test");
        assert!(store.is_suppressed(5));
        assert!(!store.is_suppressed(6));

        store.clear(6);
        assert!(store.is_suppressed(5));

        store.clear(5);
        assert!(!store.is_suppressed(5));
    }

    #[test]
    fn test_set_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let (store, clock) = store(dir.path());

        store.set(5, Duration::from_secs(60), REASON_MASTER_STABILIZE);
        clock.advance(Duration::from_secs(50));
        store.set(5, Duration::from_secs(60), REASON_MASTER_EXTEND);

        let record = store.read(5).unwrap();
        assert_eq!(record.until, 1_110);
        assert_eq!(record.reason, REASON_MASTER_EXTEND);
        assert_eq!(record.vhid, 5);
    }

    #[test]
    fn test_record_is_self_describing_json() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _clock) = store(dir.path());

        store.set(9, Duration::from_secs(30), "master_stabilize");
        let raw = std::fs::read_to_string(store.path(9)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["until"], 1_030);
        assert_eq!(value["reason"], "master_stabilize");
        assert_eq!(value["vhid"], 9);
    }

    #[test]
    fn test_corrupt_record_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _clock) = store(dir.path());

        std::fs::write(store.path(5), b"{\"until\":").unwrap();
        assert!(!store.is_suppressed(5));
        assert_eq!(store.remaining_seconds(5), 0);
    }

    #[test]
    fn test_unwritable_directory_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the directory should be
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, b"").unwrap();
        let (store, _clock) = store(&blocker);

        let record = store.set(5, Duration::from_secs(60), "test");
        assert_eq!(record.until, 1_060);
        assert!(!store.is_suppressed(5));
    }

    #[test]
    fn test_clear_missing_record_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _clock) = store(&dir.path().join("not-created-yet"));

        store.clear(5);
        assert!(!store.is_suppressed(5));
    }
}
