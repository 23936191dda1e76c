//! Wall-clock time and sleeping.
//!
//! Suppression expiry is persisted as epoch seconds and compared across
//! processes, so it needs wall-clock time rather than a monotonic instant.

use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of time for suppression records and the stabilization loop
#[async_trait]
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch
    fn now(&self) -> u64;

    /// Suspend the current task for `duration`
    async fn sleep(&self, duration: Duration);
}

/// The host's clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
