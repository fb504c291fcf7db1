//! Resource leases: keep the host awake for the length of one cycle.
//!
//! A [`Lease`] is a guard. Dropping it releases the hold, so every exit path
//! (success, failure, stop, shutdown) releases without extra bookkeeping.
//! Each lease also arms a ceiling timer; when it elapses the callback runs so
//! the owner can force the release even if the cycle never finished.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Hands out leases and counts how many are outstanding.
#[derive(Debug, Clone)]
pub struct LeaseHost {
    held: Arc<AtomicUsize>,
    ceiling: Duration,
}

impl LeaseHost {
    pub fn new(ceiling: Duration) -> Self {
        Self {
            held: Arc::new(AtomicUsize::new(0)),
            ceiling,
        }
    }

    /// Take a lease for `cycle`. `on_ceiling` runs if the lease is still held
    /// when the ceiling elapses.
    ///
    /// Must be called from within a tokio runtime.
    pub fn acquire(&self, cycle: u64, on_ceiling: impl FnOnce() + Send + 'static) -> Lease {
        let ceiling = self.ceiling;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(ceiling).await;
            tracing::warn!(cycle, ceiling_secs = ceiling.as_secs(), "lease ceiling reached");
            on_ceiling();
        });
        let held = self.held.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(cycle, held, "lease acquired");
        Lease {
            cycle,
            acquired_at: Instant::now(),
            held: Arc::clone(&self.held),
            timer,
        }
    }
}

/// A held lease. Released on drop.
#[derive(Debug)]
pub struct Lease {
    cycle: u64,
    acquired_at: Instant,
    held: Arc<AtomicUsize>,
    timer: JoinHandle<()>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.timer.abort();
        self.held.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!(
            cycle = self.cycle,
            held_ms = u64::try_from(self.acquired_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            "lease released"
        );
    }
}
