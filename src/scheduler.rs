//! Wake scheduler: owns the single pending wake-up.
//!
//! Scheduling always supersedes: arming a new entry aborts the previous
//! timer and overwrites the persisted entry. The entry is written to the
//! store before the timer is armed, so a process that dies in between can
//! re-arm it on the next start ([`WakeScheduler::rehydrate`]).
//!
//! When a timer fires it posts [`Event::Wake`] carrying the entry id. The
//! service checks it with [`WakeScheduler::accept_fire`]; a fire for an entry
//! that has since been superseded or cancelled is dropped.

use std::time::Duration;

use jiff::Timestamp;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::machine::Event;
use crate::model::{ScheduleEntry, WakeAction};
use crate::storage::Storage;

/// Cap on how late an inexact wake may land.
const INEXACT_MAX_SLACK: Duration = Duration::from_secs(15 * 60);

#[derive(Debug)]
pub struct WakeScheduler {
    storage: Storage,
    events: mpsc::UnboundedSender<Event>,
    exact_allowed: bool,
    warned_inexact: bool,
    pending: Option<Pending>,
}

#[derive(Debug)]
struct Pending {
    entry: ScheduleEntry,
    timer: JoinHandle<()>,
}

impl WakeScheduler {
    /// `exact_allowed` reflects whether the host grants exact wake-ups.
    pub fn new(storage: Storage, events: mpsc::UnboundedSender<Event>, exact_allowed: bool) -> Self {
        Self {
            storage,
            events,
            exact_allowed,
            warned_inexact: false,
            pending: None,
        }
    }

    /// Replace any pending wake with one firing after `delay`.
    ///
    /// Exact timing is requested. If the host does not allow it the wake is
    /// armed inexactly instead: it fires somewhere in a window after `delay`.
    /// Never fails; persistence problems are logged.
    pub fn schedule_next(&mut self, delay: Duration, action: WakeAction) -> ScheduleEntry {
        self.abort_timer();

        let (delay, exact) = if self.exact_allowed {
            (delay, true)
        } else {
            if !self.warned_inexact {
                tracing::warn!("exact wake-ups not permitted; falling back to inexact timing");
                self.warned_inexact = true;
            }
            (delay + inexact_slack(delay), false)
        };

        let entry = ScheduleEntry {
            id: Uuid::new_v4(),
            fire_at: fire_time(delay),
            action,
            exact,
        };
        if let Err(e) = self.storage.set_pending_wake(&entry) {
            tracing::warn!(error = %e, "failed to persist pending wake");
        }

        tracing::info!(
            ?action,
            exact,
            delay_secs = delay.as_secs(),
            fire_at = %entry.fire_at,
            "scheduled next wake"
        );
        self.arm(entry.clone(), delay);
        entry
    }

    /// Cancel the pending wake, if any. Safe to call with nothing pending.
    pub fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.timer.abort();
            tracing::debug!(id = %pending.entry.id, "cancelled pending wake");
        }
        if let Err(e) = self.storage.clear_pending_wake() {
            tracing::warn!(error = %e, "failed to clear persisted wake");
        }
    }

    /// Re-arm the wake persisted by a previous process, if there is one.
    ///
    /// Overdue entries fire immediately.
    pub fn rehydrate(&mut self) -> Option<ScheduleEntry> {
        let entry = match self.storage.pending_wake() {
            Ok(entry) => entry?,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable persisted wake");
                self.cancel_pending();
                return None;
            }
        };

        let remaining = remaining_until(entry.fire_at);
        tracing::info!(
            id = %entry.id,
            action = ?entry.action,
            remaining_secs = remaining.as_secs(),
            "re-armed persisted wake"
        );
        self.abort_timer();
        self.arm(entry.clone(), remaining);
        Some(entry)
    }

    /// Claim a fired wake. `false` means it was superseded and must be ignored.
    pub fn accept_fire(&mut self, id: Uuid) -> bool {
        match &self.pending {
            Some(pending) if pending.entry.id == id => {
                self.pending = None;
                if let Err(e) = self.storage.clear_pending_wake() {
                    tracing::warn!(error = %e, "failed to clear persisted wake");
                }
                true
            }
            _ => {
                tracing::debug!(%id, "ignoring superseded wake");
                false
            }
        }
    }

    pub fn pending(&self) -> Option<&ScheduleEntry> {
        self.pending.as_ref().map(|p| &p.entry)
    }

    fn arm(&mut self, entry: ScheduleEntry, delay: Duration) {
        let events = self.events.clone();
        let (id, action) = (entry.id, entry.action);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The service may already be gone; nothing to wake then.
            let _ = events.send(Event::Wake { id, action });
        });
        self.pending = Some(Pending { entry, timer });
    }

    fn abort_timer(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.timer.abort();
        }
    }
}

impl Drop for WakeScheduler {
    fn drop(&mut self) {
        // The persisted entry stays behind for the next process.
        self.abort_timer();
    }
}

/// Extra delay for an inexact wake: up to 10% of the delay, capped.
fn inexact_slack(delay: Duration) -> Duration {
    let window = (delay / 10).min(INEXACT_MAX_SLACK);
    let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(rand::thread_rng().gen_range(0..=window_ms))
}

fn fire_time(delay: Duration) -> Timestamp {
    let now = Timestamp::now();
    let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
    Timestamp::from_millisecond(now.as_millisecond().saturating_add(delay_ms))
        .unwrap_or(Timestamp::MAX)
}

fn remaining_until(fire_at: Timestamp) -> Duration {
    let remaining_ms = fire_at
        .as_millisecond()
        .saturating_sub(Timestamp::now().as_millisecond());
    Duration::from_millis(u64::try_from(remaining_ms).unwrap_or(0))
}
