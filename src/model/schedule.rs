//! Scheduled wake-ups.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What to do when a scheduled wake fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WakeAction {
    /// Short-interval retry while still searching without a result.
    Recheck,

    /// Long-interval restart of the search after a place was found.
    ResumeSearch,
}

/// A pending wake-up. At most one exists at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub id: Uuid,

    /// Absolute wall-clock fire time. Survives process restarts.
    pub fire_at: Timestamp,

    pub action: WakeAction,

    /// Whether the entry was armed with exact timing.
    pub exact: bool,
}
