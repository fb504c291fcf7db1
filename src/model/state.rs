//! The search state: one value, owned by the state machine.

use std::fmt;
use std::str::FromStr;

use jiff::Timestamp;

use super::GeoPoint;

/// Where the search stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchPhase {
    /// Not running. Only `start` leaves this phase.
    #[default]
    Stopped,

    /// Started; the first location request is in flight.
    Starting,

    /// Looking for a place, either mid-cycle or waiting on a retry.
    Searching,

    /// A place was found; cooling down before the next automatic search.
    Found,
}

impl SearchPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Searching => "searching",
            Self::Found => "found",
        }
    }

    pub fn is_running(self) -> bool {
        self != Self::Stopped
    }
}

impl fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stopped" => Ok(Self::Stopped),
            "starting" => Ok(Self::Starting),
            "searching" => Ok(Self::Searching),
            "found" => Ok(Self::Found),
            other => Err(format!("unknown search phase: {other}")),
        }
    }
}

/// Process-wide search state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub phase: SearchPhase,

    /// Last location fix and when it was taken.
    pub last_location: Option<(GeoPoint, Timestamp)>,

    /// Set by a place-notification click in `suspend` mode: automatic
    /// searching waits for a search-notification click.
    pub suspended: bool,
}
