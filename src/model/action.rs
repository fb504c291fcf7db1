//! Host actions: the named events a host delivers to the service.

use std::fmt;
use std::str::FromStr;

/// An action delivered by the host.
///
/// Each maps onto exactly one state machine transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StartService,
    StopService,
    /// A host-level wake: re-check now.
    UpdateLocation,
    SearchNotificationClicked,
    PlaceNotificationClicked,
}

impl Action {
    pub const ALL: [Self; 5] = [
        Self::StartService,
        Self::StopService,
        Self::UpdateLocation,
        Self::SearchNotificationClicked,
        Self::PlaceNotificationClicked,
    ];

    /// The string identifier the host uses for this action.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartService => "start-service",
            Self::StopService => "stop-service",
            Self::UpdateLocation => "update-location",
            Self::SearchNotificationClicked => "search-notification-clicked",
            Self::PlaceNotificationClicked => "place-notification-clicked",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}
