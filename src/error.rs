//! Why a discovery cycle ended without a place.
//!
//! Every failure here is recoverable: the machine stays in `Searching` and
//! retries on the short interval. None of them reach the user.

use crate::discovery::DiscoveryError;
use crate::location::LocationError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CycleFailure {
    #[error("location unavailable: {0}")]
    LocationUnavailable(#[from] LocationError),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("server error: HTTP {0}")]
    ServerError(u16),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("no places in range")]
    EmptyResultSet,

    #[error("cycle exceeded the lease ceiling")]
    LeaseExpired,

    #[error("could not record the found place: {0}")]
    PersistFailure(String),
}

impl From<DiscoveryError> for CycleFailure {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::Transport(msg) => Self::TransportFailure(msg),
            DiscoveryError::Server { status } => Self::ServerError(status),
            DiscoveryError::Malformed(msg) => Self::MalformedResponse(msg),
        }
    }
}
