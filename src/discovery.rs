//! Discovery: turn a query into candidate places and pick one.
//!
//! The [`Discover`] trait is the seam between the state machine and the
//! network. [`OverpassClient`] is the production implementation; tests
//! substitute canned results.

mod overpass;

pub use overpass::OverpassClient;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::PlaceRecord;
use crate::query::OverpassQuery;

/// Errors from a single discovery request.
///
/// Never fatal: the caller classifies them and retries later.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryError {
    /// Connect failure, timeout, or broken body.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("server returned HTTP {status}")]
    Server { status: u16 },

    /// The body could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Runs a POI query.
#[async_trait]
pub trait Discover: Send + Sync {
    async fn discover(&self, query: &OverpassQuery) -> Result<Vec<PlaceRecord>, DiscoveryError>;
}

/// Chooses which of the discovered places to surface.
pub trait SelectionPolicy: Send {
    /// Index of the chosen place, or `None` for an empty slice.
    fn select(&mut self, places: &[PlaceRecord]) -> Option<usize>;
}

/// Uniformly random choice over all candidates.
#[derive(Debug)]
pub struct UniformRandom<R = StdRng> {
    rng: R,
}

impl UniformRandom<StdRng> {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequence.
    #[cfg(test)]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for UniformRandom<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng + Send> SelectionPolicy for UniformRandom<R> {
    fn select(&mut self, places: &[PlaceRecord]) -> Option<usize> {
        if places.is_empty() {
            return None;
        }
        Some(self.rng.gen_range(0..places.len()))
    }
}
