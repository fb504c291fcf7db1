//! Overpass API client.
//!
//! Sends the query as the `data` parameter of a GET request and decodes the
//! `elements` array. Points carry `lat`/`lon` directly; areas queried with
//! `out center` carry them under `center`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::OverpassConfig;
use crate::model::{GeoPoint, PlaceRecord};
use crate::query::OverpassQuery;

use super::{Discover, DiscoveryError};

/// Discovery against an Overpass interpreter.
#[derive(Debug, Clone)]
pub struct OverpassClient {
    client: reqwest::Client,
    endpoint: String,
}

impl OverpassClient {
    /// Build a client with the configured endpoint and timeouts.
    ///
    /// reqwest has no separate write timeout, so the write budget is folded
    /// into the total request timeout alongside connect and read.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Transport`] if the client cannot be constructed.
    pub fn new(config: &OverpassConfig) -> Result<Self, DiscoveryError> {
        let connect = Duration::from_secs(config.connect_timeout_secs);
        let read = Duration::from_secs(config.read_timeout_secs);
        let write = Duration::from_secs(config.write_timeout_secs);

        let client = reqwest::Client::builder()
            .connect_timeout(connect)
            .read_timeout(read)
            .timeout(connect + read + write)
            .user_agent(concat!("spotnear/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DiscoveryError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Discover for OverpassClient {
    async fn discover(&self, query: &OverpassQuery) -> Result<Vec<PlaceRecord>, DiscoveryError> {
        let url = query.request_url(&self.endpoint);
        tracing::debug!(endpoint = %self.endpoint, "querying Overpass");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DiscoveryError::Transport(format!("Overpass request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Server {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DiscoveryError::Transport(format!("Overpass response read failed: {e}")))?;

        tracing::trace!(bytes = body.len(), "Overpass response received");
        parse_elements(&body)
    }
}

#[derive(Deserialize)]
struct OverpassResponse {
    elements: Vec<Element>,
}

#[derive(Deserialize)]
struct Element {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    lat: Option<Coord>,
    lon: Option<Coord>,
    center: Option<Center>,
}

#[derive(Deserialize)]
struct Center {
    lat: Coord,
    lon: Coord,
}

/// Overpass emits numbers; stored and hand-written payloads use strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Coord {
    Number(f64),
    Text(String),
}

impl Coord {
    fn value(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl Element {
    fn point(&self) -> Option<GeoPoint> {
        if let (Some(lat), Some(lon)) = (&self.lat, &self.lon) {
            return Some(GeoPoint::new(lat.value()?, lon.value()?));
        }
        let center = self.center.as_ref()?;
        Some(GeoPoint::new(center.lat.value()?, center.lon.value()?))
    }
}

/// Decode an Overpass JSON body into places.
///
/// Elements without usable coordinates are skipped.
///
/// # Errors
///
/// Returns [`DiscoveryError::Malformed`] when the body is not an Overpass
/// result document.
fn parse_elements(body: &[u8]) -> Result<Vec<PlaceRecord>, DiscoveryError> {
    let response: OverpassResponse =
        serde_json::from_slice(body).map_err(|e| DiscoveryError::Malformed(e.to_string()))?;

    let total = response.elements.len();
    let places: Vec<PlaceRecord> = response
        .elements
        .into_iter()
        .filter_map(|element| {
            let point = element.point()?;
            Some(PlaceRecord {
                id: element.id,
                point,
                tags: element.tags,
            })
        })
        .collect();

    if places.len() < total {
        tracing::debug!(
            skipped = total - places.len(),
            "skipped elements without coordinates"
        );
    }
    Ok(places)
}
