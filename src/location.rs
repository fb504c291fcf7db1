//! Location fixes.
//!
//! The state machine asks a [`LocationProvider`] for the current position
//! at the start of every cycle. Providers are injected so tests can fake
//! them; the CLI picks one from the `[location]` config section.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::LocationConfig;
use crate::model::GeoPoint;

/// Why no location fix is available.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// No source of location is configured or allowed.
    #[error("location access is not available")]
    PermissionDenied,

    /// The source answered but had no fix.
    #[error("no location fix")]
    NoFix,

    /// The source could not be reached.
    #[error("location lookup failed: {0}")]
    Lookup(String),
}

/// Supplies the device's current position.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current(&self) -> Result<GeoPoint, LocationError>;
}

/// Always reports the same point.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub GeoPoint);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current(&self) -> Result<GeoPoint, LocationError> {
        Ok(self.0)
    }
}

/// Reports no location. Used when nothing is configured.
#[derive(Debug, Clone, Copy)]
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn current(&self) -> Result<GeoPoint, LocationError> {
        Err(LocationError::PermissionDenied)
    }
}

/// Coarse position from an IP geolocation service.
///
/// Expects a JSON object with `lat` and `lon`. If a `status` field is
/// present it must be `"success"`.
#[derive(Debug, Clone)]
pub struct IpLocation {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct IpLookup {
    status: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl IpLocation {
    /// # Errors
    ///
    /// Returns [`LocationError::Lookup`] if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, LocationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LocationError::Lookup(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl LocationProvider for IpLocation {
    async fn current(&self) -> Result<GeoPoint, LocationError> {
        let lookup: IpLookup = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| LocationError::Lookup(e.to_string()))?
            .json()
            .await
            .map_err(|e| LocationError::Lookup(format!("unreadable lookup response: {e}")))?;

        if lookup.status.as_deref().is_some_and(|s| s != "success") {
            return Err(LocationError::NoFix);
        }
        match (lookup.lat, lookup.lon) {
            (Some(lat), Some(lon)) => Ok(GeoPoint::new(lat, lon)),
            _ => Err(LocationError::NoFix),
        }
    }
}

/// Choose a provider from config: fixed point, then IP lookup, then none.
///
/// # Errors
///
/// Returns [`LocationError::Lookup`] if the IP lookup client cannot be built.
pub fn from_config(
    config: &LocationConfig,
    timeout: Duration,
) -> Result<Box<dyn LocationProvider>, LocationError> {
    if let (Some(lat), Some(lon)) = (config.latitude, config.longitude) {
        return Ok(Box::new(FixedLocation(GeoPoint::new(lat, lon))));
    }
    if let Some(endpoint) = &config.ip_endpoint {
        return Ok(Box::new(IpLocation::new(endpoint.clone(), timeout)?));
    }
    tracing::warn!("no location source configured; every cycle will retry");
    Ok(Box::new(NoLocation))
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn ip_location_answering(body: serde_json::Value) -> (MockServer, IpLocation) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        let provider = IpLocation::new(server.uri(), Duration::from_secs(5)).unwrap();
        (server, provider)
    }

    #[tokio::test]
    async fn fixed_location_reports_its_point() {
        let point = GeoPoint::new(35.68, 139.69);
        assert_eq!(FixedLocation(point).current().await, Ok(point));
    }

    #[tokio::test]
    async fn no_location_is_denied() {
        assert_eq!(
            NoLocation.current().await,
            Err(LocationError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn ip_lookup_success() {
        let (_server, provider) =
            ip_location_answering(json!({"status": "success", "lat": 45.5, "lon": -73.6})).await;

        assert_eq!(provider.current().await, Ok(GeoPoint::new(45.5, -73.6)));
    }

    #[tokio::test]
    async fn ip_lookup_failure_status_is_no_fix() {
        let (_server, provider) =
            ip_location_answering(json!({"status": "fail", "message": "private range"})).await;

        assert_eq!(provider.current().await, Err(LocationError::NoFix));
    }

    #[tokio::test]
    async fn ip_lookup_server_error_is_lookup_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let provider = IpLocation::new(server.uri(), Duration::from_secs(5)).unwrap();

        assert!(matches!(
            provider.current().await,
            Err(LocationError::Lookup(_))
        ));
    }

    #[tokio::test]
    async fn config_prefers_fixed_point() {
        let config = LocationConfig {
            latitude: Some(1.0),
            longitude: Some(2.0),
            ip_endpoint: Some("http://unused.invalid".into()),
        };
        let provider = from_config(&config, Duration::from_secs(1)).unwrap();

        assert_eq!(provider.current().await, Ok(GeoPoint::new(1.0, 2.0)));
    }

    #[tokio::test]
    async fn empty_config_has_no_location() {
        let provider = from_config(&LocationConfig::default(), Duration::from_secs(1)).unwrap();
        assert_eq!(
            provider.current().await,
            Err(LocationError::PermissionDenied)
        );
    }
}
