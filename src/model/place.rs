//! Places: tagged geographic records returned by discovery.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A point on the globe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Renders a coordinate with at least one decimal place (`1.0`, not `1`).
    ///
    /// Used wherever a coordinate is written as text: queries and the store.
    pub fn format_coord(value: f64) -> String {
        let text = value.to_string();
        if text.contains(['.', 'e', 'E']) || !value.is_finite() {
            text
        } else {
            format!("{text}.0")
        }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lat: {}, Lon: {}",
            Self::format_coord(self.lat),
            Self::format_coord(self.lon)
        )
    }
}

/// A single point of interest.
///
/// Serialized in the persisted `placeDetails` shape: tags plus
/// string-typed `lat`/`lon`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredPlace", into = "StoredPlace")]
pub struct PlaceRecord {
    /// Upstream element id, `0` when the source carried none.
    pub id: u64,
    pub point: GeoPoint,
    pub tags: BTreeMap<String, String>,
}

impl PlaceRecord {
    /// The place's `name` tag, or a placeholder.
    pub fn name(&self) -> &str {
        self.tags.get("name").map_or("Unnamed Place", String::as_str)
    }

    /// Human-readable category, checked in tag precedence order:
    /// `leisure=park`, then `amenity`, then `tourism`.
    pub fn poi_type(&self) -> &str {
        if self.tags.get("leisure").is_some_and(|v| v == "park") {
            return "Park";
        }
        if let Some(amenity) = self.tags.get("amenity") {
            return amenity;
        }
        if let Some(tourism) = self.tags.get("tourism") {
            return tourism;
        }
        "Interesting place"
    }
}

#[derive(Serialize, Deserialize)]
struct StoredPlace {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    lat: String,
    lon: String,
}

impl TryFrom<StoredPlace> for PlaceRecord {
    type Error = String;

    fn try_from(stored: StoredPlace) -> Result<Self, Self::Error> {
        let lat = stored
            .lat
            .parse::<f64>()
            .map_err(|e| format!("invalid lat {:?}: {e}", stored.lat))?;
        let lon = stored
            .lon
            .parse::<f64>()
            .map_err(|e| format!("invalid lon {:?}: {e}", stored.lon))?;
        Ok(Self {
            id: stored.id,
            point: GeoPoint::new(lat, lon),
            tags: stored.tags,
        })
    }
}

impl From<PlaceRecord> for StoredPlace {
    fn from(place: PlaceRecord) -> Self {
        Self {
            id: place.id,
            tags: place.tags,
            lat: GeoPoint::format_coord(place.point.lat),
            lon: GeoPoint::format_coord(place.point.lon),
        }
    }
}
