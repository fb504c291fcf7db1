//! Overpass query construction.
//!
//! Builds an Overpass QL query for every candidate category around a point,
//! for both nodes (point features) and ways (area features). Ways are asked
//! for `out center` so a single coordinate can be pulled from each.

use std::borrow::Cow;
use std::fmt;

use crate::model::GeoPoint;

/// Tag filters for the candidate categories, in query order.
const CATEGORIES: [&str; 4] = [
    r#"["leisure"="park"]"#,
    r#"["amenity"="cafe"]"#,
    r#"["amenity"="restaurant"]"#,
    r#"["tourism"]"#,
];

/// Feature kinds queried for each category.
const FEATURES: [&str; 2] = ["node", "way"];

/// A complete Overpass QL query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverpassQuery(String);

impl OverpassQuery {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The query percent-encoded for use as a URL parameter value.
    pub fn encoded(&self) -> Cow<'_, str> {
        urlencoding::encode(&self.0)
    }

    /// The full request URL against an interpreter endpoint.
    pub fn request_url(&self, endpoint: &str) -> String {
        format!("{endpoint}?data={}", self.encoded())
    }
}

impl fmt::Display for OverpassQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the discovery query for `radius_m` meters around `center`.
///
/// Pure: the same inputs always produce the same query.
pub fn build_query(center: GeoPoint, radius_m: u32) -> OverpassQuery {
    let around = format!(
        "(around:{radius_m},{},{})",
        GeoPoint::format_coord(center.lat),
        GeoPoint::format_coord(center.lon)
    );

    let mut query = String::from("[out:json];(");
    for feature in FEATURES {
        for category in CATEGORIES {
            query.push_str(feature);
            query.push_str(category);
            query.push_str(&around);
            query.push(';');
        }
    }
    query.push_str(");out center;");
    OverpassQuery(query)
}
