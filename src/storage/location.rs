//! Location storage: the last known fix and when it was taken.
//!
//! The fix is kept as display text (`Lat: X, Lon: Y`) and the time as epoch
//! milliseconds, each under its own key.

use jiff::Timestamp;

use crate::model::GeoPoint;

use super::{Result, Storage, StorageError, keys};

impl Storage {
    /// The last known location and its acquisition time.
    ///
    /// A location without a recorded time is reported with the Unix epoch.
    pub fn last_known_location(&self) -> Result<Option<(GeoPoint, Timestamp)>> {
        let Some(text) = self.get::<String>(keys::LAST_KNOWN_LOCATION)? else {
            return Ok(None);
        };
        let point = parse_location(&text).ok_or_else(|| StorageError::Corrupt {
            key: keys::LAST_KNOWN_LOCATION,
            reason: format!("unrecognized location {text:?}"),
        })?;
        let millis = self
            .get::<i64>(keys::LAST_LOCATION_UPDATE_TIME)?
            .unwrap_or(0);
        let at = Timestamp::from_millisecond(millis).map_err(|e| StorageError::Corrupt {
            key: keys::LAST_LOCATION_UPDATE_TIME,
            reason: e.to_string(),
        })?;
        Ok(Some((point, at)))
    }

    pub fn set_last_known_location(&self, point: GeoPoint, at: Timestamp) -> Result<()> {
        self.put(keys::LAST_KNOWN_LOCATION, &point.to_string())?;
        self.put(keys::LAST_LOCATION_UPDATE_TIME, &at.as_millisecond())
    }
}

/// Parses the `Lat: X, Lon: Y` form written by [`GeoPoint`]'s `Display`.
fn parse_location(text: &str) -> Option<GeoPoint> {
    let (lat, lon) = text.split_once(',')?;
    let lat = lat.trim().strip_prefix("Lat:")?.trim().parse().ok()?;
    let lon = lon.trim().strip_prefix("Lon:")?.trim().parse().ok()?;
    Some(GeoPoint::new(lat, lon))
}
