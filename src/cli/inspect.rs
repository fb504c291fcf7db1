//! One-shot commands over the persisted state: status, radius, place, query.

use std::fmt::Write as _;

use crate::config::Config;
use crate::model::{GeoPoint, SearchPhase};
use crate::presenter::format_place;
use crate::query::build_query;
use crate::storage::Storage;

pub(super) fn cmd_status(storage: &Storage) -> Result<(), String> {
    print!("{}", status_report(storage)?);
    Ok(())
}

pub(super) fn cmd_radius(storage: &Storage, meters: Option<u32>) -> Result<(), String> {
    if let Some(meters) = meters {
        storage
            .set_search_radius(meters)
            .map_err(|e| format!("failed to set radius: {e}"))?;
        tracing::info!(meters, "search radius updated");
    }
    let radius = storage
        .search_radius()
        .map_err(|e| format!("failed to read radius: {e}"))?;
    println!("{radius}");
    Ok(())
}

pub(super) fn cmd_place(storage: &Storage, clear: bool) -> Result<(), String> {
    if clear {
        let read = |e: crate::storage::StorageError| format!("failed to read state: {e}");
        if storage.is_running().map_err(read)?
            && storage.search_phase().map_err(read)? == SearchPhase::Found
        {
            return Err("the running session is showing this place; \
                        stop the service or search again before clearing it"
                .to_string());
        }
        return storage
            .clear_last_place()
            .map_err(|e| format!("failed to clear place: {e}"));
    }
    match storage
        .last_place()
        .map_err(|e| format!("failed to read place: {e}"))?
    {
        Some(place) => println!("{}", format_place(&place)),
        None => println!("No place found yet"),
    }
    Ok(())
}

pub(super) fn cmd_query(
    config: &Config,
    storage: &Storage,
    lat: f64,
    lon: f64,
    radius: Option<u32>,
    encoded: bool,
) -> Result<(), String> {
    let radius = match radius {
        Some(r) => r,
        None => storage
            .search_radius()
            .map_err(|e| format!("failed to read radius: {e}"))?,
    };
    let query = build_query(GeoPoint::new(lat, lon), radius);
    if encoded {
        println!("{}", query.request_url(&config.overpass.endpoint));
    } else {
        println!("{query}");
    }
    Ok(())
}

fn status_report(storage: &Storage) -> Result<String, String> {
    let read = |e: crate::storage::StorageError| format!("failed to read state: {e}");

    let mut out = String::new();
    let running = storage.is_running().map_err(read)?;
    let _ = writeln!(out, "running:  {}", if running { "yes" } else { "no" });
    let _ = writeln!(out, "phase:    {}", storage.search_phase().map_err(read)?);
    if storage.is_suspended().map_err(read)? {
        let _ = writeln!(out, "          (suspended until the search notification is clicked)");
    }
    let _ = writeln!(out, "radius:   {} m", storage.search_radius().map_err(read)?);

    match storage.last_known_location().map_err(read)? {
        Some((point, at)) => {
            let _ = writeln!(out, "location: {point} at {at}");
        }
        None => {
            let _ = writeln!(out, "location: unknown");
        }
    }
    match storage.pending_wake().map_err(read)? {
        Some(wake) => {
            let timing = if wake.exact { "exact" } else { "inexact" };
            let _ = writeln!(
                out,
                "next:     {:?} at {} ({timing})",
                wake.action, wake.fire_at
            );
        }
        None => {
            let _ = writeln!(out, "next:     nothing scheduled");
        }
    }
    match storage.last_place().map_err(read)? {
        Some(place) => {
            let _ = writeln!(out, "place:    {} ({})", place.name(), place.poi_type());
        }
        None => {
            let _ = writeln!(out, "place:    none");
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use jiff::Timestamp;

    use crate::model::PlaceRecord;
    use crate::storage::test_support::test_storage;

    #[test]
    fn status_of_fresh_store() {
        let (_dir, storage) = test_storage();

        let report = status_report(&storage).unwrap();

        assert!(report.contains("running:  no"));
        assert!(report.contains("phase:    stopped"));
        assert!(report.contains("radius:   1000 m"));
        assert!(report.contains("location: unknown"));
        assert!(report.contains("next:     nothing scheduled"));
        assert!(report.contains("place:    none"));
    }

    #[test]
    fn status_reflects_a_found_place() {
        let (_dir, storage) = test_storage();
        storage.set_running(true).unwrap();
        storage.set_search_phase(SearchPhase::Found).unwrap();
        storage
            .set_last_known_location(GeoPoint::new(1.5, 2.5), Timestamp::UNIX_EPOCH)
            .unwrap();
        storage
            .set_last_place(&PlaceRecord {
                id: 3,
                point: GeoPoint::new(1.5, 2.5),
                tags: BTreeMap::from([
                    ("name".to_string(), "The Crown".to_string()),
                    ("amenity".to_string(), "pub".to_string()),
                ]),
            })
            .unwrap();

        let report = status_report(&storage).unwrap();

        assert!(report.contains("running:  yes"));
        assert!(report.contains("phase:    found"));
        assert!(report.contains("location: Lat: 1.5, Lon: 2.5"));
        assert!(report.contains("place:    The Crown (pub)"));
    }

    #[test]
    fn radius_command_persists() {
        let (_dir, storage) = test_storage();
        cmd_radius(&storage, Some(250)).unwrap();
        assert_eq!(storage.search_radius().unwrap(), 250);
    }

    #[test]
    fn place_clear_forgets_the_place() {
        let (_dir, storage) = test_storage();
        storage
            .set_last_place(&PlaceRecord {
                id: 1,
                point: GeoPoint::new(0.0, 0.0),
                tags: BTreeMap::new(),
            })
            .unwrap();

        cmd_place(&storage, true).unwrap();

        assert!(storage.last_place().unwrap().is_none());
    }

    #[test]
    fn place_clear_refused_while_a_running_session_shows_it() {
        let (_dir, storage) = test_storage();
        let place = PlaceRecord {
            id: 5,
            point: GeoPoint::new(0.5, 0.5),
            tags: BTreeMap::new(),
        };
        storage.set_last_place(&place).unwrap();
        storage.set_running(true).unwrap();
        storage.set_search_phase(SearchPhase::Found).unwrap();

        let err = cmd_place(&storage, true).unwrap_err();

        assert!(err.contains("stop the service"));
        assert_eq!(storage.last_place().unwrap(), Some(place));

        storage.set_search_phase(SearchPhase::Searching).unwrap();
        cmd_place(&storage, true).unwrap();
        assert!(storage.last_place().unwrap().is_none());
    }
}
