//! Presentation sink: where the service's user-facing output goes.
//!
//! Calls are fire-and-forget and must tolerate repeats with the same
//! argument.

use std::io::{self, Write};
use std::sync::Mutex;

use crate::model::PlaceRecord;

pub trait Presenter: Send + Sync {
    /// Update the persistent status line: searching, or idle and waiting
    /// for a click to search again.
    fn show_searching_status(&self, searching: bool);

    /// Announce a newly found place.
    fn show_place_found(&self, place: &PlaceRecord);

    /// Take down the found-place announcement.
    fn dismiss_place_found(&self);

    /// The service stopped; clear the status line.
    fn show_stopped(&self);
}

/// Writes status lines to stderr and place cards to stdout.
///
/// Repeated calls with unchanged content print nothing.
#[derive(Debug, Default)]
pub struct TerminalPresenter {
    shown: Mutex<Shown>,
}

#[derive(Debug, Default)]
struct Shown {
    status: Option<Status>,
    place: Option<PlaceRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Searching,
    Idle,
    Stopped,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_status(&self, status: Status) {
        let Ok(mut shown) = self.shown.lock() else {
            return;
        };
        if shown.status == Some(status) {
            return;
        }
        shown.status = Some(status);
        let line = match status {
            Status::Searching => "spotnear is running: discovering interesting places nearby",
            Status::Idle => "spotnear is running: send search-notification-clicked to search again",
            Status::Stopped => "spotnear stopped",
        };
        eprintln!("{line}");
    }
}

impl Presenter for TerminalPresenter {
    fn show_searching_status(&self, searching: bool) {
        self.set_status(if searching {
            Status::Searching
        } else {
            Status::Idle
        });
    }

    fn show_place_found(&self, place: &PlaceRecord) {
        let Ok(mut shown) = self.shown.lock() else {
            return;
        };
        if shown.place.as_ref() == Some(place) {
            return;
        }
        shown.place = Some(place.clone());

        let mut out = io::stdout().lock();
        // A closed stdout is not worth failing a transition over.
        let _ = writeln!(out, "{}", format_place(place));
        let _ = out.flush();
    }

    fn dismiss_place_found(&self) {
        if let Ok(mut shown) = self.shown.lock() {
            shown.place = None;
        }
    }

    fn show_stopped(&self) {
        self.dismiss_place_found();
        self.set_status(Status::Stopped);
    }
}

/// The place card shown when a place is found.
pub fn format_place(place: &PlaceRecord) -> String {
    format!(
        "Found a place near you!\n  Name: {}\n  Type: {}\n  Latitude: {}\n  Longitude: {}",
        place.name(),
        place.poi_type(),
        crate::model::GeoPoint::format_coord(place.point.lat),
        crate::model::GeoPoint::format_coord(place.point.lon),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use crate::model::GeoPoint;

    #[test]
    fn place_card_lists_name_type_and_coordinates() {
        let place = PlaceRecord {
            id: 1,
            point: GeoPoint::new(1.0, 2.5),
            tags: BTreeMap::from([
                ("name".to_string(), "Riverside".to_string()),
                ("leisure".to_string(), "park".to_string()),
            ]),
        };

        assert_eq!(
            format_place(&place),
            "Found a place near you!\n  Name: Riverside\n  Type: Park\n  Latitude: 1.0\n  Longitude: 2.5"
        );
    }

    #[test]
    fn repeated_calls_are_harmless() {
        let presenter = TerminalPresenter::new();
        presenter.show_searching_status(true);
        presenter.show_searching_status(true);
        presenter.show_stopped();
        presenter.show_stopped();

        let shown = presenter.shown.lock().unwrap();
        assert_eq!(shown.status, Some(Status::Stopped));
        assert!(shown.place.is_none());
    }
}
