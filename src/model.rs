//! Core data model for spotnear.
//!
//! These types represent the moving parts of a discovery cycle:
//! points, places, the search state, scheduled wake-ups, and host actions.

mod action;
mod place;
mod schedule;
mod state;

pub use action::{Action, UnknownAction};
pub use place::{GeoPoint, PlaceRecord};
pub use schedule::{ScheduleEntry, WakeAction};
pub use state::{SearchPhase, SearchState};
