//! The search state machine.
//!
//! Owns the one [`SearchState`] and every transition on it. The machine does
//! no I/O of its own beyond synchronous store writes: each transition returns
//! the [`Effect`]s the service must carry out (ask for a location, run a
//! query, arm a wake, update the presentation).
//!
//! Asynchronous work is tagged with a cycle id. A completion whose id is not
//! the current in-flight cycle (because the cycle was stopped, superseded, or
//! timed out) is ignored, so a late result can never resurrect a stopped
//! session.

use std::time::Duration;

use jiff::Timestamp;
use uuid::Uuid;

use crate::config::{Config, PlaceClickMode};
use crate::discovery::{DiscoveryError, SelectionPolicy};
use crate::error::CycleFailure;
use crate::location::LocationError;
use crate::model::{Action, GeoPoint, PlaceRecord, SearchPhase, SearchState, WakeAction};
use crate::query::{OverpassQuery, build_query};
use crate::storage::{self, DEFAULT_SEARCH_RADIUS, Storage};

/// Everything the machine reacts to, in queue order.
#[derive(Debug)]
pub enum Event {
    /// A host action.
    Action(Action),

    /// A scheduled wake fired.
    Wake { id: Uuid, action: WakeAction },

    LocationResolved {
        cycle: u64,
        result: Result<GeoPoint, LocationError>,
    },

    DiscoveryFinished {
        cycle: u64,
        result: Result<Vec<PlaceRecord>, DiscoveryError>,
    },

    /// The cycle's lease hit its ceiling.
    LeaseExpired { cycle: u64 },

    /// Leave the event loop. Not a stop: persisted state is kept for resume.
    Shutdown,
}

/// Work the service performs on the machine's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    AcquireLease { cycle: u64 },
    ReleaseLease,
    RequestLocation { cycle: u64 },
    Discover { cycle: u64, query: OverpassQuery },
    ScheduleWake { delay: Duration, action: WakeAction },
    CancelWake,
    ShowSearching(bool),
    ShowPlaceFound(PlaceRecord),
    DismissPlace,
    ShowStopped,
}

/// Timing and behaviour knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineSettings {
    pub short_interval: Duration,
    pub long_interval: Duration,
    pub place_click: PlaceClickMode,
}

impl From<&Config> for MachineSettings {
    fn from(config: &Config) -> Self {
        Self {
            short_interval: config.short_interval(),
            long_interval: config.long_interval(),
            place_click: config.place_click,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Locating,
    Discovering,
}

#[derive(Debug, Clone, Copy)]
struct Cycle {
    id: u64,
    stage: Stage,
}

pub struct SearchMachine {
    state: SearchState,
    settings: MachineSettings,
    storage: Storage,
    selection: Box<dyn SelectionPolicy>,
    in_flight: Option<Cycle>,
    next_cycle: u64,
}

impl SearchMachine {
    pub fn new(
        storage: Storage,
        settings: MachineSettings,
        selection: Box<dyn SelectionPolicy>,
    ) -> Self {
        Self {
            state: SearchState::default(),
            settings,
            storage,
            selection,
            in_flight: None,
            next_cycle: 1,
        }
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    /// Id of the cycle currently waiting on location or discovery.
    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight.map(|c| c.id)
    }

    /// Restore state from the store after a (possibly cold) start.
    ///
    /// `wake_pending` says whether the scheduler re-armed a persisted wake.
    /// A running session with nothing pending lost its timer along with the
    /// old process, so it searches again right away.
    pub fn rehydrate(&mut self, wake_pending: bool) -> Vec<Effect> {
        self.state.last_location = self.storage.last_known_location().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring unreadable last known location");
            None
        });

        let running = self.storage.is_running().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "unreadable running flag; assuming stopped");
            false
        });
        if !running {
            self.state.suspended = false;
            self.set_phase(SearchPhase::Stopped);
            return vec![Effect::CancelWake];
        }

        let stored = self.storage.search_phase().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "unreadable search phase");
            SearchPhase::Searching
        });
        let has_place = matches!(self.storage.last_place(), Ok(Some(_)));
        let phase = match stored {
            SearchPhase::Found if has_place => SearchPhase::Found,
            _ => SearchPhase::Searching,
        };
        self.state.suspended =
            phase == SearchPhase::Found && self.storage.is_suspended().unwrap_or(false);
        self.set_phase(phase);

        tracing::info!(
            %phase,
            wake_pending,
            suspended = self.state.suspended,
            last_fix = ?self.state.last_location.map(|(_, at)| at),
            "resuming session"
        );

        if self.state.suspended {
            return vec![Effect::ShowSearching(false)];
        }
        if wake_pending {
            return vec![Effect::ShowSearching(phase == SearchPhase::Searching)];
        }

        let mut effects = Vec::new();
        self.set_phase(SearchPhase::Searching);
        effects.push(Effect::ShowSearching(true));
        self.begin_cycle(&mut effects);
        effects
    }

    /// Apply one event. Wake events must already have been accepted by the
    /// scheduler.
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Action(Action::StartService) => self.start(),
            Event::Action(Action::StopService) => self.stop(),
            Event::Action(Action::UpdateLocation) => self.on_wake(WakeAction::Recheck),
            Event::Action(Action::SearchNotificationClicked) => self.on_search_clicked(),
            Event::Action(Action::PlaceNotificationClicked) => self.on_place_clicked(),
            Event::Wake { action, .. } => self.on_wake(action),
            Event::LocationResolved { cycle, result } => self.on_location(cycle, result),
            Event::DiscoveryFinished { cycle, result } => self.on_discovery(cycle, result),
            Event::LeaseExpired { cycle } => self.on_lease_expired(cycle),
            Event::Shutdown => Vec::new(),
        }
    }

    pub fn start(&mut self) -> Vec<Effect> {
        if self.state.phase.is_running() {
            tracing::debug!(phase = %self.state.phase, "start ignored: already running");
            return Vec::new();
        }
        tracing::info!("starting search");

        self.persist("running flag", self.storage.set_running(true));
        self.set_suspended(false);
        self.set_phase(SearchPhase::Starting);

        let mut effects = vec![Effect::ShowSearching(true)];
        self.begin_cycle(&mut effects);
        effects
    }

    pub fn stop(&mut self) -> Vec<Effect> {
        let mut effects = vec![Effect::CancelWake];
        self.end_cycle(&mut effects);

        self.persist("running flag", self.storage.set_running(false));
        self.set_suspended(false);
        if self.state.phase.is_running() {
            tracing::info!("search stopped");
            effects.push(Effect::ShowStopped);
        }
        self.set_phase(SearchPhase::Stopped);
        effects
    }

    fn on_location(&mut self, cycle: u64, result: Result<GeoPoint, LocationError>) -> Vec<Effect> {
        if !self.is_current(cycle, Stage::Locating) {
            tracing::debug!(cycle, "ignoring stale location result");
            return Vec::new();
        }
        if self.state.phase == SearchPhase::Starting {
            self.set_phase(SearchPhase::Searching);
        }

        let point = match result {
            Ok(point) => point,
            Err(e) => return self.fail_cycle(e.into()),
        };
        tracing::debug!(cycle, %point, "location update");

        let now = Timestamp::now();
        self.state.last_location = Some((point, now));
        self.persist(
            "last known location",
            self.storage.set_last_known_location(point, now),
        );

        let radius = self.storage.search_radius().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "unreadable search radius; using default");
            DEFAULT_SEARCH_RADIUS
        });
        self.in_flight = Some(Cycle {
            id: cycle,
            stage: Stage::Discovering,
        });
        vec![Effect::Discover {
            cycle,
            query: build_query(point, radius),
        }]
    }

    fn on_discovery(
        &mut self,
        cycle: u64,
        result: Result<Vec<PlaceRecord>, DiscoveryError>,
    ) -> Vec<Effect> {
        if !self.is_current(cycle, Stage::Discovering) {
            tracing::debug!(cycle, "ignoring stale discovery result");
            return Vec::new();
        }

        let mut places = match result {
            Ok(places) => places,
            Err(e) => return self.fail_cycle(e.into()),
        };
        let Some(index) = self.selection.select(&places) else {
            return self.fail_cycle(CycleFailure::EmptyResultSet);
        };
        let place = places.swap_remove(index);

        if let Err(e) = self.storage.set_last_place(&place) {
            return self.fail_cycle(CycleFailure::PersistFailure(e.to_string()));
        }
        tracing::info!(
            cycle,
            candidates = places.len() + 1,
            name = place.name(),
            kind = place.poi_type(),
            "found a place"
        );

        let mut effects = Vec::new();
        self.end_cycle(&mut effects);
        self.set_suspended(false);
        self.set_phase(SearchPhase::Found);
        effects.extend([
            Effect::ShowPlaceFound(place),
            Effect::ShowSearching(false),
            Effect::ScheduleWake {
                delay: self.settings.long_interval,
                action: WakeAction::ResumeSearch,
            },
        ]);
        effects
    }

    fn on_wake(&mut self, action: WakeAction) -> Vec<Effect> {
        if !self.state.phase.is_running() {
            tracing::debug!(?action, "wake ignored: stopped");
            return Vec::new();
        }
        if let Some(cycle) = self.in_flight {
            tracing::debug!(?action, cycle = cycle.id, "wake ignored: cycle in flight");
            return Vec::new();
        }

        let mut effects = Vec::new();
        match (self.state.phase, action) {
            (SearchPhase::Found, _) if self.state.suspended => {
                tracing::debug!("wake ignored: searching suspended");
            }
            (SearchPhase::Found, WakeAction::Recheck) => {
                effects.push(Effect::ScheduleWake {
                    delay: self.settings.long_interval,
                    action: WakeAction::ResumeSearch,
                });
            }
            (SearchPhase::Found, WakeAction::ResumeSearch) => {
                self.set_phase(SearchPhase::Searching);
                effects.push(Effect::ShowSearching(true));
                self.begin_cycle(&mut effects);
            }
            _ => self.begin_cycle(&mut effects),
        }
        effects
    }

    fn on_search_clicked(&mut self) -> Vec<Effect> {
        if !self.state.phase.is_running() {
            tracing::debug!("search click ignored: stopped");
            return Vec::new();
        }
        tracing::info!("search requested");

        let mut effects = Vec::new();
        self.end_cycle(&mut effects);
        self.set_suspended(false);
        if self.state.phase != SearchPhase::Starting {
            self.set_phase(SearchPhase::Searching);
        }
        effects.push(Effect::ShowSearching(true));
        self.begin_cycle(&mut effects);
        effects
    }

    fn on_place_clicked(&mut self) -> Vec<Effect> {
        let mut effects = vec![Effect::DismissPlace];
        if !self.state.phase.is_running() {
            return effects;
        }

        match self.settings.place_click {
            PlaceClickMode::KeepCycling
                if self.state.phase == SearchPhase::Found && self.in_flight.is_none() =>
            {
                effects.push(Effect::ScheduleWake {
                    delay: self.settings.long_interval,
                    action: WakeAction::ResumeSearch,
                });
            }
            PlaceClickMode::KeepCycling => {
                tracing::debug!(phase = %self.state.phase, "still searching; retry unchanged");
            }
            PlaceClickMode::Suspend if self.state.phase == SearchPhase::Found => {
                tracing::info!("searching suspended until the search notification is clicked");
                self.set_suspended(true);
                effects.extend([Effect::CancelWake, Effect::ShowSearching(false)]);
            }
            PlaceClickMode::Suspend => {
                tracing::debug!(phase = %self.state.phase, "nothing to suspend");
            }
        }
        effects
    }

    fn on_lease_expired(&mut self, cycle: u64) -> Vec<Effect> {
        if self.in_flight() != Some(cycle) {
            return Vec::new();
        }
        self.fail_cycle(CycleFailure::LeaseExpired)
    }

    /// End the in-flight cycle without a place and retry on the short interval.
    fn fail_cycle(&mut self, failure: CycleFailure) -> Vec<Effect> {
        tracing::warn!(%failure, "discovery cycle failed; retrying");

        let mut effects = Vec::new();
        self.end_cycle(&mut effects);
        if self.state.phase == SearchPhase::Starting {
            self.set_phase(SearchPhase::Searching);
        }
        effects.push(Effect::ScheduleWake {
            delay: self.settings.short_interval,
            action: WakeAction::Recheck,
        });
        effects
    }

    fn begin_cycle(&mut self, effects: &mut Vec<Effect>) {
        let id = self.next_cycle;
        self.next_cycle += 1;
        self.in_flight = Some(Cycle {
            id,
            stage: Stage::Locating,
        });
        tracing::debug!(cycle = id, "cycle started");
        effects.extend([
            Effect::CancelWake,
            Effect::AcquireLease { cycle: id },
            Effect::RequestLocation { cycle: id },
        ]);
    }

    fn end_cycle(&mut self, effects: &mut Vec<Effect>) {
        if self.in_flight.take().is_some() {
            effects.push(Effect::ReleaseLease);
        }
    }

    fn is_current(&self, cycle: u64, stage: Stage) -> bool {
        self.state.phase.is_running()
            && self
                .in_flight
                .is_some_and(|c| c.id == cycle && c.stage == stage)
    }

    fn set_phase(&mut self, phase: SearchPhase) {
        self.state.phase = phase;
        self.persist("search phase", self.storage.set_search_phase(phase));
    }

    fn set_suspended(&mut self, suspended: bool) {
        self.state.suspended = suspended;
        self.persist("suspended flag", self.storage.set_suspended(suspended));
    }

    fn persist(&self, what: &str, result: storage::Result<()>) {
        if let Err(e) = result {
            tracing::warn!(error = %e, what, "failed to persist state");
        }
    }
}
