//! The search service: a single task that owns the state machine.
//!
//! Host actions, wake-ups, and async completions all arrive on one queue and
//! are applied one at a time, so transitions never interleave. Location and
//! discovery run as spawned tasks that post their result back to the queue.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::discovery::{Discover, SelectionPolicy};
use crate::lease::{Lease, LeaseHost};
use crate::location::LocationProvider;
use crate::machine::{Effect, Event, MachineSettings, SearchMachine};
use crate::model::Action;
use crate::presenter::Presenter;
use crate::scheduler::WakeScheduler;
use crate::storage::Storage;

/// The pluggable pieces a service talks to.
pub struct Collaborators {
    pub location: Arc<dyn LocationProvider>,
    pub discovery: Arc<dyn Discover>,
    pub presenter: Arc<dyn Presenter>,
    pub selection: Box<dyn SelectionPolicy>,
}

/// Sends actions to a running [`Service`].
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    events: mpsc::UnboundedSender<Event>,
}

impl ServiceHandle {
    /// Queue a host action. Returns `false` if the service has exited.
    pub fn send(&self, action: Action) -> bool {
        self.events.send(Event::Action(action)).is_ok()
    }

    /// A handle with no service behind it, and the queue it feeds.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events }, rx)
    }

    /// Ask the event loop to exit. Persisted state is left for the next run.
    pub fn shutdown(&self) {
        let _ = self.events.send(Event::Shutdown);
    }
}

pub struct Service {
    machine: SearchMachine,
    scheduler: WakeScheduler,
    leases: LeaseHost,
    lease: Option<Lease>,
    work: Option<JoinHandle<()>>,
    location: Arc<dyn LocationProvider>,
    discovery: Arc<dyn Discover>,
    presenter: Arc<dyn Presenter>,
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Service {
    pub fn new(storage: Storage, config: &Config, parts: Collaborators) -> (Self, ServiceHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let machine = SearchMachine::new(
            storage.clone(),
            MachineSettings::from(config),
            parts.selection,
        );
        let service = Self {
            machine,
            scheduler: WakeScheduler::new(storage, tx.clone(), config.exact_wakeups),
            leases: LeaseHost::new(config.lease_ceiling()),
            lease: None,
            work: None,
            location: parts.location,
            discovery: parts.discovery,
            presenter: parts.presenter,
            tx: tx.clone(),
            rx,
        };
        (service, ServiceHandle { events: tx })
    }

    /// Resume persisted state, then process events until shutdown.
    pub async fn run(mut self) {
        let wake_pending = self.scheduler.rehydrate().is_some();
        let effects = self.machine.rehydrate(wake_pending);
        self.apply(effects);

        while let Some(event) = self.rx.recv().await {
            match event {
                Event::Shutdown => break,
                Event::Wake { id, .. } if !self.scheduler.accept_fire(id) => continue,
                _ => {}
            }
            tracing::trace!(?event, phase = %self.machine.state().phase, "event");
            let effects = self.machine.handle(event);
            self.apply(effects);
        }

        self.release();
        tracing::info!(
            phase = %self.machine.state().phase,
            next_wake = ?self.scheduler.pending().map(|entry| entry.fire_at),
            "service exited"
        );
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::AcquireLease { cycle } => {
                    let tx = self.tx.clone();
                    self.lease = Some(self.leases.acquire(cycle, move || {
                        let _ = tx.send(Event::LeaseExpired { cycle });
                    }));
                }
                Effect::ReleaseLease => self.release(),
                Effect::RequestLocation { cycle } => {
                    let provider = Arc::clone(&self.location);
                    let tx = self.tx.clone();
                    self.spawn_work(async move {
                        let result = provider.current().await;
                        let _ = tx.send(Event::LocationResolved { cycle, result });
                    });
                }
                Effect::Discover { cycle, query } => {
                    let discovery = Arc::clone(&self.discovery);
                    let tx = self.tx.clone();
                    self.spawn_work(async move {
                        let result = discovery.discover(&query).await;
                        let _ = tx.send(Event::DiscoveryFinished { cycle, result });
                    });
                }
                Effect::ScheduleWake { delay, action } => {
                    self.scheduler.schedule_next(delay, action);
                }
                Effect::CancelWake => self.scheduler.cancel_pending(),
                Effect::ShowSearching(searching) => self.presenter.show_searching_status(searching),
                Effect::ShowPlaceFound(place) => self.presenter.show_place_found(&place),
                Effect::DismissPlace => self.presenter.dismiss_place_found(),
                Effect::ShowStopped => self.presenter.show_stopped(),
            }
        }
    }

    fn spawn_work(&mut self, work: impl Future<Output = ()> + Send + 'static) {
        if let Some(previous) = self.work.replace(tokio::spawn(work)) {
            previous.abort();
        }
    }

    /// Drop the lease and abandon whatever the cycle was waiting on.
    fn release(&mut self) {
        if let Some(work) = self.work.take() {
            work.abort();
        }
        self.lease = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::discovery::{DiscoveryError, UniformRandom};
    use crate::location::{FixedLocation, NoLocation};
    use crate::model::{GeoPoint, PlaceRecord, SearchPhase, WakeAction};
    use crate::query::OverpassQuery;
    use crate::storage::test_support::test_storage;

    struct FakeDiscovery {
        places: Vec<PlaceRecord>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FakeDiscovery {
        fn answering(places: Vec<PlaceRecord>) -> Arc<Self> {
            Self::slow(places, Duration::from_secs(1))
        }

        fn slow(places: Vec<PlaceRecord>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                places,
                delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Discover for FakeDiscovery {
        async fn discover(
            &self,
            _query: &OverpassQuery,
        ) -> Result<Vec<PlaceRecord>, DiscoveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.places.clone())
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Shown {
        Searching(bool),
        Place(u64),
        Dismissed,
        Stopped,
    }

    #[derive(Default)]
    struct RecordingPresenter {
        shown: Mutex<Vec<Shown>>,
    }

    impl RecordingPresenter {
        fn shown(&self) -> Vec<Shown> {
            self.shown.lock().unwrap().clone()
        }

        fn record(&self, shown: Shown) {
            self.shown.lock().unwrap().push(shown);
        }
    }

    impl Presenter for RecordingPresenter {
        fn show_searching_status(&self, searching: bool) {
            self.record(Shown::Searching(searching));
        }

        fn show_place_found(&self, place: &PlaceRecord) {
            self.record(Shown::Place(place.id));
        }

        fn dismiss_place_found(&self) {
            self.record(Shown::Dismissed);
        }

        fn show_stopped(&self) {
            self.record(Shown::Stopped);
        }
    }

    struct Harness {
        _dir: TempDir,
        storage: Storage,
        handle: ServiceHandle,
        presenter: Arc<RecordingPresenter>,
        task: JoinHandle<()>,
    }

    fn cafe() -> PlaceRecord {
        PlaceRecord {
            id: 9,
            point: GeoPoint::new(51.5, -0.12),
            tags: BTreeMap::from([("amenity".to_string(), "cafe".to_string())]),
        }
    }

    fn spawn_with(
        location: Arc<dyn LocationProvider>,
        discovery: Arc<dyn Discover>,
        prepare: impl FnOnce(&Storage),
    ) -> Harness {
        let (dir, storage) = test_storage();
        prepare(&storage);
        let presenter = Arc::new(RecordingPresenter::default());
        let parts = Collaborators {
            location,
            discovery,
            presenter: presenter.clone(),
            selection: Box::new(UniformRandom::seeded(3)),
        };
        let (service, handle) = Service::new(storage.clone(), &Config::default(), parts);
        Harness {
            _dir: dir,
            storage,
            handle,
            presenter,
            task: tokio::spawn(service.run()),
        }
    }

    fn spawn(discovery: Arc<dyn Discover>) -> Harness {
        let here = FixedLocation(GeoPoint::new(51.5, -0.12));
        spawn_with(Arc::new(here), discovery, |_| {})
    }

    async fn settle(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_finds_a_place_and_waits() {
        let discovery = FakeDiscovery::answering(vec![cafe()]);
        let h = spawn(discovery.clone());

        assert!(h.handle.send(Action::StartService));
        settle(5).await;

        assert_eq!(
            h.presenter.shown(),
            vec![
                Shown::Searching(true),
                Shown::Place(9),
                Shown::Searching(false),
            ]
        );
        assert_eq!(h.storage.search_phase().unwrap(), SearchPhase::Found);
        assert_eq!(h.storage.last_place().unwrap(), Some(cafe()));
        let wake = h.storage.pending_wake().unwrap().unwrap();
        assert_eq!(wake.action, WakeAction::ResumeSearch);
        assert_eq!(discovery.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn long_wake_searches_again() {
        let discovery = FakeDiscovery::answering(vec![cafe()]);
        let h = spawn(discovery.clone());

        h.handle.send(Action::StartService);
        settle(3605).await;

        assert_eq!(discovery.calls(), 2);
        assert_eq!(h.storage.search_phase().unwrap(), SearchPhase::Found);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_results_retry_on_the_short_interval() {
        let discovery = FakeDiscovery::answering(Vec::new());
        let h = spawn(discovery.clone());

        h.handle.send(Action::StartService);
        settle(5).await;
        assert_eq!(discovery.calls(), 1);
        assert_eq!(h.storage.search_phase().unwrap(), SearchPhase::Searching);

        settle(300).await;
        assert_eq!(discovery.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn wake_superseded_by_a_search_click_is_dropped() {
        let discovery = FakeDiscovery::answering(Vec::new());
        let h = spawn(discovery.clone());

        h.handle.send(Action::StartService);
        settle(5).await;
        let superseded = h.storage.pending_wake().unwrap().unwrap();

        h.handle.send(Action::SearchNotificationClicked);
        settle(5).await;
        assert_eq!(discovery.calls(), 2);
        let current = h.storage.pending_wake().unwrap().unwrap();
        assert_ne!(current.id, superseded.id);

        // The old timer's fire was already queued when the click went through.
        h.handle
            .events
            .send(Event::Wake {
                id: superseded.id,
                action: superseded.action,
            })
            .unwrap();
        settle(5).await;

        assert_eq!(discovery.calls(), 2);
        assert_eq!(h.storage.pending_wake().unwrap().map(|w| w.id), Some(current.id));
        assert_eq!(h.storage.search_phase().unwrap(), SearchPhase::Searching);
    }

    #[tokio::test(start_paused = true)]
    async fn denied_location_never_queries() {
        let discovery = FakeDiscovery::answering(vec![cafe()]);
        let h = spawn_with(Arc::new(NoLocation), discovery.clone(), |_| {});

        h.handle.send(Action::StartService);
        settle(700).await;

        assert_eq!(discovery.calls(), 0);
        assert_eq!(h.storage.search_phase().unwrap(), SearchPhase::Searching);
        assert_eq!(
            h.storage.pending_wake().unwrap().map(|w| w.action),
            Some(WakeAction::Recheck)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_mid_discovery_shows_nothing() {
        let discovery = FakeDiscovery::slow(vec![cafe()], Duration::from_secs(60));
        let h = spawn(discovery.clone());

        h.handle.send(Action::StartService);
        settle(1).await;
        h.handle.send(Action::StopService);
        settle(120).await;

        assert!(!h.presenter.shown().contains(&Shown::Place(9)));
        assert_eq!(h.presenter.shown().last(), Some(&Shown::Stopped));
        assert!(h.storage.last_place().unwrap().is_none());
        assert!(h.storage.pending_wake().unwrap().is_none());
        assert!(!h.storage.is_running().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn lease_ceiling_abandons_a_hung_cycle() {
        let discovery = FakeDiscovery::slow(vec![cafe()], Duration::from_secs(10_000));
        let h = spawn(discovery.clone());

        h.handle.send(Action::StartService);
        settle(601).await;
        assert_eq!(
            h.storage.pending_wake().unwrap().map(|w| w.action),
            Some(WakeAction::Recheck)
        );

        settle(300).await;
        assert_eq!(discovery.calls(), 2);
        assert!(h.storage.last_place().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn resumes_a_running_session_on_startup() {
        let discovery = FakeDiscovery::answering(vec![cafe()]);
        let h = spawn_with(
            Arc::new(FixedLocation(GeoPoint::new(51.5, -0.12))),
            discovery.clone(),
            |storage| {
                storage.set_running(true).unwrap();
                storage.set_search_phase(SearchPhase::Searching).unwrap();
            },
        );

        settle(5).await;

        assert_eq!(discovery.calls(), 1);
        assert_eq!(h.storage.search_phase().unwrap(), SearchPhase::Found);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_keeps_state_for_the_next_run() {
        let discovery = FakeDiscovery::answering(vec![cafe()]);
        let h = spawn(discovery);

        h.handle.send(Action::StartService);
        settle(5).await;
        h.handle.shutdown();
        h.task.await.unwrap();

        assert!(h.storage.is_running().unwrap());
        assert!(h.storage.pending_wake().unwrap().is_some());
        assert!(!h.handle.send(Action::StopService));
    }
}
