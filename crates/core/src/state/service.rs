//! The reconciliation service.
//!
//! A single-writer actor owns the `DispatchStore`: local optimistic
//! transitions, subscription payloads, and polled records all flow
//! through one mpsc channel into the reducer, and read-only snapshots
//! flow out through a watch channel. Nothing else ever writes trip state.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use super::feeds::{RequestDirectory, ResponderLookup, UpdateFeed, UpdateSubscription};
use super::store::{Applied, DispatchStore};
use super::types::{BedBooking, RequestKind, RequestUpdate, Responder, Trip};
use crate::geometry;
use crate::routing::RouteService;
use crate::tracking::{MarkerAnimator, MarkerPosition};
use resq_directory::{RequestId, ResponderId};

/// Polling cadence once the fallback is active.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Subscription silence tolerated before the fallback kicks in.
pub const POLL_FALLBACK_AFTER: Duration = Duration::from_secs(30);

const COMMAND_BUFFER: usize = 32;

/// Read-only view handed to the UI on every render tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DispatchSnapshot {
    pub trip: Option<Trip>,
    pub booking: Option<BedBooking>,
}

pub struct DispatchConfig {
    pub user_id: String,
    pub feed: Arc<dyn UpdateFeed>,
    pub requests: Arc<dyn RequestDirectory>,
    pub responders: Arc<dyn ResponderLookup>,
    pub animator: Arc<MarkerAnimator>,
    pub routes: Arc<RouteService>,
}

enum Command {
    BeginTrip(Trip),
    BeginBooking(BedBooking),
    Update(RequestUpdate),
    Hydrated(RequestId, Responder),
    Shutdown,
}

pub struct DispatchService {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<DispatchSnapshot>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DispatchService {
    /// Spawn the reconciliation worker. It runs one cold-start pass, then
    /// listens for updates until `shutdown`.
    pub fn start(config: DispatchConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(DispatchSnapshot::default());

        let worker = Worker {
            config,
            store: DispatchStore::new(),
            snapshots: snapshot_tx,
            loopback: command_tx.clone(),
        };
        let handle = tokio::spawn(worker.run(command_rx));

        Self {
            commands: command_tx,
            snapshots: snapshot_rx,
            worker: Mutex::new(Some(handle)),
        }
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DispatchSnapshot> {
        self.snapshots.clone()
    }

    /// Optimistic local creation of a trip, ahead of server confirmation.
    pub async fn begin_trip(&self, trip: Trip) {
        let _ = self.commands.send(Command::BeginTrip(trip)).await;
    }

    pub async fn begin_booking(&self, booking: BedBooking) {
        let _ = self.commands.send(Command::BeginBooking(booking)).await;
    }

    /// Feed a locally produced transition through the same reducer the
    /// remote sources use.
    pub async fn apply_local(&self, update: RequestUpdate) {
        let _ = self.commands.send(Command::Update(update)).await;
    }

    /// Tear down: unsubscribe from the remote channel, stop polling, and
    /// wait for the worker to exit.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for DispatchService {
    fn drop(&mut self) {
        // Dropping without `shutdown` still must not leak the worker; the
        // aborted task drops its subscription, whose guard unsubscribes.
        if let Some(handle) = self.worker.lock().unwrap().take() {
            handle.abort();
        }
    }
}

struct Worker {
    config: DispatchConfig,
    store: DispatchStore,
    snapshots: watch::Sender<DispatchSnapshot>,
    /// Sender for work the worker schedules for itself (hydration results).
    loopback: mpsc::Sender<Command>,
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        self.cold_start().await;

        let mut subscription = match self.config.feed.subscribe(&self.config.user_id).await {
            Ok(subscription) => Some(subscription),
            Err(error) => {
                warn!(%error, "update subscription unavailable, polling instead");
                None
            }
        };

        let mut next_poll = Instant::now()
            + if subscription.is_some() {
                POLL_FALLBACK_AFTER
            } else {
                POLL_INTERVAL
            };

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(command) => self.handle_command(command),
                },
                update = next_update(&mut subscription) => match update {
                    Some(update) => {
                        next_poll = Instant::now() + POLL_FALLBACK_AFTER;
                        self.apply_update(&update);
                    }
                    None => {
                        warn!("update subscription closed, falling back to polling");
                        if let Some(subscription) = subscription.take() {
                            subscription.guard.release();
                        }
                        next_poll = Instant::now();
                    }
                },
                _ = time::sleep_until(next_poll) => {
                    self.poll_once().await;
                    next_poll = Instant::now() + POLL_INTERVAL;
                }
            }
        }

        if let Some(subscription) = subscription.take() {
            subscription.guard.release();
        }
        debug!("dispatch service stopped");
    }

    /// One reconciliation pass before listening: adopt the most recent
    /// active request of each kind, so a resumed session never shows an
    /// empty state while a trip exists server-side.
    async fn cold_start(&mut self) {
        let updates = match self.config.requests.list_active_requests(&self.config.user_id).await {
            Ok(updates) => updates,
            Err(error) => {
                warn!(%error, "cold-start reconciliation failed");
                return;
            }
        };

        let now = Utc::now();

        let newest_trip = updates
            .iter()
            .filter(|update| update.kind() == Some(RequestKind::Ambulance))
            .max_by_key(|update| update.requested_at.unwrap_or(i64::MIN));
        if let Some(record) = newest_trip {
            if self.store.adopt_trip(record, now) {
                info!(request_id = %record.request_id, "resumed active trip");
            }
        }

        let newest_booking = updates
            .iter()
            .filter(|update| update.kind() == Some(RequestKind::Bed))
            .max_by_key(|update| update.requested_at.unwrap_or(i64::MIN));
        if let Some(record) = newest_booking {
            if self.store.adopt_booking(record, now) {
                info!(request_id = %record.request_id, "resumed active bed booking");
            }
        }

        if self.store.trip().is_some() {
            self.after_trip_merge(None);
        }
        self.publish();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::BeginTrip(trip) => {
                self.store.begin_trip(trip);
                self.after_trip_merge(None);
                self.publish();
            }
            Command::BeginBooking(booking) => {
                self.store.begin_booking(booking);
                self.publish();
            }
            Command::Update(update) => self.apply_update(&update),
            Command::Hydrated(request_id, responder) => {
                self.store.hydrate_responder(&request_id, &responder);
                self.publish();
            }
            Command::Shutdown => {} // handled in the select loop
        }
    }

    fn apply_update(&mut self, update: &RequestUpdate) {
        let previous = self
            .store
            .trip()
            .and_then(|trip| trip.responder.as_ref())
            .map(|responder| (responder.id.clone(), responder.location));

        match self.store.apply(update) {
            Applied::Terminal(kind) => {
                if kind == RequestKind::Ambulance {
                    self.config.animator.stop();
                    self.config.routes.clear();
                }
                self.publish();
            }
            Applied::Merged(kind) => {
                if kind == RequestKind::Ambulance {
                    self.after_trip_merge(previous);
                }
                self.publish();
            }
            Applied::Ignored => {}
        }
    }

    /// React to responder changes on the trip slot: hydrate a newly
    /// assigned unit and push fresh live fixes into the marker animator.
    fn after_trip_merge(&self, previous: Option<(ResponderId, Option<geo::Point>)>) {
        let Some(trip) = self.store.trip() else { return };
        let Some(responder) = trip.responder.as_ref() else { return };

        let unit_changed = previous.as_ref().map(|(id, _)| id) != Some(&responder.id);
        if unit_changed {
            self.spawn_hydration(trip.request_id.clone(), responder.id.clone());
        }

        if let Some(location) = responder.location {
            let previous_location = previous.and_then(|(_, location)| location);
            if unit_changed || previous_location != Some(location) {
                let heading = responder
                    .heading
                    .or_else(|| previous_location.map(|from| geometry::bearing_deg(from, location)))
                    .unwrap_or(0.0);
                self.config
                    .animator
                    .report_live_position(MarkerPosition { coordinate: location, heading });
            }
        }
    }

    fn spawn_hydration(&self, request_id: RequestId, responder_id: ResponderId) {
        let responders = self.config.responders.clone();
        let loopback = self.loopback.clone();

        tokio::spawn(async move {
            // Failures are swallowed; retried on the next responder change.
            if let Some(detail) = responders.get_responder(&responder_id).await {
                let _ = loopback.send(Command::Hydrated(request_id, detail)).await;
            }
        });
    }

    async fn poll_once(&mut self) {
        match self.config.requests.list_active_requests(&self.config.user_id).await {
            Ok(updates) => {
                debug!(count = updates.len(), "applying polled records");
                for update in updates {
                    self.apply_update(&update);
                }
            }
            Err(error) => warn!(%error, "polling fetch failed"),
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(DispatchSnapshot {
            trip: self.store.trip().cloned(),
            booking: self.store.booking().cloned(),
        });
    }
}

/// Next payload from the subscription, or pending forever without one so
/// the select loop leans on its other arms.
async fn next_update(subscription: &mut Option<UpdateSubscription>) -> Option<RequestUpdate> {
    match subscription {
        Some(subscription) => subscription.updates.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Route, RouteProvider, RoutingError};
    use crate::state::feeds::{FeedError, SubscriptionGuard};
    use crate::state::types::TripStatus;
    use crate::tracking::AnimationState;
    use chrono::DateTime;
    use geo::Point;
    use resq_directory::HospitalId;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};

    // ---- collaborator fakes ----

    struct FakeFeed {
        sender: Mutex<Option<mpsc::UnboundedSender<RequestUpdate>>>,
        released: Arc<AtomicBool>,
        available: bool,
    }

    impl FakeFeed {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sender: Mutex::new(None),
                released: Arc::new(AtomicBool::new(false)),
                available: true,
            })
        }

        fn unavailable() -> Arc<Self> {
            Arc::new(Self {
                sender: Mutex::new(None),
                released: Arc::new(AtomicBool::new(false)),
                available: false,
            })
        }

        fn push(&self, update: RequestUpdate) {
            let sender = self.sender.lock().unwrap();
            sender
                .as_ref()
                .expect("subscription not yet established")
                .send(update)
                .expect("worker dropped the stream");
        }
    }

    impl UpdateFeed for FakeFeed {
        fn subscribe<'a>(
            &'a self,
            _user_id: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<UpdateSubscription, FeedError>> + Send + 'a>>
        {
            Box::pin(async move {
                if !self.available {
                    return Err(FeedError("channel offline".into()));
                }

                let (tx, mut rx) = mpsc::unbounded_channel();
                *self.sender.lock().unwrap() = Some(tx);

                let released = self.released.clone();
                Ok(UpdateSubscription {
                    updates: Box::pin(futures_util::stream::poll_fn(move |cx| rx.poll_recv(cx))),
                    guard: SubscriptionGuard::new(move || released.store(true, Ordering::SeqCst)),
                })
            })
        }
    }

    struct FakeRequests {
        records: Mutex<Vec<RequestUpdate>>,
    }

    impl FakeRequests {
        fn empty() -> Arc<Self> {
            Arc::new(Self { records: Mutex::new(Vec::new()) })
        }

        fn with(records: Vec<RequestUpdate>) -> Arc<Self> {
            Arc::new(Self { records: Mutex::new(records) })
        }

        fn set(&self, records: Vec<RequestUpdate>) {
            *self.records.lock().unwrap() = records;
        }
    }

    impl RequestDirectory for FakeRequests {
        fn list_active_requests<'a>(
            &'a self,
            _user_id: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<RequestUpdate>, FeedError>> + Send + 'a>>
        {
            Box::pin(async move { Ok(self.records.lock().unwrap().clone()) })
        }
    }

    struct FakeResponders {
        detail: Option<Responder>,
    }

    impl FakeResponders {
        fn none() -> Arc<Self> {
            Arc::new(Self { detail: None })
        }

        fn with(detail: Responder) -> Arc<Self> {
            Arc::new(Self { detail: Some(detail) })
        }
    }

    impl ResponderLookup for FakeResponders {
        fn get_responder<'a>(
            &'a self,
            _id: &'a ResponderId,
        ) -> Pin<Box<dyn Future<Output = Option<Responder>> + Send + 'a>> {
            Box::pin(async move { self.detail.clone() })
        }
    }

    struct NullProvider;

    impl RouteProvider for NullProvider {
        fn name(&self) -> &'static str {
            "null"
        }

        fn fetch_route<'a>(
            &'a self,
            _origin: Point,
            _destination: Point,
        ) -> Pin<Box<dyn Future<Output = crate::routing::Result<Route>> + Send + 'a>> {
            Box::pin(async { Err(RoutingError::NoRoute) })
        }
    }

    // ---- helpers ----

    fn routes() -> Arc<RouteService> {
        Arc::new(RouteService::new(Arc::new(NullProvider), Arc::new(NullProvider)))
    }

    fn config(
        feed: Arc<FakeFeed>,
        requests: Arc<FakeRequests>,
        responders: Arc<FakeResponders>,
        animator: Arc<MarkerAnimator>,
    ) -> DispatchConfig {
        DispatchConfig {
            user_id: "user_1".into(),
            feed,
            requests,
            responders,
            animator,
            routes: routes(),
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn t0() -> chrono::DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn trip(request_id: &str) -> Trip {
        Trip::new(RequestId::new(request_id), HospitalId::new("h_1"), t0())
    }

    async fn wait_for(
        rx: &mut watch::Receiver<DispatchSnapshot>,
        predicate: impl FnMut(&DispatchSnapshot) -> bool,
    ) -> DispatchSnapshot {
        time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
            .await
            .expect("snapshot condition not reached in time")
            .expect("snapshot channel closed")
            .clone()
    }

    /// Let the worker establish its subscription before pushing into it.
    async fn settle() {
        time::sleep(Duration::from_millis(10)).await;
    }

    // ---- tests ----

    #[tokio::test(start_paused = true)]
    async fn test_remote_update_merges_into_snapshot() {
        init_tracing();
        let feed = FakeFeed::new();
        let animator = Arc::new(MarkerAnimator::new());
        let service = DispatchService::start(config(
            feed.clone(),
            FakeRequests::empty(),
            FakeResponders::none(),
            animator,
        ));
        let mut rx = service.subscribe();

        service.begin_trip(trip("req_1")).await;
        wait_for(&mut rx, |snapshot| snapshot.trip.is_some()).await;
        settle().await;

        let mut update = RequestUpdate::for_request("req_1");
        update.status = Some("en_route".into());
        feed.push(update);

        let snapshot = wait_for(&mut rx, |snapshot| {
            snapshot.trip.as_ref().is_some_and(|t| t.status == TripStatus::EnRoute)
        })
        .await;

        // Fields the update did not mention survive the merge.
        assert_eq!(snapshot.trip.unwrap().hospital_id, HospitalId::new("h_1"));

        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatched_update_leaves_state_alone() {
        let feed = FakeFeed::new();
        let service = DispatchService::start(config(
            feed.clone(),
            FakeRequests::empty(),
            FakeResponders::none(),
            Arc::new(MarkerAnimator::new()),
        ));
        let mut rx = service.subscribe();

        service.begin_trip(trip("req_1")).await;
        wait_for(&mut rx, |snapshot| snapshot.trip.is_some()).await;
        settle().await;

        let mut stale = RequestUpdate::for_request("req_gone");
        stale.status = Some("cancelled".into());
        feed.push(stale);
        settle().await;

        let snapshot = service.snapshot();
        assert_eq!(snapshot.trip.unwrap().request_id, RequestId::new("req_1"));

        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_update_deletes_trip_and_stops_animation() {
        init_tracing();
        let feed = FakeFeed::new();
        let animator = Arc::new(MarkerAnimator::new());
        let route = Arc::new(Route {
            coordinates: vec![Point::new(0.0, 0.0), Point::new(0.0, 1.0)],
            duration_secs: Some(600.0),
            distance_m: None,
        });
        animator.start(route, Duration::from_secs(600));

        let service = DispatchService::start(config(
            feed.clone(),
            FakeRequests::empty(),
            FakeResponders::none(),
            animator.clone(),
        ));
        let mut rx = service.subscribe();

        service.begin_trip(trip("req_1")).await;
        wait_for(&mut rx, |snapshot| snapshot.trip.is_some()).await;
        settle().await;

        let mut done = RequestUpdate::for_request("req_1");
        done.status = Some("completed".into());
        feed.push(done);

        wait_for(&mut rx, |snapshot| snapshot.trip.is_none()).await;
        assert_eq!(animator.state(), AnimationState::Stopped);

        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_start_adopts_most_recent_per_kind() {
        let mut old_trip = RequestUpdate::for_request("req_old");
        old_trip.kind = Some("ambulance".into());
        old_trip.hospital_id = Some(HospitalId::new("h_1"));
        old_trip.requested_at = Some(1_000);

        let mut new_trip = RequestUpdate::for_request("req_new");
        new_trip.kind = Some("ambulance".into());
        new_trip.hospital_id = Some(HospitalId::new("h_2"));
        new_trip.requested_at = Some(2_000);

        let mut bed = RequestUpdate::for_request("bed_1");
        bed.kind = Some("bed".into());
        bed.hospital_id = Some(HospitalId::new("h_3"));
        bed.requested_at = Some(1_500);

        let service = DispatchService::start(config(
            FakeFeed::new(),
            FakeRequests::with(vec![old_trip, new_trip, bed]),
            FakeResponders::none(),
            Arc::new(MarkerAnimator::new()),
        ));
        let mut rx = service.subscribe();

        let snapshot =
            wait_for(&mut rx, |snapshot| snapshot.trip.is_some() && snapshot.booking.is_some()).await;

        assert_eq!(snapshot.trip.unwrap().request_id, RequestId::new("req_new"));
        assert_eq!(snapshot.booking.unwrap().request_id, RequestId::new("bed_1"));

        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_fallback_after_subscription_silence() {
        let feed = FakeFeed::new();
        let requests = FakeRequests::empty();
        let service = DispatchService::start(config(
            feed.clone(),
            requests.clone(),
            FakeResponders::none(),
            Arc::new(MarkerAnimator::new()),
        ));
        let mut rx = service.subscribe();

        service.begin_trip(trip("req_1")).await;
        wait_for(&mut rx, |snapshot| snapshot.trip.is_some()).await;

        // The subscription stays silent; the authoritative record moves on.
        let mut record = RequestUpdate::for_request("req_1");
        record.status = Some("en_route".into());
        record.eta_seconds = Some(300.0);
        requests.set(vec![record]);

        time::sleep(POLL_FALLBACK_AFTER + Duration::from_secs(1)).await;

        let snapshot = wait_for(&mut rx, |snapshot| {
            snapshot.trip.as_ref().is_some_and(|t| t.status == TripStatus::EnRoute)
        })
        .await;
        assert_eq!(snapshot.trip.unwrap().eta_seconds, Some(300.0));

        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_subscription_polls_from_the_start() {
        let requests = FakeRequests::empty();
        let service = DispatchService::start(config(
            FakeFeed::unavailable(),
            requests.clone(),
            FakeResponders::none(),
            Arc::new(MarkerAnimator::new()),
        ));
        let mut rx = service.subscribe();

        service.begin_trip(trip("req_1")).await;
        wait_for(&mut rx, |snapshot| snapshot.trip.is_some()).await;

        let mut record = RequestUpdate::for_request("req_1");
        record.status = Some("arrived".into());
        requests.set(vec![record]);

        time::sleep(POLL_INTERVAL + Duration::from_secs(1)).await;

        wait_for(&mut rx, |snapshot| {
            snapshot.trip.as_ref().is_some_and(|t| t.status == TripStatus::Arrived)
        })
        .await;

        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_responder_assignment_hydrates_and_reports_live_fix() {
        let feed = FakeFeed::new();
        let animator = Arc::new(MarkerAnimator::new());

        let mut detail = Responder::new(ResponderId::new("unit_7"));
        detail.rating = Some(4.8);
        detail.crew_size = Some(3);

        let service = DispatchService::start(config(
            feed.clone(),
            FakeRequests::empty(),
            FakeResponders::with(detail),
            animator.clone(),
        ));
        let mut rx = service.subscribe();

        service.begin_trip(trip("req_1")).await;
        wait_for(&mut rx, |snapshot| snapshot.trip.is_some()).await;
        settle().await;

        let mut update = RequestUpdate::for_request("req_1");
        update.responder_id = Some(ResponderId::new("unit_7"));
        update.responder_location = Some("40.75,-73.99".into());
        update.responder_heading = Some(45.0);
        feed.push(update);

        let snapshot = wait_for(&mut rx, |snapshot| {
            snapshot
                .trip
                .as_ref()
                .and_then(|t| t.responder.as_ref())
                .is_some_and(|r| r.rating.is_some())
        })
        .await;

        let responder = snapshot.trip.unwrap().responder.unwrap();
        assert_eq!(responder.rating, Some(4.8));
        assert_eq!(responder.crew_size, Some(3));

        // The live fix drove the marker, overriding any simulation.
        let marker = animator.position().expect("live fix published");
        assert_eq!(marker.coordinate, Point::new(-73.99, 40.75));
        assert_eq!(marker.heading, 45.0);

        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_subscription_handle() {
        let feed = FakeFeed::new();
        let service = DispatchService::start(config(
            feed.clone(),
            FakeRequests::empty(),
            FakeResponders::none(),
            Arc::new(MarkerAnimator::new()),
        ));

        settle().await;
        assert!(!feed.released.load(Ordering::SeqCst));

        service.shutdown().await;
        assert!(feed.released.load(Ordering::SeqCst));
    }
}
