//! Provider fallback and stale-fetch discard.
//!
//! Every `get_route` call is tagged with a generation id from a monotonic
//! counter. A result whose generation is older than the latest issued is
//! discarded on arrival (last-caller-wins): the underlying fetch cannot
//! always be aborted, so a slow stale response must not overwrite a route
//! computed for a more recent destination.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use geo::Point;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::provider::RouteProvider;
use super::{PROVIDER_TIMEOUT, Result, Route, RoutingError};
use crate::geometry;

pub struct RouteService {
    primary: Arc<dyn RouteProvider>,
    secondary: Arc<dyn RouteProvider>,
    timeout: Duration,
    generation: AtomicU64,
    route_tx: watch::Sender<Option<Arc<Route>>>,
}

impl RouteService {
    pub fn new(primary: Arc<dyn RouteProvider>, secondary: Arc<dyn RouteProvider>) -> Self {
        Self::with_timeout(primary, secondary, PROVIDER_TIMEOUT)
    }

    pub fn with_timeout(
        primary: Arc<dyn RouteProvider>,
        secondary: Arc<dyn RouteProvider>,
        timeout: Duration,
    ) -> Self {
        let (route_tx, _) = watch::channel(None);
        Self {
            primary,
            secondary,
            timeout,
            generation: AtomicU64::new(0),
            route_tx,
        }
    }

    /// The route held for the most recent completed fetch, if any.
    pub fn current_route(&self) -> Option<Arc<Route>> {
        self.route_tx.borrow().clone()
    }

    /// Watch the current route; the UI reads this on each render tick.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Route>>> {
        self.route_tx.subscribe()
    }

    /// Drop the current route and invalidate any fetch still in flight.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.route_tx.send_replace(None);
    }

    /// Fetch a driving path, primary first, fallback second, soft-failing
    /// to `None`. Unusable endpoints short-circuit without touching the
    /// network.
    pub async fn get_route(&self, origin: Point, destination: Point) -> Option<Arc<Route>> {
        if !geometry::is_usable(origin) || !geometry::is_usable(destination) {
            return None;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let route = self.fetch_with_fallback(origin, destination).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "discarding stale route fetch");
            return None;
        }

        let route = route.map(Arc::new);
        self.route_tx.send_replace(route.clone());
        route
    }

    async fn fetch_with_fallback(&self, origin: Point, destination: Point) -> Option<Route> {
        match self.attempt(&*self.primary, origin, destination).await {
            Ok(route) => return Some(route),
            Err(error) => warn!(
                provider = self.primary.name(),
                %error,
                "primary route provider failed, trying fallback"
            ),
        }

        match self.attempt(&*self.secondary, origin, destination).await {
            Ok(route) => Some(route),
            Err(error) => {
                warn!(provider = self.secondary.name(), %error, "both route providers failed");
                None
            }
        }
    }

    async fn attempt(
        &self,
        provider: &dyn RouteProvider,
        origin: Point,
        destination: Point,
    ) -> Result<Route> {
        let route = tokio::time::timeout(self.timeout, provider.fetch_route(origin, destination))
            .await
            .map_err(|_| RoutingError::Timeout)??;

        if !route.is_drivable() {
            return Err(RoutingError::NoRoute);
        }
        Ok(route)
    }
}
