//! Route acquisition with provider fallback.
//!
//! `RouteService` asks a primary provider for a driving path under a
//! bounded timeout and falls back to a secondary provider under the same
//! contract. Both failing yields `None`: callers render no route rather
//! than a stale or partial one.

use std::time::Duration;

use geo::Point;

use crate::geometry;

pub mod ors;
pub mod osrm;
pub mod provider;
pub mod service;

pub use ors::OrsProvider;
pub use osrm::OsrmProvider;
pub use provider::RouteProvider;
pub use service::RouteService;

/// One provider attempt gets this long before the fallback fires.
/// Shared by both providers.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(8);

/// A driving path between a responder and a requester.
///
/// Immutable once produced; a newer fetch supersedes it, nothing mutates it.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    /// Ordered lon/lat path, at least 2 points when valid.
    pub coordinates: Vec<Point>,
    pub duration_secs: Option<f64>,
    pub distance_m: Option<f64>,
}

impl Route {
    /// At least two points, all usable.
    pub fn is_drivable(&self) -> bool {
        self.coordinates.len() >= 2 && self.coordinates.iter().all(|p| geometry::is_usable(*p))
    }

    pub fn segment_count(&self) -> usize {
        self.coordinates.len().saturating_sub(1)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned status {0}")]
    Status(u16),

    #[error("no drivable route in response")]
    NoRoute,

    #[error("provider timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, RoutingError>;
