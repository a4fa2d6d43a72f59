//! Pluggable routing provider trait.
//!
//! External services implement this to provide driving paths. Kept
//! object-safe so the service can swap providers at runtime.

use std::future::Future;
use std::pin::Pin;

use geo::Point;

use super::{Result, Route};

pub trait RouteProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch a driving path from `origin` to `destination`, lon/lat order.
    fn fetch_route<'a>(
        &'a self,
        origin: Point,
        destination: Point,
    ) -> Pin<Box<dyn Future<Output = Result<Route>> + Send + 'a>>;
}
