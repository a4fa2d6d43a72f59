//! Pluggable networking traits.
//!
//! External crates implement these to provide data fetching capabilities.
//! The search-radius expansion policy lives behind this seam: callers only
//! consume the resulting list.

use std::future::Future;
use std::pin::Pin;

use crate::models::types::{Hospital, Result};

/// Fetch candidate hospitals around a point
pub trait DirectoryFetcher: Send + Sync {
    fn discover_nearby<'a>(
        &'a self,
        lat: f64,
        lng: f64,
        radius_m: f64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Hospital>>> + Send + 'a>>;
}
