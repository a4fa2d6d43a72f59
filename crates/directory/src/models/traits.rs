//! Core traits for directory data.
//!
//! These traits define the public interface for hospital data.
//! Implementations can be in-memory, cache-backed, or remote.

use std::sync::Arc;

use geo::Point;

use crate::identifiers::HospitalId;
use crate::models::types::Hospital;

/// Provider of hospital data with lookup and query methods
pub trait HospitalDirectory: Send + Sync {
    // ---- Lookups ----
    fn get_hospital(&self, id: &HospitalId) -> Option<Arc<Hospital>>;

    // ---- Collections ----
    fn all_hospitals(&self) -> Vec<Arc<Hospital>>;

    // ---- Spatial queries ----

    /// Find hospitals within radius (meters)
    fn hospitals_near(&self, point: Point, radius_m: f64) -> Vec<Arc<Hospital>>;

    /// Find the N nearest hospitals to a point
    fn nearest_hospitals(&self, point: Point, n: usize) -> Vec<Arc<Hospital>>;
}
