//! R-tree nodes for spatial indexing.
//!
//! Wraps hospital records with geometric data for efficient spatial queries.
//!
//! ## Two-Stage Filtering
//!
//! The spatial queries use a two-stage filtering approach:
//! 1. **R-tree filter**: Uses Euclidean distance for fast approximate filtering
//! 2. **Haversine filter**: Applies accurate geodesic distance on filtered results
//!
//! This approach balances performance (fast Euclidean checks in the R-tree) with
//! accuracy (precise Haversine distance for final results), which is especially
//! important for geographic coordinates where Euclidean distance becomes
//! increasingly inaccurate over larger distances.

use std::sync::Arc;

use geo::Point;
use rstar::{PointDistance, RTreeObject, AABB};

use crate::models::types::Hospital;

#[derive(Clone)]
pub struct HospitalNode {
    pub hospital: Arc<Hospital>,
    point: [f64; 2],
}

impl HospitalNode {
    pub fn new(location: Point, hospital: Arc<Hospital>) -> Self {
        Self {
            hospital,
            point: [location.x(), location.y()],
        }
    }
}

impl RTreeObject for HospitalNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for HospitalNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}
