//! In-memory hospital directory backed by a fetched snapshot.
//!
//! This is the core implementation that stores one discovery result in
//! memory with a spatial index for fast queries. A refresh replaces the
//! whole directory; records are never partially mutated in place.

use std::collections::HashMap;
use std::sync::Arc;

use geo::Point;
use rstar::RTree;

use crate::identifiers::HospitalId;
use crate::models::traits::HospitalDirectory;
use crate::models::types::Hospital;
use crate::spatial::index::HospitalNode;

/// In-memory hospital directory with spatial indexing
///
/// This type is cheap to clone since all data is stored in `Arc`s.
#[derive(Clone)]
pub struct StaticHospitalDirectory {
    // Core data
    hospitals: Vec<Arc<Hospital>>,

    // Lookup map
    hospital_map: HashMap<HospitalId, Arc<Hospital>>,

    // Spatial index
    hospital_tree: RTree<HospitalNode>,
}

impl StaticHospitalDirectory {
    /// Create a new empty directory
    pub fn new() -> Self {
        Self {
            hospitals: Vec::new(),
            hospital_map: HashMap::new(),
            hospital_tree: RTree::new(),
        }
    }

    /// Build a directory from one discovery result.
    ///
    /// Hospitals without a usable location are kept for id lookups but left
    /// out of the spatial index.
    pub fn from_data(hospitals: Vec<Hospital>) -> Self {
        let hospitals: Vec<Arc<Hospital>> = hospitals.into_iter().map(Arc::new).collect();

        let hospital_map: HashMap<_, _> = hospitals
            .iter()
            .map(|h| (h.id.clone(), h.clone()))
            .collect();

        let hospital_tree = RTree::bulk_load(
            hospitals
                .iter()
                .filter(|h| h.has_usable_location())
                .map(|h| HospitalNode::new(h.location, h.clone()))
                .collect(),
        );

        Self {
            hospitals,
            hospital_map,
            hospital_tree,
        }
    }

    pub fn len(&self) -> usize {
        self.hospitals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hospitals.is_empty()
    }
}

impl Default for StaticHospitalDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl HospitalDirectory for StaticHospitalDirectory {
    fn get_hospital(&self, id: &HospitalId) -> Option<Arc<Hospital>> {
        self.hospital_map.get(id).cloned()
    }

    fn all_hospitals(&self) -> Vec<Arc<Hospital>> {
        self.hospitals.clone()
    }

    fn hospitals_near(&self, point: Point, radius_m: f64) -> Vec<Arc<Hospital>> {
        use crate::spatial::queries::{haversine_distance, meters_to_degrees_approx};

        // Validate radius is positive
        if radius_m <= 0.0 || !radius_m.is_finite() {
            return Vec::new();
        }

        // Equator-scaled prefilter with a 2x margin for longitude shrink at
        // higher latitudes; the Haversine post-filter trims the excess.
        let radius_deg = meters_to_degrees_approx(radius_m) * 2.0;
        self.hospital_tree
            .locate_within_distance([point.x(), point.y()], radius_deg * radius_deg)
            .filter(|node| haversine_distance(point, node.hospital.location) <= radius_m)
            .map(|node| node.hospital.clone())
            .collect()
    }

    fn nearest_hospitals(&self, point: Point, n: usize) -> Vec<Arc<Hospital>> {
        self.hospital_tree
            .nearest_neighbor_iter(&[point.x(), point.y()])
            .take(n)
            .map(|node| node.hospital.clone())
            .collect()
    }
}
