//! Core data types for the hospital directory.

use std::collections::HashSet;
use std::sync::Arc;

use geo::Point;

use crate::identifiers::*;

// ============================================================================
// Data Structures
// ============================================================================

/// A candidate hospital as reported by the directory backend.
///
/// Hospitals are fetched wholesale per search-radius expansion and replaced
/// on refresh; individual records are never partially mutated.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hospital {
    pub id: HospitalId,
    pub name: Arc<str>,

    /// Position in lon/lat order (`Point::new(lon, lat)`).
    #[cfg_attr(feature = "serde", serde(with = "point_lon_lat"))]
    pub location: Point,

    /// Driving distance reported by the backend at fetch time, in km.
    /// Display metadata only; live ranking recomputes distance itself.
    pub distance_km: f64,

    /// Aggregate user rating in [0, 5].
    pub rating: f64,
    pub verified: bool,

    pub available_beds: u32,
    pub ambulances: u32,
    pub wait_time_minutes: u32,

    pub specialties: HashSet<Arc<str>>,
}

impl Hospital {
    pub fn has_specialty(&self, specialty: &str) -> bool {
        self.specialties.contains(specialty)
    }

    /// Both ordinates finite and inside lon/lat range.
    pub fn has_usable_location(&self) -> bool {
        let (lon, lat) = (self.location.x(), self.location.y());
        lon.is_finite() && lat.is_finite() && (-180.0..=180.0).contains(&lon) && (-90.0..=90.0).contains(&lat)
    }
}

#[cfg(feature = "serde")]
mod point_lon_lat {
    use geo::Point;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(point: &Point, serializer: S) -> Result<S::Ok, S::Error> {
        [point.x(), point.y()].serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Point, D::Error> {
        let [lon, lat] = <[f64; 2]>::deserialize(deserializer)?;
        Ok(Point::new(lon, lat))
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Hospital not found: {0}")]
    HospitalNotFound(HospitalId),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
