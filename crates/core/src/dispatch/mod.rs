//! Hospital ranking for an emergency request.
//!
//! Scores every candidate against the requester's position and orders them
//! best-first. A hospital that cannot score above zero is excluded rather
//! than zero-ranked; an empty result means "no coverage" and callers fall
//! back to a manual emergency-call affordance instead of retrying.

use std::cmp::Ordering;
use std::sync::Arc;

use geo::Point;
use itertools::Itertools;

use resq_directory::Hospital;

use crate::geometry;

// Suitability weights. UI tuning constants, not derived.
pub const DISTANCE_WEIGHT: f64 = 0.4;
pub const BED_WEIGHT: f64 = 0.3;
pub const WAIT_WEIGHT: f64 = 0.2;
pub const AMBULANCE_WEIGHT: f64 = 0.1;

/// Per-hospital suitability breakdown for one ranking pass.
///
/// Ephemeral and derived; never persisted. Each term is clamped to
/// [0, 100] before weighting.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DispatchScore {
    pub distance: f64,
    pub beds: f64,
    pub wait: f64,
    pub ambulances: f64,
    pub total: f64,
}

#[derive(Clone, Debug)]
pub struct RankedHospital {
    pub hospital: Arc<Hospital>,
    pub score: DispatchScore,
}

/// Rank candidates best-first for a requester at `requester`.
///
/// Stable: equal totals keep their input order. An unusable requester
/// position ranks nothing (the caller has no fix to dispatch against).
pub fn rank(hospitals: &[Arc<Hospital>], requester: Point) -> Vec<RankedHospital> {
    if !geometry::is_usable(requester) {
        return Vec::new();
    }

    hospitals
        .iter()
        .filter_map(|hospital| {
            let score = score_hospital(hospital, requester)?;
            Some(RankedHospital { hospital: hospital.clone(), score })
        })
        .sorted_by(|a, b| {
            b.score
                .total
                .partial_cmp(&a.score.total)
                .unwrap_or(Ordering::Equal)
        })
        .collect()
}

/// Head of the ranked sequence, or `None` when no hospital qualifies.
pub fn select_best(hospitals: &[Arc<Hospital>], requester: Point) -> Option<RankedHospital> {
    rank(hospitals, requester).into_iter().next()
}

fn score_hospital(hospital: &Hospital, requester: Point) -> Option<DispatchScore> {
    if !hospital.has_usable_location() {
        return None;
    }

    let distance_km = geometry::haversine_m(requester, hospital.location) / 1000.0;

    let distance = (100.0 - 10.0 * distance_km).clamp(0.0, 100.0);
    let beds = (2.0 * hospital.available_beds as f64).min(100.0);
    let wait = (100.0 - 2.0 * hospital.wait_time_minutes as f64).clamp(0.0, 100.0);
    let ambulances = (25.0 * hospital.ambulances as f64).min(100.0);

    let total = distance * DISTANCE_WEIGHT
        + beds * BED_WEIGHT
        + wait * WAIT_WEIGHT
        + ambulances * AMBULANCE_WEIGHT;

    (total > 0.0).then_some(DispatchScore { distance, beds, wait, ambulances, total })
}
