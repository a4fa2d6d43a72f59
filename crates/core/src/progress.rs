//! Trip/booking progress derivation.
//!
//! Pure functions of `(eta, started_at, now)`. Safe to call on every UI
//! refresh tick: everything recomputes from `started_at`, so repeated
//! calls accumulate no error. Consumers branch on `None` (render a
//! placeholder) instead of defaulting.

use chrono::{DateTime, Utc};
use strum::Display;

// Phase thresholds as fractions of the ETA. UI tuning constants, not
// derived from anything.
pub const TRIP_EN_ROUTE_AT: f64 = 0.2;
pub const TRIP_ARRIVING_AT: f64 = 0.85;
pub const BED_WAITING_AT: f64 = 0.15;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum TripPhase {
    Dispatched,
    #[strum(to_string = "En Route")]
    EnRoute,
    Arriving,
    Arrived,
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum BedPhase {
    Reserved,
    Waiting,
    Ready,
}

/// Elapsed-vs-ETA snapshot for an ambulance trip.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TripProgress {
    pub fraction: Option<f64>,
    pub phase: Option<TripPhase>,
    pub remaining_seconds: Option<u64>,
    pub remaining_label: Option<String>,
}

/// Elapsed-vs-ETA snapshot for a bed booking.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BedProgress {
    pub fraction: Option<f64>,
    pub phase: Option<BedPhase>,
    pub remaining_seconds: Option<u64>,
    pub remaining_label: Option<String>,
}

/// Fraction of the ETA already elapsed, clamped to [0, 1].
///
/// `None` when the ETA is absent or non-positive; this never divides by
/// zero.
pub fn fraction(
    eta_seconds: Option<f64>,
    started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<f64> {
    let eta = eta_seconds.filter(|eta| eta.is_finite() && *eta > 0.0)?;
    let started = started_at?;

    Some((elapsed_seconds(started, now) / eta).clamp(0.0, 1.0))
}

/// Whole seconds until the ETA, floored at zero.
pub fn remaining_seconds(
    eta_seconds: Option<f64>,
    started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<u64> {
    let eta = eta_seconds.filter(|eta| eta.is_finite())?;
    let started = started_at?;

    Some((eta - elapsed_seconds(started, now)).round().max(0.0) as u64)
}

pub fn trip_phase(fraction: f64) -> TripPhase {
    if fraction >= 1.0 {
        TripPhase::Arrived
    } else if fraction >= TRIP_ARRIVING_AT {
        TripPhase::Arriving
    } else if fraction >= TRIP_EN_ROUTE_AT {
        TripPhase::EnRoute
    } else {
        TripPhase::Dispatched
    }
}

pub fn bed_phase(fraction: f64) -> BedPhase {
    if fraction >= 1.0 {
        BedPhase::Ready
    } else if fraction >= BED_WAITING_AT {
        BedPhase::Waiting
    } else {
        BedPhase::Reserved
    }
}

/// `"Xm Ys"`, with the seconds elided when zero; `"Ys"` under a minute.
pub fn format_remaining(seconds: u64) -> String {
    let minutes = seconds / 60;
    let secs = seconds % 60;

    if minutes == 0 {
        format!("{secs}s")
    } else if secs == 0 {
        format!("{minutes}m")
    } else {
        format!("{minutes}m {secs}s")
    }
}

pub fn trip_progress(
    eta_seconds: Option<f64>,
    started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> TripProgress {
    let fraction = fraction(eta_seconds, started_at, now);
    let remaining = remaining_seconds(eta_seconds, started_at, now);

    TripProgress {
        fraction,
        phase: fraction.map(trip_phase),
        remaining_seconds: remaining,
        remaining_label: remaining.map(format_remaining),
    }
}

pub fn bed_progress(
    eta_seconds: Option<f64>,
    started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> BedProgress {
    let fraction = fraction(eta_seconds, started_at, now);
    let remaining = remaining_seconds(eta_seconds, started_at, now);

    BedProgress {
        fraction,
        phase: fraction.map(bed_phase),
        remaining_seconds: remaining,
        remaining_label: remaining.map(format_remaining),
    }
}

fn elapsed_seconds(started: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - started).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeDelta;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_fraction_clamps_at_both_ends() {
        let eta = Some(600.0);
        let started = Some(t0());

        assert_relative_eq!(fraction(eta, started, t0()).unwrap(), 0.0);

        let at_eta = t0() + TimeDelta::milliseconds(600_000);
        assert_relative_eq!(fraction(eta, started, at_eta).unwrap(), 1.0);

        // No overshoot past the ETA.
        let past_eta = t0() + TimeDelta::milliseconds(900_000);
        assert_relative_eq!(fraction(eta, started, past_eta).unwrap(), 1.0);
    }

    #[test]
    fn test_fraction_absent_inputs() {
        assert!(fraction(None, Some(t0()), t0()).is_none());
        assert!(fraction(Some(600.0), None, t0()).is_none());
        assert!(fraction(Some(0.0), Some(t0()), t0()).is_none());
        assert!(fraction(Some(-5.0), Some(t0()), t0()).is_none());
        assert!(fraction(Some(f64::NAN), Some(t0()), t0()).is_none());
    }

    #[test]
    fn test_trip_phase_thresholds() {
        assert_eq!(trip_phase(0.1), TripPhase::Dispatched);
        assert_eq!(trip_phase(0.5), TripPhase::EnRoute);
        assert_eq!(trip_phase(0.9), TripPhase::Arriving);
        assert_eq!(trip_phase(1.0), TripPhase::Arrived);

        // Boundary values land in the later phase.
        assert_eq!(trip_phase(0.2), TripPhase::EnRoute);
        assert_eq!(trip_phase(0.85), TripPhase::Arriving);
    }

    #[test]
    fn test_bed_phase_thresholds() {
        assert_eq!(bed_phase(0.1), BedPhase::Reserved);
        assert_eq!(bed_phase(0.15), BedPhase::Waiting);
        assert_eq!(bed_phase(0.99), BedPhase::Waiting);
        assert_eq!(bed_phase(1.0), BedPhase::Ready);
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(TripPhase::EnRoute.to_string(), "En Route");
        assert_eq!(TripPhase::Dispatched.to_string(), "Dispatched");
        assert_eq!(BedPhase::Ready.to_string(), "Ready");
    }

    #[test]
    fn test_remaining_seconds_floors_at_zero() {
        let eta = Some(90.0);
        let started = Some(t0());

        let halfway = t0() + TimeDelta::seconds(30);
        assert_eq!(remaining_seconds(eta, started, halfway), Some(60));

        let long_past = t0() + TimeDelta::seconds(500);
        assert_eq!(remaining_seconds(eta, started, long_past), Some(0));
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(45), "45s");
        assert_eq!(format_remaining(60), "1m");
        assert_eq!(format_remaining(330), "5m 30s");
        assert_eq!(format_remaining(0), "0s");
    }

    #[test]
    fn test_trip_progress_snapshot() {
        let now = t0() + TimeDelta::seconds(300);
        let snapshot = trip_progress(Some(600.0), Some(t0()), now);

        assert_relative_eq!(snapshot.fraction.unwrap(), 0.5);
        assert_eq!(snapshot.phase, Some(TripPhase::EnRoute));
        assert_eq!(snapshot.remaining_seconds, Some(300));
        assert_eq!(snapshot.remaining_label.as_deref(), Some("5m"));
    }

    #[test]
    fn test_trip_progress_without_eta_is_all_none() {
        let snapshot = trip_progress(None, Some(t0()), t0());
        assert_eq!(snapshot, TripProgress::default());
    }
}
