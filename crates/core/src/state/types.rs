//! Trip and booking records plus the partial update payload.
//!
//! A user has at most one active trip and one active bed booking. Both
//! records are owned exclusively by the reconciliation layer; everything
//! else sees read-only clones.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use geo::Point;
use serde::Deserialize;
use strum::{Display, EnumString};

use resq_directory::{HospitalId, RequestId, ResponderId};

#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum TripStatus {
    Requested,
    // The backend emits either name for the same state.
    #[strum(to_string = "accepted", serialize = "dispatched")]
    Accepted,
    EnRoute,
    Arrived,
    Completed,
    Cancelled,
}

impl TripStatus {
    /// Terminal records are deleted, never retained with a flag.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum BedStatus {
    Reserved,
    Ready,
    Occupied,
    Completed,
    Cancelled,
}

impl BedStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum RequestKind {
    Ambulance,
    Bed,
}

/// The assigned ambulance/crew for a trip.
///
/// Everything beyond the id arrives piecemeal: update payloads carry some
/// fields, the responder lookup hydrates the rest best-effort.
#[derive(Clone, Debug, PartialEq)]
pub struct Responder {
    pub id: ResponderId,
    pub name: Option<Arc<str>>,
    pub phone: Option<Arc<str>>,
    pub vehicle_plate: Option<Arc<str>>,
    pub location: Option<Point>,
    pub heading: Option<f64>,
    pub rating: Option<f64>,
    pub crew_size: Option<u32>,
}

impl Responder {
    pub fn new(id: ResponderId) -> Self {
        Self {
            id,
            name: None,
            phone: None,
            vehicle_plate: None,
            location: None,
            heading: None,
            rating: None,
            crew_size: None,
        }
    }
}

/// One active ambulance-dispatch lifecycle, correlated by `request_id`.
#[derive(Clone, Debug, PartialEq)]
pub struct Trip {
    pub request_id: RequestId,
    pub hospital_id: HospitalId,
    pub status: TripStatus,
    pub eta_seconds: Option<f64>,
    pub started_at: DateTime<Utc>,
    pub responder: Option<Responder>,
}

impl Trip {
    pub fn new(request_id: RequestId, hospital_id: HospitalId, started_at: DateTime<Utc>) -> Self {
        Self {
            request_id,
            hospital_id,
            status: TripStatus::Requested,
            eta_seconds: None,
            started_at,
            responder: None,
        }
    }
}

/// One active hospital-bed reservation lifecycle, correlated by `request_id`.
#[derive(Clone, Debug, PartialEq)]
pub struct BedBooking {
    pub request_id: RequestId,
    pub hospital_id: HospitalId,
    pub status: BedStatus,
    pub eta_seconds: Option<f64>,
    pub started_at: DateTime<Utc>,
    pub bed_number: Option<Arc<str>>,
    pub bed_type: Option<Arc<str>>,
}

impl BedBooking {
    pub fn new(request_id: RequestId, hospital_id: HospitalId, started_at: DateTime<Utc>) -> Self {
        Self {
            request_id,
            hospital_id,
            status: BedStatus::Reserved,
            eta_seconds: None,
            started_at,
            bed_number: None,
            bed_type: None,
        }
    }
}

/// Partial-record payload from the subscription channel or polling fetch.
///
/// Only `request_id` is guaranteed; every other field overwrites local
/// state only when present. Statuses and kinds stay raw strings here so
/// unknown values can merge as "no change" instead of failing the whole
/// payload.
#[derive(Clone, Debug, Deserialize)]
pub struct RequestUpdate {
    pub request_id: RequestId,
    pub kind: Option<String>,
    pub status: Option<String>,
    pub hospital_id: Option<HospitalId>,
    pub eta_seconds: Option<f64>,
    pub responder_id: Option<ResponderId>,
    pub responder_name: Option<String>,
    pub responder_phone: Option<String>,
    pub vehicle_plate: Option<String>,
    /// Serialized `"lat,lng"` point; parsed defensively.
    pub responder_location: Option<String>,
    pub responder_heading: Option<f64>,
    pub bed_number: Option<String>,
    pub bed_type: Option<String>,
    /// Epoch milliseconds; orders cold-start adoption.
    pub requested_at: Option<i64>,
}

impl RequestUpdate {
    pub fn for_request(request_id: impl Into<RequestId>) -> Self {
        Self {
            request_id: request_id.into(),
            kind: None,
            status: None,
            hospital_id: None,
            eta_seconds: None,
            responder_id: None,
            responder_name: None,
            responder_phone: None,
            vehicle_plate: None,
            responder_location: None,
            responder_heading: None,
            bed_number: None,
            bed_type: None,
            requested_at: None,
        }
    }

    pub fn kind(&self) -> Option<RequestKind> {
        self.kind.as_deref().and_then(|kind| kind.parse().ok())
    }

    pub fn requested_at_utc(&self) -> Option<DateTime<Utc>> {
        self.requested_at.and_then(DateTime::from_timestamp_millis)
    }
}

/// Parse a serialized `"lat,lng"` point.
///
/// Malformed input is absent, not an error: a bad update must not null
/// out a previously known position.
pub(crate) fn parse_point(raw: &str) -> Option<Point> {
    let (lat, lng) = raw.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;

    let point = Point::new(lng, lat);
    crate::geometry::is_usable(point).then_some(point)
}
