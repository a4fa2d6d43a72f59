//! The reducer over the trip and booking slots.
//!
//! Single writer: the dispatch service feeds every update source (local
//! optimistic transitions, the subscription channel, polling) through
//! `apply`. The merge is tolerant of duplicate and out-of-order delivery:
//! only fields present in a payload overwrite local state, so either
//! source landing first converges to the same record.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::types::{
    BedBooking, BedStatus, RequestKind, RequestUpdate, Responder, Trip, TripStatus, parse_point,
};
use resq_directory::RequestId;

/// What `apply` did with an update, so the service can react (stop the
/// animation on a terminal trip, hydrate a fresh responder, and so on).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    Merged(RequestKind),
    Terminal(RequestKind),
    Ignored,
}

#[derive(Debug, Default)]
pub struct DispatchStore {
    trip: Option<Trip>,
    booking: Option<BedBooking>,
}

impl DispatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trip(&self) -> Option<&Trip> {
        self.trip.as_ref()
    }

    pub fn booking(&self) -> Option<&BedBooking> {
        self.booking.as_ref()
    }

    /// Optimistic local creation, before server confirmation.
    pub fn begin_trip(&mut self, trip: Trip) {
        self.trip = Some(trip);
    }

    pub fn begin_booking(&mut self, booking: BedBooking) {
        self.booking = Some(booking);
    }

    /// Merge one partial update into whichever slot it correlates with.
    ///
    /// An update for a request we do not hold is discarded (the user may
    /// have abandoned that request already); that is routine, not an error.
    pub fn apply(&mut self, update: &RequestUpdate) -> Applied {
        if self.trip.as_ref().is_some_and(|t| t.request_id == update.request_id) {
            if parsed_trip_status(update).is_some_and(TripStatus::is_terminal) {
                self.trip = None;
                return Applied::Terminal(RequestKind::Ambulance);
            }
            if let Some(trip) = self.trip.as_mut() {
                merge_trip(trip, update);
            }
            return Applied::Merged(RequestKind::Ambulance);
        }

        if self.booking.as_ref().is_some_and(|b| b.request_id == update.request_id) {
            if parsed_bed_status(update).is_some_and(BedStatus::is_terminal) {
                self.booking = None;
                return Applied::Terminal(RequestKind::Bed);
            }
            if let Some(booking) = self.booking.as_mut() {
                merge_booking(booking, update);
            }
            return Applied::Merged(RequestKind::Bed);
        }

        debug!(request_id = %update.request_id, "update for unheld request discarded");
        Applied::Ignored
    }

    /// Adopt a server-side record as the active trip on cold start.
    ///
    /// Returns false when the record is unusable (already terminal, or
    /// missing the hospital a trip always targets).
    pub fn adopt_trip(&mut self, update: &RequestUpdate, now: DateTime<Utc>) -> bool {
        if parsed_trip_status(update).is_some_and(TripStatus::is_terminal) {
            return false;
        }
        let Some(hospital_id) = update.hospital_id.clone() else {
            warn!(request_id = %update.request_id, "active trip record lacks a hospital, skipping");
            return false;
        };

        let started_at = update.requested_at_utc().unwrap_or(now);
        let mut trip = Trip::new(update.request_id.clone(), hospital_id, started_at);
        merge_trip(&mut trip, update);
        self.trip = Some(trip);
        true
    }

    pub fn adopt_booking(&mut self, update: &RequestUpdate, now: DateTime<Utc>) -> bool {
        if parsed_bed_status(update).is_some_and(BedStatus::is_terminal) {
            return false;
        }
        let Some(hospital_id) = update.hospital_id.clone() else {
            warn!(request_id = %update.request_id, "active booking record lacks a hospital, skipping");
            return false;
        };

        let started_at = update.requested_at_utc().unwrap_or(now);
        let mut booking = BedBooking::new(update.request_id.clone(), hospital_id, started_at);
        merge_booking(&mut booking, update);
        self.booking = Some(booking);
        true
    }

    /// Fill responder gaps from a best-effort detail lookup.
    ///
    /// Update payloads stay authoritative: hydration only lands on fields
    /// that are still empty, and only while the same unit is assigned.
    pub fn hydrate_responder(&mut self, request_id: &RequestId, detail: &Responder) {
        let Some(trip) = self.trip.as_mut() else { return };
        if &trip.request_id != request_id {
            return;
        }
        let Some(responder) = trip.responder.as_mut() else { return };
        if responder.id != detail.id {
            return; // the unit was swapped while the lookup was in flight
        }

        responder.name = responder.name.take().or_else(|| detail.name.clone());
        responder.phone = responder.phone.take().or_else(|| detail.phone.clone());
        responder.vehicle_plate = responder.vehicle_plate.take().or_else(|| detail.vehicle_plate.clone());
        responder.location = responder.location.or(detail.location);
        responder.heading = responder.heading.or(detail.heading);
        responder.rating = responder.rating.or(detail.rating);
        responder.crew_size = responder.crew_size.or(detail.crew_size);
    }
}

fn parsed_trip_status(update: &RequestUpdate) -> Option<TripStatus> {
    update.status.as_deref().and_then(|raw| raw.parse().ok())
}

fn parsed_bed_status(update: &RequestUpdate) -> Option<BedStatus> {
    update.status.as_deref().and_then(|raw| raw.parse().ok())
}

fn merge_trip(trip: &mut Trip, update: &RequestUpdate) {
    if let Some(raw) = update.status.as_deref() {
        match raw.parse::<TripStatus>() {
            Ok(status) => trip.status = status,
            Err(_) => debug!(status = raw, "unknown trip status left unchanged"),
        }
    }
    if let Some(eta) = update.eta_seconds {
        if eta.is_finite() && eta >= 0.0 {
            trip.eta_seconds = Some(eta);
        }
    }
    if let Some(hospital_id) = &update.hospital_id {
        trip.hospital_id = hospital_id.clone();
    }
    merge_responder(&mut trip.responder, update);
}

fn merge_booking(booking: &mut BedBooking, update: &RequestUpdate) {
    if let Some(raw) = update.status.as_deref() {
        match raw.parse::<BedStatus>() {
            Ok(status) => booking.status = status,
            Err(_) => debug!(status = raw, "unknown bed status left unchanged"),
        }
    }
    if let Some(eta) = update.eta_seconds {
        if eta.is_finite() && eta >= 0.0 {
            booking.eta_seconds = Some(eta);
        }
    }
    if let Some(hospital_id) = &update.hospital_id {
        booking.hospital_id = hospital_id.clone();
    }
    if let Some(bed_number) = update.bed_number.as_deref() {
        booking.bed_number = Some(bed_number.into());
    }
    if let Some(bed_type) = update.bed_type.as_deref() {
        booking.bed_type = Some(bed_type.into());
    }
}

fn merge_responder(slot: &mut Option<Responder>, update: &RequestUpdate) {
    // A fresh responder id replaces the record; otherwise fields merge in
    // place. Responder fields without an assigned unit have nowhere to land.
    if let Some(id) = &update.responder_id {
        let replace = slot.as_ref().is_none_or(|r| &r.id != id);
        if replace {
            *slot = Some(Responder::new(id.clone()));
        }
    }
    let Some(responder) = slot.as_mut() else { return };

    if let Some(name) = update.responder_name.as_deref() {
        responder.name = Some(name.into());
    }
    if let Some(phone) = update.responder_phone.as_deref() {
        responder.phone = Some(phone.into());
    }
    if let Some(plate) = update.vehicle_plate.as_deref() {
        responder.vehicle_plate = Some(plate.into());
    }
    if let Some(raw) = update.responder_location.as_deref() {
        match parse_point(raw) {
            Some(point) => responder.location = Some(point),
            None => debug!(location = raw, "malformed responder location ignored"),
        }
    }
    if let Some(heading) = update.responder_heading {
        if heading.is_finite() {
            responder.heading = Some(heading.rem_euclid(360.0));
        }
    }
}
