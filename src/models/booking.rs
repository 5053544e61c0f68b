//! Modelo de Booking
//!
//! Una reserva de ambulancia y su máquina de estados:
//!
//! ```text
//! REQUESTED -> ACCEPTED -> ON_THE_WAY -> COMPLETED
//!     |            |
//!     +------------+--> CANCELLED
//! ```
//!
//! Las transiciones se aplican sobre copias en memoria; los stores sólo
//! persisten el resultado cuando todas las comprobaciones pasaron.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::fmt;

use crate::models::actor::ActorRole;
use crate::models::location::GeoPoint;
use crate::utils::errors::{conflict_error, AppResult};

/// Estado de la reserva - mapea al ENUM booking_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "booking_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Requested,
    Accepted,
    OnTheWay,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Requested,
        BookingStatus::Accepted,
        BookingStatus::OnTheWay,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Requested => "REQUESTED",
            BookingStatus::Accepted => "ACCEPTED",
            BookingStatus::OnTheWay => "ON_THE_WAY",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// ACCEPTED u ON_THE_WAY: la reserva retiene ambulancia y conductor
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Accepted | BookingStatus::OnTheWay)
    }

    /// Aristas legales. Una vez en ON_THE_WAY el viaje ya no se cancela.
    pub fn can_transition_to(&self, target: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, target),
            (Requested, Accepted)
                | (Accepted, OnTheWay)
                | (OnTheWay, Completed)
                | (Requested, Cancelled)
                | (Accepted, Cancelled)
        )
    }

    pub fn ensure_transition(&self, target: BookingStatus) -> AppResult<()> {
        if self.can_transition_to(target) {
            return Ok(());
        }
        Err(conflict_error(format!(
            "illegal booking transition {} -> {}",
            self, target
        )))
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quién pidió la ambulancia - mapea al ENUM requester_role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "requester_role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequesterRole {
    Patient,
    Doctor,
    Admin,
}

/// Tipo de reserva - mapea al ENUM booking_type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "booking_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingType {
    Emergency,
    Normal,
}

impl BookingType {
    /// Menor rango = se despacha antes
    pub fn priority_rank(&self) -> u8 {
        match self {
            BookingType::Emergency => 0,
            BookingType::Normal => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Booking {
    pub id: i64,
    pub patient_id: i64,
    pub requested_by: RequesterRole,
    pub requester_id: i64,
    pub pickup_location: String,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub destination_location: String,
    pub destination_lat: Option<f64>,
    pub destination_lng: Option<f64>,
    pub booking_type: BookingType,
    pub status: BookingStatus,
    pub ambulance_id: Option<i64>,
    pub driver_id: Option<i64>,
    pub total_charge: Option<Decimal>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub cancelled_by: Option<ActorRole>,
    pub updated_at: DateTime<Utc>,
}

/// Datos de una reserva nueva, ya validados
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub patient_id: i64,
    pub requested_by: RequesterRole,
    pub requester_id: i64,
    pub pickup_location: String,
    pub pickup: Option<GeoPoint>,
    pub destination_location: String,
    pub destination: Option<GeoPoint>,
    pub booking_type: BookingType,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Cancellation {
    pub reason: Option<String>,
    pub cancelled_by: ActorRole,
    pub at: DateTime<Utc>,
}

/// Filtros para listados de reservas; todos los criterios se combinan con AND
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub patient_id: Option<i64>,
    pub driver_id: Option<i64>,
    pub requester_id: Option<i64>,
    pub statuses: Vec<BookingStatus>,
}

impl BookingFilter {
    pub fn with_statuses(statuses: &[BookingStatus]) -> Self {
        Self {
            statuses: statuses.to_vec(),
            ..Default::default()
        }
    }

    pub fn matches(&self, booking: &Booking) -> bool {
        self.patient_id.map_or(true, |id| booking.patient_id == id)
            && self.driver_id.map_or(true, |id| booking.driver_id == Some(id))
            && self.requester_id.map_or(true, |id| booking.requester_id == id)
            && (self.statuses.is_empty() || self.statuses.contains(&booking.status))
    }
}

impl Booking {
    pub fn from_new(id: i64, new: NewBooking, at: DateTime<Utc>) -> Self {
        Self {
            id,
            patient_id: new.patient_id,
            requested_by: new.requested_by,
            requester_id: new.requester_id,
            pickup_location: new.pickup_location,
            pickup_lat: new.pickup.map(|p| p.latitude),
            pickup_lng: new.pickup.map(|p| p.longitude),
            destination_location: new.destination_location,
            destination_lat: new.destination.map(|p| p.latitude),
            destination_lng: new.destination.map(|p| p.longitude),
            booking_type: new.booking_type,
            status: BookingStatus::Requested,
            ambulance_id: None,
            driver_id: None,
            total_charge: None,
            notes: new.notes,
            created_at: at,
            accepted_at: None,
            start_time: None,
            end_time: None,
            cancelled_at: None,
            cancel_reason: None,
            cancelled_by: None,
            updated_at: at,
        }
    }

    pub fn pickup(&self) -> Option<GeoPoint> {
        GeoPoint::from_pair(self.pickup_lat, self.pickup_lng)
    }

    pub fn destination(&self) -> Option<GeoPoint> {
        GeoPoint::from_pair(self.destination_lat, self.destination_lng)
    }

    /// REQUESTED -> ACCEPTED. Los ids de recursos se fijan una única vez.
    pub fn accept(&mut self, ambulance_id: i64, driver_id: i64, at: DateTime<Utc>) -> AppResult<()> {
        if self.status != BookingStatus::Requested {
            return Err(conflict_error(format!(
                "booking {} is no longer REQUESTED (status {})",
                self.id, self.status
            )));
        }
        if self.ambulance_id.is_some() || self.driver_id.is_some() {
            return Err(conflict_error(format!(
                "booking {} already has resources assigned",
                self.id
            )));
        }
        self.status = BookingStatus::Accepted;
        self.ambulance_id = Some(ambulance_id);
        self.driver_id = Some(driver_id);
        self.accepted_at = Some(at);
        self.updated_at = at;
        Ok(())
    }

    /// ACCEPTED -> ON_THE_WAY
    pub fn start(&mut self, at: DateTime<Utc>) -> AppResult<()> {
        self.status.ensure_transition(BookingStatus::OnTheWay)?;
        self.status = BookingStatus::OnTheWay;
        self.start_time = Some(at);
        self.updated_at = at;
        Ok(())
    }

    /// ON_THE_WAY -> COMPLETED, con el importe final del viaje
    pub fn complete(&mut self, charge: Decimal, at: DateTime<Utc>) -> AppResult<()> {
        self.status.ensure_transition(BookingStatus::Completed)?;
        self.status = BookingStatus::Completed;
        self.total_charge = Some(charge);
        self.end_time = Some(at);
        self.updated_at = at;
        Ok(())
    }

    /// REQUESTED|ACCEPTED -> CANCELLED
    pub fn cancel(&mut self, cancellation: &Cancellation) -> AppResult<()> {
        self.status.ensure_transition(BookingStatus::Cancelled)?;
        self.status = BookingStatus::Cancelled;
        self.cancelled_at = Some(cancellation.at);
        self.cancel_reason = cancellation.reason.clone();
        self.cancelled_by = Some(cancellation.cancelled_by);
        self.updated_at = cancellation.at;
        Ok(())
    }

    /// Ambulancia y conductor que hay que liberar, si la reserva los retiene
    pub fn held_resources(&self) -> Option<(i64, i64)> {
        if !self.status.is_active() {
            return None;
        }
        self.ambulance_id.zip(self.driver_id)
    }
}
