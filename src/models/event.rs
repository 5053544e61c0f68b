//! Eventos de despacho para el canal de notificaciones

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::booking::{Booking, BookingStatus};
use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchEventKind {
    BookingCreated,
    BookingAssigned,
    StatusChanged,
    BookingCancelled,
    LocationUpdated,
}

impl DispatchEventKind {
    /// Etiqueta corta para métricas
    pub fn label(&self) -> &'static str {
        match self {
            DispatchEventKind::BookingCreated => "created",
            DispatchEventKind::BookingAssigned => "assigned",
            DispatchEventKind::StatusChanged => "status_changed",
            DispatchEventKind::BookingCancelled => "cancelled",
            DispatchEventKind::LocationUpdated => "location_updated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchEvent {
    pub id: Uuid,
    pub kind: DispatchEventKind,
    pub booking_id: i64,
    pub patient_id: i64,
    pub status: BookingStatus,
    pub ambulance_id: Option<i64>,
    pub driver_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    pub occurred_at: DateTime<Utc>,
}

impl DispatchEvent {
    pub fn for_booking(kind: DispatchEventKind, booking: &Booking) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            booking_id: booking.id,
            patient_id: booking.patient_id,
            status: booking.status,
            ambulance_id: booking.ambulance_id,
            driver_id: booking.driver_id,
            location: None,
            occurred_at: booking.updated_at,
        }
    }

    pub fn location_update(booking: &Booking, location: GeoPoint, at: DateTime<Utc>) -> Self {
        Self {
            location: Some(location),
            occurred_at: at,
            ..Self::for_booking(DispatchEventKind::LocationUpdated, booking)
        }
    }
}
