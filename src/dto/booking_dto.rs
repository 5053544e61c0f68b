use serde::Deserialize;
use validator::Validate;

use crate::models::{BookingStatus, BookingType};
use crate::services::BookingDraft;
use crate::utils::validation::validate_not_empty;

// Request para crear una reserva
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    /// Los pacientes pueden omitirlo: se usa su propia cuenta
    #[validate(range(min = 1))]
    pub patient_id: Option<i64>,
    #[validate(length(max = 500), custom = "validate_not_empty")]
    pub pickup_location: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub pickup_lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub pickup_lng: Option<f64>,
    #[validate(length(max = 500), custom = "validate_not_empty")]
    pub destination_location: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub destination_lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub destination_lng: Option<f64>,
    pub booking_type: BookingType,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl From<CreateBookingRequest> for BookingDraft {
    fn from(request: CreateBookingRequest) -> Self {
        BookingDraft {
            patient_id: request.patient_id,
            pickup_location: request.pickup_location,
            pickup_lat: request.pickup_lat,
            pickup_lng: request.pickup_lng,
            destination_location: request.destination_location,
            destination_lat: request.destination_lat,
            destination_lng: request.destination_lng,
            booking_type: request.booking_type,
            notes: request.notes,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignBookingRequest {
    #[validate(range(min = 1))]
    pub ambulance_id: i64,
    #[validate(range(min = 1))]
    pub driver_id: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
    /// Sólo se usa cuando `status` es CANCELLED
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CancelBookingRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<BookingStatus>,
}
