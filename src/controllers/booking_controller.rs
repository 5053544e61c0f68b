use validator::Validate;

use crate::dto::booking_dto::{
    AssignBookingRequest, CancelBookingRequest, CreateBookingRequest, UpdateBookingStatusRequest,
};
use crate::dto::ApiResponse;
use crate::models::{Actor, Booking, BookingStatus};
use crate::services::{BookingLedger, LocationReporter, TrackingSnapshot, TripViewer};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub struct BookingController {
    bookings: BookingLedger,
    locations: LocationReporter,
    trips: TripViewer,
}

impl BookingController {
    pub fn new(state: &AppState) -> Self {
        Self {
            bookings: state.bookings.clone(),
            locations: state.locations.clone(),
            trips: state.trips.clone(),
        }
    }

    pub async fn create(
        &self,
        actor: &Actor,
        request: CreateBookingRequest,
    ) -> Result<ApiResponse<Booking>, AppError> {
        request.validate()?;
        let booking = self.bookings.create_booking(actor, request.into()).await?;
        Ok(ApiResponse::success_with_message(
            booking,
            "Booking requested",
        ))
    }

    pub async fn list(
        &self,
        actor: &Actor,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, AppError> {
        self.bookings.list_all(actor, status).await
    }

    pub async fn get(&self, actor: &Actor, id: i64) -> Result<Booking, AppError> {
        self.bookings.get_booking(actor, id).await
    }

    pub async fn assign(
        &self,
        actor: &Actor,
        id: i64,
        request: AssignBookingRequest,
    ) -> Result<ApiResponse<Booking>, AppError> {
        request.validate()?;
        let booking = self
            .bookings
            .assign(actor, id, request.ambulance_id, request.driver_id)
            .await?;
        Ok(ApiResponse::success_with_message(booking, "Booking assigned"))
    }

    pub async fn update_status(
        &self,
        actor: &Actor,
        id: i64,
        request: UpdateBookingStatusRequest,
    ) -> Result<ApiResponse<Booking>, AppError> {
        request.validate()?;
        let booking = self
            .bookings
            .advance(actor, id, request.status, request.reason)
            .await?;
        let message = format!("Booking is now {}", booking.status);
        Ok(ApiResponse::success_with_message(booking, message))
    }

    pub async fn cancel(
        &self,
        actor: &Actor,
        id: i64,
        request: CancelBookingRequest,
    ) -> Result<ApiResponse<Booking>, AppError> {
        request.validate()?;
        let booking = self.bookings.cancel(actor, id, request.reason).await?;
        Ok(ApiResponse::success_with_message(booking, "Booking cancelled"))
    }

    pub async fn tracking(&self, actor: &Actor, id: i64) -> Result<TrackingSnapshot, AppError> {
        self.locations.tracking(actor, id).await
    }

    pub async fn active_trips(&self, actor: &Actor) -> Result<Vec<Booking>, AppError> {
        self.bookings.list_active(actor).await
    }

    pub async fn completed_trips(&self, actor: &Actor) -> Result<Vec<Booking>, AppError> {
        self.bookings.list_completed(actor).await
    }

    pub async fn patient_trips(&self, actor: &Actor, patient_id: i64) -> Result<Vec<Booking>, AppError> {
        self.bookings.list_by_patient(actor, patient_id).await
    }

    pub async fn my_trips(
        &self,
        actor: &Actor,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, AppError> {
        self.trips.mine(actor, status).await
    }
}
