//! Ledger de reservas
//!
//! Punto único de entrada para crear reservas y moverlas por su máquina de
//! estados. Cada transición aceptada emite un `DispatchEvent` y cuenta en
//! las métricas; las rechazadas no dejan rastro en el store.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::models::{
    Actor, ActorRole, Booking, BookingFilter, BookingStatus, BookingType, Cancellation,
    DispatchEvent, DispatchEventKind, GeoPoint, NewBooking,
};
use crate::repositories::DispatchStore;
use crate::services::charge_policy::ChargePolicy;
use crate::services::event_bus::EventBus;
use crate::utils::errors::{
    forbidden_error, not_found_error, validation_error, AppError, AppResult,
};
use crate::utils::metrics::DispatchMetrics;
use crate::utils::validation::{validate_optional_pair, validate_positive};

/// Datos de una reserva tal como llegan del cliente
#[derive(Debug, Clone)]
pub struct BookingDraft {
    /// Opcional para pacientes: por defecto su propia cuenta
    pub patient_id: Option<i64>,
    pub pickup_location: String,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub destination_location: String,
    pub destination_lat: Option<f64>,
    pub destination_lng: Option<f64>,
    pub booking_type: BookingType,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct BookingLedger {
    store: Arc<dyn DispatchStore>,
    events: EventBus,
    metrics: DispatchMetrics,
    charges: Arc<dyn ChargePolicy>,
}

impl BookingLedger {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        events: EventBus,
        metrics: DispatchMetrics,
        charges: Arc<dyn ChargePolicy>,
    ) -> Self {
        Self {
            store,
            events,
            metrics,
            charges,
        }
    }

    fn emit(&self, kind: DispatchEventKind, booking: &Booking) {
        self.metrics.booking_event(kind.label());
        self.events.publish(DispatchEvent::for_booking(kind, booking));
    }

    async fn load(&self, booking_id: i64) -> AppResult<Booking> {
        self.store
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| not_found_error("Booking", booking_id))
    }

    /// El actor es el conductor asignado a la reserva
    async fn is_assigned_driver(&self, actor: &Actor, booking: &Booking) -> AppResult<bool> {
        if actor.role != ActorRole::Driver {
            return Ok(false);
        }
        let Some(driver_id) = booking.driver_id else {
            return Ok(false);
        };
        let driver = self.store.find_driver(driver_id).await?;
        Ok(driver.map_or(false, |d| d.user_id == actor.id))
    }

    /// Admin, cualquier doctor, el paciente dueño o el conductor asignado
    async fn ensure_can_view(&self, actor: &Actor, booking: &Booking, operation: &str) -> AppResult<()> {
        let allowed = match actor.role {
            ActorRole::Admin | ActorRole::Doctor => true,
            ActorRole::Patient => booking.patient_id == actor.id,
            ActorRole::Driver => self.is_assigned_driver(actor, booking).await?,
        };
        if allowed {
            return Ok(());
        }
        Err(forbidden_error(
            operation,
            &format!("booking {} is not visible to {}", booking.id, actor),
        ))
    }

    pub async fn create_booking(&self, actor: &Actor, draft: BookingDraft) -> AppResult<Booking> {
        let requested_by = actor.requester_role().ok_or_else(|| {
            forbidden_error("create booking", "drivers cannot request ambulances")
        })?;

        let patient_id = match (actor.role, draft.patient_id) {
            (ActorRole::Patient, None) => actor.id,
            (ActorRole::Patient, Some(id)) if id != actor.id => {
                return Err(forbidden_error(
                    "create booking",
                    "patients can only book for themselves",
                ))
            }
            (_, Some(id)) => id,
            (_, None) => return Err(validation_error("patient_id", "patient_id is required")),
        };
        if validate_positive(patient_id).is_err() {
            return Err(validation_error("patient_id", "patient_id must be positive"));
        }

        let pickup_location = draft.pickup_location.trim().to_string();
        let destination_location = draft.destination_location.trim().to_string();
        if pickup_location.is_empty() {
            return Err(validation_error("pickup_location", "pickup location is required"));
        }
        if destination_location.is_empty() {
            return Err(validation_error(
                "destination_location",
                "destination location is required",
            ));
        }

        let pickup = validate_optional_pair(draft.pickup_lat, draft.pickup_lng)
            .map_err(|_| {
                validation_error(
                    "pickup_lat",
                    "pickup coordinates must be a valid latitude/longitude pair",
                )
            })?
            .map(|(lat, lng)| GeoPoint::new(lat, lng));
        let destination = validate_optional_pair(draft.destination_lat, draft.destination_lng)
            .map_err(|_| {
                validation_error(
                    "destination_lat",
                    "destination coordinates must be a valid latitude/longitude pair",
                )
            })?
            .map(|(lat, lng)| GeoPoint::new(lat, lng));

        let booking = self
            .store
            .insert_booking(NewBooking {
                patient_id,
                requested_by,
                requester_id: actor.id,
                pickup_location,
                pickup,
                destination_location,
                destination,
                booking_type: draft.booking_type,
                notes: draft.notes.filter(|n| !n.trim().is_empty()),
            })
            .await?;

        info!(
            "📋 Reserva {} creada por {} para paciente {} ({:?})",
            booking.id, actor, booking.patient_id, booking.booking_type
        );
        self.emit(DispatchEventKind::BookingCreated, &booking);
        Ok(booking)
    }

    pub async fn get_booking(&self, actor: &Actor, booking_id: i64) -> AppResult<Booking> {
        let booking = self.load(booking_id).await?;
        self.ensure_can_view(actor, &booking, "view booking").await?;
        Ok(booking)
    }

    /// Compare-and-set de la reserva y sus dos recursos
    pub async fn assign(
        &self,
        actor: &Actor,
        booking_id: i64,
        ambulance_id: i64,
        driver_id: i64,
    ) -> AppResult<Booking> {
        actor.require("assign booking", &[ActorRole::Admin])?;

        let booking = match self
            .store
            .assign_booking(booking_id, ambulance_id, driver_id, Utc::now())
            .await
        {
            Ok(booking) => booking,
            Err(e) => {
                if e.is_conflict() {
                    self.metrics.assignment_conflict();
                    warn!("⚠️ Asignación de la reserva {} rechazada: {}", booking_id, e);
                }
                return Err(e);
            }
        };

        info!(
            "🚑 Reserva {} asignada: ambulancia {} / conductor {}",
            booking.id, ambulance_id, driver_id
        );
        self.emit(DispatchEventKind::BookingAssigned, &booking);
        Ok(booking)
    }

    /// Avanza la reserva hacia `target`
    pub async fn advance(
        &self,
        actor: &Actor,
        booking_id: i64,
        target: BookingStatus,
        reason: Option<String>,
    ) -> AppResult<Booking> {
        match target {
            BookingStatus::Accepted => {
                return Err(AppError::BadRequest(
                    "bookings are accepted through assignment, not a status update".to_string(),
                ))
            }
            BookingStatus::Cancelled => return self.cancel(actor, booking_id, reason).await,
            _ => {}
        }

        let booking = self.load(booking_id).await?;
        if !actor.is_admin() && !self.is_assigned_driver(actor, &booking).await? {
            return Err(forbidden_error(
                "update booking status",
                "only the assigned driver or an admin can move a trip forward",
            ));
        }

        let now = Utc::now();
        let updated = match target {
            BookingStatus::OnTheWay => self.store.start_trip(booking_id, now).await?,
            BookingStatus::Completed => {
                let ambulance = match booking.ambulance_id {
                    Some(id) => self.store.find_ambulance(id).await?,
                    None => None,
                };
                let charge = self.charges.charge(&booking, ambulance.as_ref());
                self.store.complete_trip(booking_id, charge, now).await?
            }
            other => {
                booking.status.ensure_transition(other)?;
                return Err(AppError::Internal(format!(
                    "unhandled booking transition to {}",
                    other
                )));
            }
        };

        info!(
            "🔄 Reserva {}: {} -> {}",
            booking_id, booking.status, updated.status
        );
        self.emit(DispatchEventKind::StatusChanged, &updated);
        Ok(updated)
    }

    /// Sólo desde REQUESTED o ACCEPTED; libera ambulancia y conductor si los había
    pub async fn cancel(
        &self,
        actor: &Actor,
        booking_id: i64,
        reason: Option<String>,
    ) -> AppResult<Booking> {
        let booking = self.load(booking_id).await?;
        let allowed = match actor.role {
            ActorRole::Admin | ActorRole::Doctor => true,
            ActorRole::Patient => booking.patient_id == actor.id,
            ActorRole::Driver => self.is_assigned_driver(actor, &booking).await?,
        };
        if !allowed {
            return Err(forbidden_error(
                "cancel booking",
                &format!("booking {} does not belong to {}", booking_id, actor),
            ));
        }

        let cancellation = Cancellation {
            reason: reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
            cancelled_by: actor.role,
            at: Utc::now(),
        };
        let cancelled = self.store.cancel_booking(booking_id, cancellation).await?;

        info!("❌ Reserva {} cancelada por {}", booking_id, actor);
        self.emit(DispatchEventKind::BookingCancelled, &cancelled);
        Ok(cancelled)
    }

    pub async fn list_by_patient(&self, actor: &Actor, patient_id: i64) -> AppResult<Vec<Booking>> {
        let allowed = match actor.role {
            ActorRole::Admin | ActorRole::Doctor => true,
            ActorRole::Patient => actor.id == patient_id,
            ActorRole::Driver => false,
        };
        if !allowed {
            return Err(forbidden_error(
                "list patient bookings",
                &format!("patient {} is not visible to {}", patient_id, actor),
            ));
        }
        self.store
            .list_bookings(&BookingFilter {
                patient_id: Some(patient_id),
                ..Default::default()
            })
            .await
    }

    /// ACCEPTED y ON_THE_WAY
    pub async fn list_active(&self, actor: &Actor) -> AppResult<Vec<Booking>> {
        actor.require("list active trips", &[ActorRole::Admin])?;
        self.store
            .list_bookings(&BookingFilter::with_statuses(&[
                BookingStatus::Accepted,
                BookingStatus::OnTheWay,
            ]))
            .await
    }

    /// Viajes completados, fuente de la facturación
    pub async fn list_completed(&self, actor: &Actor) -> AppResult<Vec<Booking>> {
        actor.require("list completed trips", &[ActorRole::Admin])?;
        self.store
            .list_bookings(&BookingFilter::with_statuses(&[BookingStatus::Completed]))
            .await
    }

    pub async fn list_all(
        &self,
        actor: &Actor,
        status: Option<BookingStatus>,
    ) -> AppResult<Vec<Booking>> {
        actor.require("list bookings", &[ActorRole::Admin])?;
        let filter = BookingFilter {
            statuses: status.into_iter().collect(),
            ..Default::default()
        };
        self.store.list_bookings(&filter).await
    }

    pub async fn list_by_driver(&self, driver_id: i64) -> AppResult<Vec<Booking>> {
        self.store
            .list_bookings(&BookingFilter {
                driver_id: Some(driver_id),
                ..Default::default()
            })
            .await
    }

    pub async fn list_by_requester(&self, requester_id: i64) -> AppResult<Vec<Booking>> {
        self.store
            .list_bookings(&BookingFilter {
                requester_id: Some(requester_id),
                ..Default::default()
            })
            .await
    }
}
