//! Coordinador de despacho
//!
//! Además de la asignación manual (ver `BookingLedger::assign`) ofrece una
//! cola de prioridad y asignación automática con una `MatchingStrategy`.
//! Si otra asignación gana la carrera por un recurso, se vuelve a leer la
//! flota y se reintenta un número acotado de veces.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::models::{
    Actor, ActorRole, AmbulanceStatus, Booking, BookingFilter, BookingStatus, BookingType,
    DriverStatus,
};
use crate::repositories::DispatchStore;
use crate::services::booking_ledger::BookingLedger;
use crate::services::matching::MatchingStrategy;
use crate::utils::errors::{conflict_error, not_found_error, AppError, AppResult};

pub const AUTO_ASSIGN_ATTEMPTS: usize = 3;

/// Resumen para el panel de administración
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DispatchSummary {
    pub bookings: BTreeMap<String, usize>,
    pub ambulances: BTreeMap<String, usize>,
    pub drivers: BTreeMap<String, usize>,
    pub pending_emergencies: usize,
}

#[derive(Clone)]
pub struct DispatchCoordinator {
    store: Arc<dyn DispatchStore>,
    ledger: BookingLedger,
    strategy: Arc<dyn MatchingStrategy>,
}

impl DispatchCoordinator {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        ledger: BookingLedger,
        strategy: Arc<dyn MatchingStrategy>,
    ) -> Self {
        Self {
            store,
            ledger,
            strategy,
        }
    }

    /// Reservas REQUESTED: EMERGENCY primero, después la más antigua
    pub async fn pending_queue(&self, actor: &Actor) -> AppResult<Vec<Booking>> {
        actor.require("view dispatch queue", &[ActorRole::Admin])?;
        self.queue().await
    }

    async fn queue(&self) -> AppResult<Vec<Booking>> {
        let mut pending = self
            .store
            .list_bookings(&BookingFilter::with_statuses(&[BookingStatus::Requested]))
            .await?;
        pending.sort_by(|a, b| {
            a.booking_type
                .priority_rank()
                .cmp(&b.booking_type.priority_rank())
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(pending)
    }

    pub async fn auto_assign(&self, actor: &Actor, booking_id: i64) -> AppResult<Booking> {
        actor.require("auto-assign booking", &[ActorRole::Admin])?;

        let mut last_error: Option<AppError> = None;
        for attempt in 1..=AUTO_ASSIGN_ATTEMPTS {
            let booking = self
                .store
                .find_booking(booking_id)
                .await?
                .ok_or_else(|| not_found_error("Booking", booking_id))?;
            if booking.status != BookingStatus::Requested {
                return Err(conflict_error(format!(
                    "booking {} is no longer REQUESTED (status {})",
                    booking_id, booking.status
                )));
            }

            let ambulances = self
                .store
                .list_ambulances(Some(AmbulanceStatus::Available))
                .await?;
            let drivers = self.store.list_drivers(Some(DriverStatus::Available)).await?;

            let Some(pair) = self.strategy.select(&booking, &ambulances, &drivers) else {
                return Err(conflict_error(format!(
                    "no available ambulance and driver for booking {}",
                    booking_id
                )));
            };

            match self
                .ledger
                .assign(actor, booking_id, pair.ambulance_id, pair.driver_id)
                .await
            {
                Ok(assigned) => {
                    info!(
                        "🤖 Reserva {} asignada automáticamente ({}, intento {})",
                        booking_id,
                        self.strategy.name(),
                        attempt
                    );
                    return Ok(assigned);
                }
                Err(e) if e.is_conflict() => {
                    warn!(
                        "⚠️ Intento {}/{} de asignar la reserva {} perdió la carrera: {}",
                        attempt, AUTO_ASSIGN_ATTEMPTS, booking_id, e
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            conflict_error(format!("could not assign booking {}", booking_id))
        }))
    }

    /// Asigna la cabeza de la cola; `None` si no hay nada pendiente
    pub async fn dispatch_next(&self, actor: &Actor) -> AppResult<Option<Booking>> {
        actor.require("dispatch next booking", &[ActorRole::Admin])?;
        match self.queue().await?.first() {
            Some(head) => self.auto_assign(actor, head.id).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn summary(&self, actor: &Actor) -> AppResult<DispatchSummary> {
        actor.require("view dispatch summary", &[ActorRole::Admin])?;

        let bookings = self.store.list_bookings(&BookingFilter::default()).await?;
        let ambulances = self.store.list_ambulances(None).await?;
        let drivers = self.store.list_drivers(None).await?;

        let mut booking_counts: BTreeMap<String, usize> = BookingStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        for booking in &bookings {
            *booking_counts.entry(booking.status.to_string()).or_default() += 1;
        }

        let mut ambulance_counts = BTreeMap::new();
        for ambulance in &ambulances {
            *ambulance_counts.entry(ambulance.status.to_string()).or_default() += 1;
        }
        let mut driver_counts = BTreeMap::new();
        for driver in &drivers {
            *driver_counts.entry(driver.status.to_string()).or_default() += 1;
        }

        Ok(DispatchSummary {
            pending_emergencies: bookings
                .iter()
                .filter(|b| {
                    b.status == BookingStatus::Requested && b.booking_type == BookingType::Emergency
                })
                .count(),
            bookings: booking_counts,
            ambulances: ambulance_counts,
            drivers: driver_counts,
        })
    }
}
