//! Proyecciones de viajes por rol

use std::sync::Arc;

use crate::models::{Actor, ActorRole, Booking, BookingStatus};
use crate::repositories::DispatchStore;
use crate::services::booking_ledger::BookingLedger;
use crate::utils::errors::{AppError, AppResult};

#[derive(Clone)]
pub struct TripViewer {
    store: Arc<dyn DispatchStore>,
    ledger: BookingLedger,
}

impl TripViewer {
    pub fn new(store: Arc<dyn DispatchStore>, ledger: BookingLedger) -> Self {
        Self { store, ledger }
    }

    /// Lo que cada rol considera "sus" viajes:
    /// admin todo, doctor lo que pidió, paciente lo suyo, conductor lo asignado
    pub async fn mine(&self, actor: &Actor, status: Option<BookingStatus>) -> AppResult<Vec<Booking>> {
        let mut trips = match actor.role {
            ActorRole::Admin => return self.ledger.list_all(actor, status).await,
            ActorRole::Doctor => self.ledger.list_by_requester(actor.id).await?,
            ActorRole::Patient => self.ledger.list_by_patient(actor, actor.id).await?,
            ActorRole::Driver => {
                let driver = self
                    .store
                    .find_driver_by_user(actor.id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("no driver profile for user {}", actor.id))
                    })?;
                self.ledger.list_by_driver(driver.id).await?
            }
        };
        if let Some(status) = status {
            trips.retain(|b| b.status == status);
        }
        Ok(trips)
    }
}
