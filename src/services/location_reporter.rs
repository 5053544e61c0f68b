//! Reportes de posición de conductores y seguimiento en vivo

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::models::{
    Actor, BookingStatus, DispatchEvent, Driver, GeoPoint, LocationPing,
};
use crate::repositories::DispatchStore;
use crate::services::booking_ledger::BookingLedger;
use crate::services::event_bus::EventBus;
use crate::services::fleet_registry::is_driver_account;
use crate::utils::errors::{forbidden_error, not_found_error, validation_error, AppResult};
use crate::utils::metrics::DispatchMetrics;
use crate::utils::validation::validate_coordinates;

/// Estado de una reserva más la última posición de su conductor
#[derive(Debug, Clone, Serialize)]
pub struct TrackingSnapshot {
    pub booking_id: i64,
    pub status: BookingStatus,
    pub ambulance_id: Option<i64>,
    pub driver_id: Option<i64>,
    pub driver_location: Option<GeoPoint>,
    pub last_location_update: Option<DateTime<Utc>>,
    /// Cada cuánto debería volver a consultar un cliente sin stream
    pub poll_interval_secs: u64,
}

#[derive(Clone)]
pub struct LocationReporter {
    store: Arc<dyn DispatchStore>,
    ledger: BookingLedger,
    events: EventBus,
    metrics: DispatchMetrics,
    poll_interval_secs: u64,
}

impl LocationReporter {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        ledger: BookingLedger,
        events: EventBus,
        metrics: DispatchMetrics,
        poll_interval_secs: u64,
    ) -> Self {
        Self {
            store,
            ledger,
            events,
            metrics,
            poll_interval_secs,
        }
    }

    /// Sólo el propio conductor reporta su posición
    pub async fn report(
        &self,
        actor: &Actor,
        driver_id: i64,
        ping: LocationPing,
    ) -> AppResult<Driver> {
        let driver = self
            .store
            .find_driver(driver_id)
            .await?
            .ok_or_else(|| not_found_error("Driver", driver_id))?;
        if !is_driver_account(actor, &driver) {
            return Err(forbidden_error(
                "report location",
                &format!("driver {} does not belong to {}", driver_id, actor),
            ));
        }
        if validate_coordinates(ping.latitude, ping.longitude).is_err() {
            self.metrics.location_ping(false);
            return Err(validation_error(
                "latitude",
                "latitude must be within [-90, 90] and longitude within [-180, 180]",
            ));
        }

        let updated = match self.store.record_location(driver_id, &ping, Utc::now()).await {
            Ok(driver) => driver,
            Err(e) => {
                self.metrics.location_ping(false);
                debug!("📍 Ping descartado para conductor {}: {}", driver_id, e);
                return Err(e);
            }
        };
        self.metrics.location_ping(true);

        if let Some(booking) = self.store.active_booking_for_driver(driver_id).await? {
            let at = updated.last_location_update.unwrap_or_else(Utc::now);
            self.events
                .publish(DispatchEvent::location_update(&booking, ping.point(), at));
        }
        Ok(updated)
    }

    pub async fn tracking(&self, actor: &Actor, booking_id: i64) -> AppResult<TrackingSnapshot> {
        let booking = self.ledger.get_booking(actor, booking_id).await?;

        let driver = match booking.driver_id {
            Some(id) => self.store.find_driver(id).await?,
            None => None,
        };
        // Tras el viaje la posición del conductor deja de ser de este paciente
        let driver = driver.filter(|_| booking.status.is_active());

        Ok(TrackingSnapshot {
            booking_id: booking.id,
            status: booking.status,
            ambulance_id: booking.ambulance_id,
            driver_id: booking.driver_id,
            driver_location: driver.as_ref().and_then(|d| d.location()),
            last_location_update: driver.as_ref().and_then(|d| d.last_location_update),
            poll_interval_secs: self.poll_interval_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActorRole, BookingType, DispatchEventKind, DriverStatus, NewDriver, VehicleType};
    use crate::repositories::MemoryDispatchStore;
    use crate::services::booking_ledger::BookingDraft;
    use crate::services::charge_policy::DistanceRateCharge;
    use crate::utils::errors::AppError;
    use rust_decimal::Decimal;

    struct Fixture {
        store: Arc<dyn DispatchStore>,
        ledger: BookingLedger,
        reporter: LocationReporter,
        events: EventBus,
        driver: Actor,
        driver_id: i64,
        ambulance_id: i64,
    }

    async fn fixture() -> Fixture {
        let store: Arc<dyn DispatchStore> = Arc::new(MemoryDispatchStore::new());
        let events = EventBus::new(32);
        let metrics = DispatchMetrics::new().unwrap();
        let ledger = BookingLedger::new(
            store.clone(),
            events.clone(),
            metrics.clone(),
            Arc::new(DistanceRateCharge::new(Decimal::new(25, 0), Decimal::new(500, 0))),
        );
        let reporter = LocationReporter::new(store.clone(), ledger.clone(), events.clone(), metrics, 5);
        let driver = store
            .insert_driver(NewDriver {
                user_id: 50,
                name: "Imran".to_string(),
                phone: "9123456780".to_string(),
                license_number: "DL-50".to_string(),
            })
            .await
            .unwrap();
        let ambulance = store
            .insert_ambulance("DL-1C AA 0001", VehicleType::AdvancedLifeSupport)
            .await
            .unwrap();
        Fixture {
            store,
            ledger,
            reporter,
            events,
            driver: Actor::new(ActorRole::Driver, 50),
            driver_id: driver.id,
            ambulance_id: ambulance.id,
        }
    }

    fn ping(lat: f64, lng: f64, sequence: Option<i64>) -> LocationPing {
        LocationPing {
            sequence,
            ..LocationPing::at(lat, lng)
        }
    }

    #[tokio::test]
    async fn test_stale_sequence_is_rejected() {
        let f = fixture().await;
        f.reporter
            .report(&f.driver, f.driver_id, ping(28.61, 77.20, Some(5)))
            .await
            .unwrap();

        let stale = f
            .reporter
            .report(&f.driver, f.driver_id, ping(28.70, 77.10, Some(4)))
            .await;
        assert!(matches!(stale, Err(AppError::Conflict(_))));

        let stored = f.store.find_driver(f.driver_id).await.unwrap().unwrap();
        assert_eq!(stored.current_lat, Some(28.61));
        assert_eq!(stored.location_sequence, 5);
    }

    #[tokio::test]
    async fn test_only_the_driver_reports_and_coordinates_are_checked() {
        let f = fixture().await;
        let admin = Actor::admin(1);
        assert!(matches!(
            f.reporter.report(&admin, f.driver_id, ping(28.6, 77.2, None)).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            f.reporter.report(&f.driver, f.driver_id, ping(91.0, 77.2, None)).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            f.reporter.report(&f.driver, 999, ping(28.6, 77.2, None)).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_off_duty_driver_cannot_report() {
        let f = fixture().await;
        f.store
            .update_driver_status(f.driver_id, DriverStatus::OffDuty)
            .await
            .unwrap();
        assert!(matches!(
            f.reporter.report(&f.driver, f.driver_id, ping(28.6, 77.2, None)).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_trip_ping_is_tracked_and_late_ping_rejected() {
        let f = fixture().await;
        let admin = Actor::admin(1);
        let patient = Actor::new(ActorRole::Patient, 12);
        let booking = f
            .ledger
            .create_booking(
                &patient,
                BookingDraft {
                    patient_id: None,
                    pickup_location: "Connaught Place".to_string(),
                    pickup_lat: Some(28.6315),
                    pickup_lng: Some(77.2167),
                    destination_location: "AIIMS".to_string(),
                    destination_lat: Some(28.5672),
                    destination_lng: Some(77.2100),
                    booking_type: BookingType::Emergency,
                    notes: None,
                },
            )
            .await
            .unwrap();
        f.ledger
            .assign(&admin, booking.id, f.ambulance_id, f.driver_id)
            .await
            .unwrap();

        let mut receiver = f.events.subscribe();
        let on_trip = LocationPing {
            booking_id: Some(booking.id),
            ..LocationPing::at(28.62, 77.21)
        };
        f.reporter.report(&f.driver, f.driver_id, on_trip.clone()).await.unwrap();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.kind, DispatchEventKind::LocationUpdated);
        assert_eq!(event.location, Some(GeoPoint::new(28.62, 77.21)));

        let snapshot = f.reporter.tracking(&patient, booking.id).await.unwrap();
        assert_eq!(snapshot.driver_location, Some(GeoPoint::new(28.62, 77.21)));
        assert_eq!(snapshot.poll_interval_secs, 5);

        f.ledger.cancel(&admin, booking.id, None).await.unwrap();
        let late = f.reporter.report(&f.driver, f.driver_id, on_trip).await;
        assert!(matches!(late, Err(AppError::Conflict(_))));

        let snapshot = f.reporter.tracking(&patient, booking.id).await.unwrap();
        assert_eq!(snapshot.status, BookingStatus::Cancelled);
        assert!(snapshot.driver_location.is_none());
    }
}
