//! Store en memoria
//!
//! Todo el estado de la flota vive detrás de un único `Mutex`, de modo que
//! cada operación del trait se ejecuta de forma serializable. Se usa cuando
//! no hay `DATABASE_URL` y en los tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::DispatchStore;
use crate::models::{
    Ambulance, AmbulanceStatus, Booking, BookingFilter, Cancellation, Driver, DriverStatus,
    LocationPing, NewBooking, NewDriver, VehicleType,
};
use crate::utils::errors::{not_found_error, validation_error, AppResult};

#[derive(Default)]
struct FleetState {
    ambulances: BTreeMap<i64, Ambulance>,
    drivers: BTreeMap<i64, Driver>,
    bookings: BTreeMap<i64, Booking>,
    last_ambulance_id: i64,
    last_driver_id: i64,
    last_booking_id: i64,
}

impl FleetState {
    fn booking(&self, id: i64) -> AppResult<Booking> {
        self.bookings
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found_error("Booking", id))
    }

    fn ambulance(&self, id: i64) -> AppResult<Ambulance> {
        self.ambulances
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found_error("Ambulance", id))
    }

    fn driver(&self, id: i64) -> AppResult<Driver> {
        self.drivers
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found_error("Driver", id))
    }

    fn active_booking_for_driver(&self, driver_id: i64) -> Option<&Booking> {
        self.bookings
            .values()
            .find(|b| b.status.is_active() && b.driver_id == Some(driver_id))
    }

    fn ambulance_has_active_booking(&self, ambulance_id: i64) -> bool {
        self.bookings
            .values()
            .any(|b| b.status.is_active() && b.ambulance_id == Some(ambulance_id))
    }

    /// Aplica la reserva ya transicionada y libera sus recursos en un paso
    fn commit_release(
        &mut self,
        booking: Booking,
        held: Option<(i64, i64)>,
        at: DateTime<Utc>,
    ) -> AppResult<Booking> {
        let released = match held {
            Some((ambulance_id, driver_id)) => {
                let mut ambulance = self.ambulance(ambulance_id)?;
                let mut driver = self.driver(driver_id)?;
                ambulance.release(at);
                driver.end_trip(at);
                Some((ambulance, driver))
            }
            None => None,
        };

        if let Some((ambulance, driver)) = released {
            self.ambulances.insert(ambulance.id, ambulance);
            self.drivers.insert(driver.id, driver);
        }
        self.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }
}

#[derive(Default)]
pub struct MemoryDispatchStore {
    state: Mutex<FleetState>,
}

impl MemoryDispatchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DispatchStore for MemoryDispatchStore {
    async fn insert_ambulance(
        &self,
        vehicle_number: &str,
        vehicle_type: VehicleType,
    ) -> AppResult<Ambulance> {
        let mut state = self.state.lock().await;
        if state
            .ambulances
            .values()
            .any(|a| a.vehicle_number == vehicle_number)
        {
            return Err(validation_error(
                "vehicle_number",
                format!("vehicle number '{}' is already registered", vehicle_number),
            ));
        }

        state.last_ambulance_id += 1;
        let now = Utc::now();
        let ambulance = Ambulance {
            id: state.last_ambulance_id,
            vehicle_number: vehicle_number.to_string(),
            vehicle_type,
            status: AmbulanceStatus::Available,
            created_at: now,
            updated_at: now,
        };
        state.ambulances.insert(ambulance.id, ambulance.clone());
        Ok(ambulance)
    }

    async fn find_ambulance(&self, id: i64) -> AppResult<Option<Ambulance>> {
        Ok(self.state.lock().await.ambulances.get(&id).cloned())
    }

    async fn list_ambulances(&self, status: Option<AmbulanceStatus>) -> AppResult<Vec<Ambulance>> {
        let state = self.state.lock().await;
        Ok(state
            .ambulances
            .values()
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect())
    }

    async fn update_ambulance_status(
        &self,
        id: i64,
        status: AmbulanceStatus,
    ) -> AppResult<Ambulance> {
        let mut state = self.state.lock().await;
        let mut ambulance = state.ambulance(id)?;
        let in_use = state.ambulance_has_active_booking(id);
        ambulance.set_manual_status(status, in_use, Utc::now())?;
        state.ambulances.insert(id, ambulance.clone());
        Ok(ambulance)
    }

    async fn insert_driver(&self, new: NewDriver) -> AppResult<Driver> {
        let mut state = self.state.lock().await;
        if state.drivers.values().any(|d| d.user_id == new.user_id) {
            return Err(validation_error(
                "user_id",
                format!("a driver already exists for user {}", new.user_id),
            ));
        }
        if state
            .drivers
            .values()
            .any(|d| d.license_number == new.license_number)
        {
            return Err(validation_error(
                "license_number",
                format!("license '{}' is already registered", new.license_number),
            ));
        }

        state.last_driver_id += 1;
        let now = Utc::now();
        let driver = Driver {
            id: state.last_driver_id,
            user_id: new.user_id,
            name: new.name,
            phone: new.phone,
            license_number: new.license_number,
            status: DriverStatus::Available,
            current_lat: None,
            current_lng: None,
            last_location_update: None,
            location_sequence: 0,
            created_at: now,
            updated_at: now,
        };
        state.drivers.insert(driver.id, driver.clone());
        Ok(driver)
    }

    async fn find_driver(&self, id: i64) -> AppResult<Option<Driver>> {
        Ok(self.state.lock().await.drivers.get(&id).cloned())
    }

    async fn find_driver_by_user(&self, user_id: i64) -> AppResult<Option<Driver>> {
        let state = self.state.lock().await;
        Ok(state.drivers.values().find(|d| d.user_id == user_id).cloned())
    }

    async fn list_drivers(&self, status: Option<DriverStatus>) -> AppResult<Vec<Driver>> {
        let state = self.state.lock().await;
        Ok(state
            .drivers
            .values()
            .filter(|d| status.map_or(true, |s| d.status == s))
            .cloned()
            .collect())
    }

    async fn update_driver_status(&self, id: i64, status: DriverStatus) -> AppResult<Driver> {
        let mut state = self.state.lock().await;
        let mut driver = state.driver(id)?;
        driver.set_manual_status(status, Utc::now())?;
        state.drivers.insert(id, driver.clone());
        Ok(driver)
    }

    async fn record_location(
        &self,
        driver_id: i64,
        ping: &LocationPing,
        received_at: DateTime<Utc>,
    ) -> AppResult<Driver> {
        let mut state = self.state.lock().await;
        let mut driver = state.driver(driver_id)?;
        let active = state.active_booking_for_driver(driver_id).map(|b| b.id);
        driver.apply_ping(ping, active, received_at)?;
        state.drivers.insert(driver_id, driver.clone());
        Ok(driver)
    }

    async fn active_booking_for_driver(&self, driver_id: i64) -> AppResult<Option<Booking>> {
        let state = self.state.lock().await;
        Ok(state.active_booking_for_driver(driver_id).cloned())
    }

    async fn insert_booking(&self, new: NewBooking) -> AppResult<Booking> {
        let mut state = self.state.lock().await;
        state.last_booking_id += 1;
        let booking = Booking::from_new(state.last_booking_id, new, Utc::now());
        state.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn find_booking(&self, id: i64) -> AppResult<Option<Booking>> {
        Ok(self.state.lock().await.bookings.get(&id).cloned())
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> AppResult<Vec<Booking>> {
        let state = self.state.lock().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(bookings)
    }

    async fn assign_booking(
        &self,
        booking_id: i64,
        ambulance_id: i64,
        driver_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<Booking> {
        let mut state = self.state.lock().await;
        let mut booking = state.booking(booking_id)?;
        let mut ambulance = state.ambulance(ambulance_id)?;
        let mut driver = state.driver(driver_id)?;

        booking.accept(ambulance_id, driver_id, at)?;
        ambulance.book(at)?;
        driver.begin_trip(at)?;

        state.ambulances.insert(ambulance_id, ambulance);
        state.drivers.insert(driver_id, driver);
        state.bookings.insert(booking_id, booking.clone());
        Ok(booking)
    }

    async fn start_trip(&self, booking_id: i64, at: DateTime<Utc>) -> AppResult<Booking> {
        let mut state = self.state.lock().await;
        let mut booking = state.booking(booking_id)?;
        booking.start(at)?;
        state.bookings.insert(booking_id, booking.clone());
        Ok(booking)
    }

    async fn complete_trip(
        &self,
        booking_id: i64,
        charge: Decimal,
        at: DateTime<Utc>,
    ) -> AppResult<Booking> {
        let mut state = self.state.lock().await;
        let mut booking = state.booking(booking_id)?;
        let held = booking.held_resources();
        booking.complete(charge, at)?;
        state.commit_release(booking, held, at)
    }

    async fn cancel_booking(
        &self,
        booking_id: i64,
        cancellation: Cancellation,
    ) -> AppResult<Booking> {
        let mut state = self.state.lock().await;
        let mut booking = state.booking(booking_id)?;
        let held = booking.held_resources();
        let at = cancellation.at;
        booking.cancel(&cancellation)?;
        state.commit_release(booking, held, at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, BookingType, RequesterRole};
    use crate::utils::errors::AppError;
    use std::sync::Arc;

    fn new_booking(patient_id: i64) -> NewBooking {
        NewBooking {
            patient_id,
            requested_by: RequesterRole::Patient,
            requester_id: patient_id,
            pickup_location: "A".to_string(),
            pickup: None,
            destination_location: "B".to_string(),
            destination: None,
            booking_type: BookingType::Emergency,
            notes: None,
        }
    }

    fn new_driver(user_id: i64) -> NewDriver {
        NewDriver {
            user_id,
            name: format!("driver-{}", user_id),
            phone: "9876543210".to_string(),
            license_number: format!("LIC-{}", user_id),
        }
    }

    #[tokio::test]
    async fn test_duplicate_vehicle_number_is_validation_error() {
        let store = MemoryDispatchStore::new();
        store.insert_ambulance("MH-01 AA 0001", VehicleType::Icu).await.unwrap();
        let err = store
            .insert_ambulance("MH-01 AA 0001", VehicleType::Mortuary)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_failed_assignment_changes_nothing() {
        let store = MemoryDispatchStore::new();
        let ambulance = store.insert_ambulance("MH-01 AA 0001", VehicleType::Icu).await.unwrap();
        let driver = store.insert_driver(new_driver(100)).await.unwrap();
        store.update_driver_status(driver.id, DriverStatus::OffDuty).await.unwrap();
        let booking = store.insert_booking(new_booking(1)).await.unwrap();

        let err = store
            .assign_booking(booking.id, ambulance.id, driver.id, Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let booking = store.find_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Requested);
        assert_eq!(booking.ambulance_id, None);
        let ambulance = store.find_ambulance(ambulance.id).await.unwrap().unwrap();
        assert_eq!(ambulance.status, AmbulanceStatus::Available);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_assignment_has_one_winner() {
        let store = Arc::new(MemoryDispatchStore::new());
        let ambulance = store.insert_ambulance("MH-01 AA 0005", VehicleType::Icu).await.unwrap();
        let d1 = store.insert_driver(new_driver(201)).await.unwrap();
        let d2 = store.insert_driver(new_driver(202)).await.unwrap();
        let b1 = store.insert_booking(new_booking(1)).await.unwrap();
        let b2 = store.insert_booking(new_booking(2)).await.unwrap();

        let ambulance_id = ambulance.id;
        let (s1, s2) = (store.clone(), store.clone());
        let (b1, b2, d1, d2) = (b1.id, b2.id, d1.id, d2.id);
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { s1.assign_booking(b1, ambulance_id, d1, Utc::now()).await }),
            tokio::spawn(async move { s2.assign_booking(b2, ambulance_id, d2, Utc::now()).await }),
        );
        let results = [r1.unwrap(), r2.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(r, Err(AppError::Conflict(_)))));

        let holders = store
            .list_bookings(&BookingFilter::with_statuses(&[BookingStatus::Accepted]))
            .await
            .unwrap()
            .into_iter()
            .filter(|b| b.ambulance_id == Some(ambulance_id))
            .count();
        assert_eq!(holders, 1);
        let ambulance = store.find_ambulance(ambulance_id).await.unwrap().unwrap();
        assert_eq!(ambulance.status, AmbulanceStatus::Booked);
    }

    #[tokio::test]
    async fn test_ambulance_in_use_cannot_be_toggled() {
        let store = MemoryDispatchStore::new();
        let ambulance = store.insert_ambulance("MH-01 AA 0001", VehicleType::Icu).await.unwrap();
        let driver = store.insert_driver(new_driver(100)).await.unwrap();
        let booking = store.insert_booking(new_booking(1)).await.unwrap();
        store
            .assign_booking(booking.id, ambulance.id, driver.id, Utc::now())
            .await
            .unwrap();

        let err = store
            .update_ambulance_status(ambulance.id, AmbulanceStatus::Available)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        let err = store
            .update_driver_status(driver.id, DriverStatus::OffDuty)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_list_bookings_newest_first() {
        let store = MemoryDispatchStore::new();
        let first = store.insert_booking(new_booking(1)).await.unwrap();
        let second = store.insert_booking(new_booking(1)).await.unwrap();
        store.insert_booking(new_booking(2)).await.unwrap();

        let filter = BookingFilter {
            patient_id: Some(1),
            ..Default::default()
        };
        let ids: Vec<i64> = store
            .list_bookings(&filter)
            .await
            .unwrap()
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }
}
