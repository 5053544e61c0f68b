//! Repositorios
//!
//! `DispatchStore` es el único punto de escritura del estado compartido de
//! la flota. Cada operación compuesta (asignar, iniciar, completar, cancelar)
//! es atómica: o se aplican todos los cambios o ninguno.

pub mod memory_store;
pub mod postgres_store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::{
    Ambulance, AmbulanceStatus, Booking, BookingFilter, Cancellation, Driver, DriverStatus,
    LocationPing, NewBooking, NewDriver, VehicleType,
};
use crate::utils::errors::AppResult;

pub use memory_store::MemoryDispatchStore;
pub use postgres_store::PgDispatchStore;

#[async_trait]
pub trait DispatchStore: Send + Sync {
    /// Falla con Validation si la matrícula ya existe
    async fn insert_ambulance(
        &self,
        vehicle_number: &str,
        vehicle_type: VehicleType,
    ) -> AppResult<Ambulance>;
    async fn find_ambulance(&self, id: i64) -> AppResult<Option<Ambulance>>;
    async fn list_ambulances(&self, status: Option<AmbulanceStatus>) -> AppResult<Vec<Ambulance>>;
    /// Cambio manual, rechazado mientras una reserva activa la retenga
    async fn update_ambulance_status(&self, id: i64, status: AmbulanceStatus)
        -> AppResult<Ambulance>;

    async fn insert_driver(&self, new: NewDriver) -> AppResult<Driver>;
    async fn find_driver(&self, id: i64) -> AppResult<Option<Driver>>;
    /// Conductor asociado a una cuenta de usuario
    async fn find_driver_by_user(&self, user_id: i64) -> AppResult<Option<Driver>>;
    async fn list_drivers(&self, status: Option<DriverStatus>) -> AppResult<Vec<Driver>>;
    async fn update_driver_status(&self, id: i64, status: DriverStatus) -> AppResult<Driver>;
    async fn record_location(
        &self,
        driver_id: i64,
        ping: &LocationPing,
        received_at: DateTime<Utc>,
    ) -> AppResult<Driver>;
    /// Reserva ACCEPTED u ON_THE_WAY del conductor, si la hay
    async fn active_booking_for_driver(&self, driver_id: i64) -> AppResult<Option<Booking>>;

    async fn insert_booking(&self, new: NewBooking) -> AppResult<Booking>;
    async fn find_booking(&self, id: i64) -> AppResult<Option<Booking>>;
    /// Más recientes primero
    async fn list_bookings(&self, filter: &BookingFilter) -> AppResult<Vec<Booking>>;

    /// Compare-and-set: reserva REQUESTED, ambulancia y conductor AVAILABLE
    async fn assign_booking(
        &self,
        booking_id: i64,
        ambulance_id: i64,
        driver_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<Booking>;
    async fn start_trip(&self, booking_id: i64, at: DateTime<Utc>) -> AppResult<Booking>;
    /// Guarda el importe y libera ambulancia y conductor
    async fn complete_trip(
        &self,
        booking_id: i64,
        charge: Decimal,
        at: DateTime<Utc>,
    ) -> AppResult<Booking>;
    /// Libera ambulancia y conductor si la reserva estaba ACCEPTED
    async fn cancel_booking(&self, booking_id: i64, cancellation: Cancellation)
        -> AppResult<Booking>;
}
